//! Column encodings used by the `doctors` table.

/// `Vec<T>` stored as comma-joined text. Blank or `null` columns read as empty;
/// entries that no longer parse are dropped with a warning.
pub mod comma_list {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    pub fn serialize<S, T>(items: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<str>,
    {
        let joined = items
            .iter()
            .map(|item| item.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(parse(&raw))
    }

    pub fn parse<T: FromStr>(raw: &str) -> Vec<T> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.parse() {
                Ok(item) => Some(item),
                Err(_) => {
                    warn!("Ignoring unknown list entry: {}", entry);
                    None
                }
            })
            .collect()
    }
}

/// A struct stored as JSON text inside a text column. Reads also accept a native JSON
/// object; unreadable text reads as the default.
pub mod json_text {
    use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;
    use tracing::warn;

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = match Value::deserialize(deserializer)? {
            Value::String(text) if text.trim().is_empty() => return Ok(T::default()),
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Ignoring unreadable JSON column: {}", e);
                    return Ok(T::default());
                }
            },
            Value::Null => return Ok(T::default()),
            other => other,
        };

        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Ignoring JSON column with unexpected shape: {}", e);
            T::default()
        }))
    }
}
