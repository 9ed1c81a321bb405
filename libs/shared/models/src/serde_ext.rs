use serde::{Deserialize, Deserializer};

/// Treats a `null` column like a missing one. Rows written by older clients leave
/// required text columns empty.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trimmed copy of an optional text field, `None` when nothing is left.
pub fn trimmed_or_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
    }

    #[test]
    fn test_null_as_default() {
        let row: Row = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(row.name, "");

        let row: Row = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(row.name, "");

        let row: Row = serde_json::from_str(r#"{"name": "Jane"}"#).unwrap();
        assert_eq!(row.name, "Jane");
    }

    #[test]
    fn test_trimmed_or_none() {
        assert_eq!(trimmed_or_none(Some("  Leeds  ")), Some("Leeds".to_string()));
        assert_eq!(trimmed_or_none(Some("   ")), None);
        assert_eq!(trimmed_or_none(None), None);
    }
}
