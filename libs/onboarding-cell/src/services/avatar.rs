use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use shared_database::store::{BlobStore, UploadOptions};
use shared_models::auth::Identity;

use crate::models::{AvatarFile, AvatarPreview, UploadError};
use crate::services::lock;

impl AvatarFile {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Accepts `data:<mime>;base64,<payload>`, the form browsers hand out for picked files.
    pub fn from_data_url(file_name: &str, data_url: &str) -> Result<Self, UploadError> {
        let (header, payload) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or(UploadError::Unreadable)?;

        let content_type = header
            .strip_suffix(";base64")
            .filter(|mime| !mime.is_empty())
            .ok_or(UploadError::Unreadable)?;

        let bytes = BASE64.decode(payload.trim()).map_err(|e| {
            debug!("Avatar payload is not valid base64: {}", e);
            UploadError::Unreadable
        })?;

        if bytes.is_empty() {
            return Err(UploadError::Unreadable);
        }

        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Lower-cased file name extension, falling back to the MIME subtype.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        if let Some(ext) = from_name {
            return ext.to_ascii_lowercase();
        }

        match self.content_type.split_once('/').map(|(_, sub)| sub) {
            Some("jpeg") => "jpg".to_string(),
            Some("svg+xml") => "svg".to_string(),
            Some(sub) if !sub.is_empty() => sub.to_ascii_lowercase(),
            _ => "bin".to_string(),
        }
    }

    pub fn preview_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes))
    }
}

/// Puts avatar files into the public bucket.
#[derive(Clone)]
pub struct AvatarUploader {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl AvatarUploader {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            blobs,
            bucket: bucket.into(),
        }
    }

    pub fn object_path(folder: &str, identity_id: &str, extension: &str, unix_millis: i64) -> String {
        format!("{}/{}-{}.{}", folder, identity_id, unix_millis, extension)
    }

    /// Returns the public URL of the stored object.
    pub async fn upload(
        &self,
        folder: &str,
        file: &AvatarFile,
        identity: &Identity,
        access_token: &str,
    ) -> Result<String, UploadError> {
        if !file.is_image() {
            return Err(UploadError::NotAnImage);
        }

        let path = Self::object_path(
            folder,
            &identity.id,
            &file.extension(),
            Utc::now().timestamp_millis(),
        );
        debug!("Uploading avatar to {}/{}", self.bucket, path);

        self.blobs
            .upload(
                &self.bucket,
                &path,
                file.bytes.clone(),
                &file.content_type,
                &UploadOptions::default(),
                access_token,
            )
            .await
            .map_err(|e| {
                error!("Avatar upload failed: {}", e);
                UploadError::Failed
            })?;

        Ok(self.blobs.public_url(&self.bucket, &path))
    }

    /// True when `url` points at an object this identity uploaded into `folder`.
    pub fn is_own_upload(&self, url: &str, folder: &str, identity: &Identity) -> bool {
        let prefix = self
            .blobs
            .public_url(&self.bucket, &format!("{}/{}-", folder, identity.id));
        url.starts_with(&prefix)
    }
}

/// What submit sees once uploads have finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarSettled {
    pub uploaded_url: Option<String>,
    pub error: Option<UploadError>,
}

struct AvatarSlot {
    preview: AvatarPreview,
    uploaded_url: Option<String>,
    error: Option<UploadError>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Avatar state of one onboarding session. Each new file bumps the generation, so an
/// older upload that finishes late is dropped instead of replacing the newer preview.
pub struct AvatarTracker {
    uploader: AvatarUploader,
    folder: &'static str,
    slot: Arc<Mutex<AvatarSlot>>,
}

impl AvatarTracker {
    pub fn new(uploader: AvatarUploader, folder: &'static str) -> Self {
        Self {
            uploader,
            folder,
            slot: Arc::new(Mutex::new(AvatarSlot {
                preview: AvatarPreview::None,
                uploaded_url: None,
                error: None,
                generation: 0,
                pending: None,
            })),
        }
    }

    /// Starts over from the stored avatar, cancelling anything in flight.
    pub fn reset(&self, persisted: Option<String>) {
        let mut slot = lock(&self.slot);
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
        slot.generation += 1;
        slot.preview = persisted.map_or(AvatarPreview::None, AvatarPreview::Persisted);
        slot.uploaded_url = None;
        slot.error = None;
    }

    /// Shows the file immediately and uploads it in the background. Must be called
    /// inside a tokio runtime.
    pub fn choose(
        &self,
        file: AvatarFile,
        identity: &Identity,
        access_token: &str,
    ) -> Result<AvatarPreview, UploadError> {
        if !file.is_image() {
            return Err(UploadError::NotAnImage);
        }

        let preview = AvatarPreview::Local(file.preview_url());

        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.pending.take() {
            debug!("Cancelling superseded avatar upload");
            previous.abort();
        }
        slot.generation += 1;
        slot.preview = preview.clone();
        slot.uploaded_url = None;
        slot.error = None;

        let generation = slot.generation;
        let uploader = self.uploader.clone();
        let folder = self.folder;
        let identity = identity.clone();
        let access_token = access_token.to_string();
        let shared = Arc::clone(&self.slot);

        slot.pending = Some(tokio::spawn(async move {
            let result = uploader.upload(folder, &file, &identity, &access_token).await;

            let mut slot = lock(&shared);
            if slot.generation != generation {
                debug!("Discarding result of superseded avatar upload");
                return;
            }
            match result {
                Ok(url) => {
                    slot.preview = AvatarPreview::Persisted(url.clone());
                    slot.uploaded_url = Some(url);
                }
                Err(e) => slot.error = Some(e),
            }
        }));

        Ok(preview)
    }

    pub fn preview(&self) -> AvatarPreview {
        lock(&self.slot).preview.clone()
    }

    pub fn error(&self) -> Option<UploadError> {
        lock(&self.slot).error.clone()
    }

    /// Waits for the latest upload, including one started while waiting. No timeout.
    pub async fn settle(&self) -> AvatarSettled {
        loop {
            let pending = lock(&self.slot).pending.take();
            let Some(handle) = pending else {
                break;
            };
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Avatar upload task ended abnormally: {}", e);
                }
            }
        }

        let slot = lock(&self.slot);
        AvatarSettled {
            uploaded_url: slot.uploaded_url.clone(),
            error: slot.error.clone(),
        }
    }
}
