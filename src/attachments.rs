//! Local files attached to a user turn
//!
//! Files are read eagerly, typed by extension, and sent inline as base64
//! `data:` URLs both in the request's attachment list and as file parts of
//! the user message.

use crate::store::FilePart;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is {size} bytes, limit is {limit}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.bytes))
    }

    pub fn to_file_part(&self) -> FilePart {
        FilePart {
            url: self.data_url(),
            media_type: self.media_type.clone(),
            filename: Some(self.filename.clone()),
        }
    }
}

/// Media type from the file extension
pub fn media_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string()
}

/// Read one file, refusing anything larger than `max_bytes`
pub async fn load_file(path: impl AsRef<Path>, max_bytes: u64) -> Result<Attachment, AttachmentError> {
    let path = path.as_ref();
    let io_err = |source| AttachmentError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
    if metadata.len() > max_bytes {
        return Err(AttachmentError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(io_err)?;
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    tracing::debug!(path = %path.display(), size = bytes.len(), "Loaded attachment");
    Ok(Attachment::new(filename, media_type_for(path), bytes))
}

/// Read several files in order, failing on the first that cannot be attached
pub async fn load_files<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    max_bytes: u64,
) -> Result<Vec<Attachment>, AttachmentError> {
    let mut attachments = Vec::new();
    for path in paths {
        attachments.push(load_file(path, max_bytes).await?);
    }
    Ok(attachments)
}
