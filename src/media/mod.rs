use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

/// Upper bound on staged image files. Enforced before a file is read, so an
/// oversized attachment never reaches the conversation.
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI payload is not base64-encoded")]
    MissingBase64Marker,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image is {0} bytes; the limit is {MAX_IMAGE_BYTES} bytes (2MB)")]
    TooLarge(u64),
    #[error("unsupported image extension: '{0}'")]
    UnsupportedExtension(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An image payload decoded out of its `data:<mime>;base64,<payload>` form.
/// The provider boundary wants raw bytes plus a mime type, so the base64
/// shell is stripped here and nowhere else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { mime_type: mime_type.into(), data }
    }

    pub fn parse(uri: &str) -> Result<Self, MediaError> {
        let rest = uri.strip_prefix("data:").ok_or(MediaError::MissingScheme)?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or(MediaError::MissingBase64Marker)?;
        let data = BASE64.decode(payload)?;
        Ok(Self { mime_type: mime_type.to_string(), data })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

fn mime_for_extension(path: &Path) -> Result<&'static str, MediaError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        other => Err(MediaError::UnsupportedExtension(other.to_string())),
    }
}

/// Stage an image file for attachment to the next user message.
pub fn read_image_as_data_uri(path: &Path) -> Result<DataUri, MediaError> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge(metadata.len()));
    }
    let mime_type = mime_for_extension(path)?;
    let data = std::fs::read(path)?;
    Ok(DataUri::new(mime_type, data))
}
