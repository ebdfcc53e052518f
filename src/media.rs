use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{constants::RECIPE_IMAGE_DIR, error::TypeError, RecipeError};

/// Image as it arrives in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `data:image/<ext>;base64,<data>`
    DataUri(String),
    /// File part of a `multipart/form-data` body.
    Upload {
        content_type: Option<String>,
        filename: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Decoded image bytes with the extension they are stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl RecipeImage {
    fn new(extension: &str, bytes: Vec<u8>) -> Result<Self, TypeError> {
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::new("Invalid image extension"));
        }
        if bytes.is_empty() {
            return Err(TypeError::new("Image data is empty"));
        }

        Ok(Self {
            extension: extension.to_ascii_lowercase(),
            bytes,
        })
    }
}

impl TryFrom<&str> for RecipeImage {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (format, data) = value
            .strip_prefix("data:image/")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or_else(|| TypeError::new("Image must be a data:image/<ext>;base64 URI"))?;

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|_e| TypeError::new("Invalid base64 image data"))?;

        Self::new(format, bytes)
    }
}

impl TryFrom<ImageSource> for RecipeImage {
    type Error = TypeError;

    fn try_from(value: ImageSource) -> Result<Self, Self::Error> {
        match value {
            ImageSource::DataUri(uri) => Self::try_from(uri.as_str()),
            ImageSource::Upload {
                content_type,
                filename,
                bytes,
            } => {
                // the declared mime type wins over the file name
                let extension = content_type
                    .as_deref()
                    .and_then(|mime| mime.strip_prefix("image/"))
                    .map(|subtype| subtype.split(';').next().unwrap_or_default().trim())
                    .or_else(|| {
                        filename
                            .as_deref()
                            .and_then(|name| name.rsplit_once('.'))
                            .map(|(_, extension)| extension)
                    })
                    .ok_or_else(|| TypeError::new("Uploaded file is not an image"))?;

                Self::new(extension, bytes)
            }
        }
    }
}

/// Writes recipe images under `<root>/recipes/` and hands back the relative path.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, image: &RecipeImage) -> Result<String, RecipeError> {
        let dir = self.root.join(RECIPE_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecipeError::Media(format!("{e}")))?;

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), image.extension);
        tokio::fs::write(dir.join(&file_name), &image.bytes)
            .await
            .map_err(|e| RecipeError::Media(format!("{e}")))?;

        log::info!("Stored recipe image {file_name}");
        Ok(format!("{RECIPE_IMAGE_DIR}/{file_name}"))
    }

    /// Best effort, a stale file never fails the request.
    pub async fn remove(&self, path: &str) {
        if path.split('/').any(|segment| segment == "..") {
            log::warn!("Refusing to remove media path {path}");
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.root.join(path)).await {
            log::warn!("Failed to remove media file {path}: {e}");
        }
    }
}
