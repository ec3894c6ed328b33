use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const MEDIA_URL: &str = "/media/";
pub const RECIPE_IMAGE_DIR: &str = "recipes";

/// Names produced by [`save_recipe_image`]; anything else is never served.
pub static MEDIA_FILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9-]{36}\.(png|jpg|gif)$").unwrap());

#[derive(Error, Debug, PartialEq)]
pub enum ImageError {
    #[error("Image must be a base64 data URI")]
    NotDataUri,
    #[error("Unsupported image type {0}")]
    UnsupportedType(String),
    #[error("Image is not valid base64")]
    InvalidBase64,
    #[error("Image is empty")]
    Empty,
    #[error("Image is larger than {0} bytes")]
    TooLarge(usize),
}

#[derive(Debug)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Decodes `data:image/<type>;base64,<payload>`.
pub fn decode_data_uri(value: &str, max_bytes: usize) -> Result<DecodedImage, ImageError> {
    let rest = value.trim().strip_prefix("data:").ok_or(ImageError::NotDataUri)?;
    let (content_type, payload) = rest.split_once(";base64,").ok_or(ImageError::NotDataUri)?;

    let extension = extension_for(&content_type.to_ascii_lowercase())
        .ok_or_else(|| ImageError::UnsupportedType(content_type.to_string()))?;

    // Reject oversized payloads before allocating for them.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(ImageError::TooLarge(max_bytes));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(max_bytes));
    }

    Ok(DecodedImage { bytes, extension })
}

/// Writes the image under `<media_root>/recipes/` and returns the path
/// relative to the media root.
pub async fn save_recipe_image(
    media_root: &Path,
    image: &DecodedImage,
) -> Result<String, std::io::Error> {
    let dir = media_root.join(RECIPE_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
    tokio::fs::write(dir.join(&file_name), &image.bytes).await?;

    Ok(format!("{RECIPE_IMAGE_DIR}/{file_name}"))
}

pub async fn remove_media(media_root: &Path, relative: &str) {
    if let Err(err) = tokio::fs::remove_file(media_root.join(relative)).await {
        warn!(path = %relative, error = %err, "Failed to remove media file");
    }
}

pub fn recipe_image_path(media_root: &Path, file_name: &str) -> Option<PathBuf> {
    MEDIA_FILE_REGEX
        .is_match(file_name)
        .then(|| media_root.join(RECIPE_IMAGE_DIR).join(file_name))
}

pub fn media_url(relative: &str) -> String {
    format!("{MEDIA_URL}{relative}")
}
