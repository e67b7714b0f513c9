use anyhow::Context;
use bytes::Bytes;
use tracing::debug;

use crate::storage::StorageClient;

/// A profile picture received from a form, not yet stored.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Allowed picture extension for an uploaded file name, normalised.
pub fn picture_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}

fn mime_for_ext(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

fn picture_key(image_file: &str) -> String {
    format!("profile_pics/{}", image_file)
}

/// Stores the picture under a random name and returns that name.
pub async fn save_picture(
    storage: &dyn StorageClient,
    upload: PictureUpload,
) -> anyhow::Result<String> {
    let ext = picture_extension(&upload.file_name)
        .with_context(|| format!("unsupported picture {}", upload.file_name))?;
    let stem: u64 = rand::random();
    let image_file = format!("{:016x}.{}", stem, ext);
    let content_type = upload
        .content_type
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| mime_for_ext(ext).to_string());

    storage
        .put_object(&picture_key(&image_file), upload.body, &content_type)
        .await
        .with_context(|| format!("store picture {}", image_file))?;
    debug!(%image_file, "profile picture stored");
    Ok(image_file)
}

pub async fn discard_picture(storage: &dyn StorageClient, image_file: &str) -> anyhow::Result<()> {
    storage
        .delete_object(&picture_key(image_file))
        .await
        .with_context(|| format!("discard picture {}", image_file))
}
