//! Document preparation for the background upload.
//!
//! Images are shrunk before they leave the device: the longest edge is
//! limited to [`MAX_EDGE`] pixels and the JPEG quality is stepped down until
//! the file fits [`TARGET_BYTES`]. Anything that is not a decodable image is
//! sent as is.

use crate::backend::UploadPart;
use crate::error::UploadError;
use crate::forms::FormsState;
use crate::grouping::FormGroup;
use crate::types::FileRef;
use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Longest edge after compression, in pixels
pub const MAX_EDGE: u32 = 1200;

/// Size budget for a compressed image
pub const TARGET_BYTES: usize = 500 * 1024;

/// JPEG qualities tried in order
pub const JPEG_QUALITIES: [u8; 5] = [70, 60, 50, 40, 30];

fn is_image(file: &FileRef) -> bool {
    file.content_type.starts_with("image/")
}

fn jpeg_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("{stem}.jpg")
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, UploadError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}

/// Compress one file.
///
/// Non-images and images that fail to decode are returned unchanged. When
/// even the lowest quality exceeds the budget, the lowest-quality encoding
/// is returned.
///
/// # Errors
///
/// Returns [`UploadError::Encode`] if JPEG encoding fails.
pub fn compress_image(file: &FileRef) -> Result<FileRef, UploadError> {
    if !is_image(file) {
        return Ok(file.clone());
    }
    let image = match image::load_from_memory(&file.bytes) {
        Ok(image) => image,
        Err(error) => {
            tracing::warn!(file = %file.name, error = %error, "Not a decodable image, sending as is");
            return Ok(file.clone());
        },
    };

    let (width, height) = image.dimensions();
    let image = if width.max(height) > MAX_EDGE {
        image.resize(MAX_EDGE, MAX_EDGE, FilterType::Triangle)
    } else {
        image
    };

    let mut encoded = Vec::new();
    for quality in JPEG_QUALITIES {
        encoded = encode_jpeg(&image, quality)?;
        if encoded.len() <= TARGET_BYTES {
            break;
        }
    }

    tracing::debug!(
        file = %file.name,
        before = file.len(),
        after = encoded.len(),
        "Compressed image"
    );
    Ok(FileRef::new(jpeg_name(&file.name), "image/jpeg", encoded))
}

/// [`compress_image`] on the blocking pool
///
/// # Errors
///
/// Encoding failures and a panicked or cancelled blocking task.
pub async fn compress_in_background(file: FileRef) -> Result<FileRef, UploadError> {
    tokio::task::spawn_blocking(move || compress_image(&file))
        .await
        .map_err(|e| UploadError::Task(e.to_string()))?
}

/// Upload parts for every file attached to the current groups.
///
/// Group files are named `files_<signature>_<field>`, member files
/// `files_<signature>_member<index>_<field>`. Files of groups that no longer
/// exist are left out.
#[must_use]
pub fn collect_upload_parts(groups: &[FormGroup], forms: &FormsState) -> Vec<UploadPart> {
    let mut parts = Vec::new();
    for group in groups {
        let signature = &group.signature;
        if let Some(files) = forms.group_file_map(signature) {
            parts.extend(files.iter().map(|(field, file)| UploadPart {
                name: format!("files_{signature}_{field}"),
                file: file.clone(),
            }));
        }
        for index in 0..forms.members(signature).len() {
            if let Some(files) = forms.member_file_map(signature, index) {
                parts.extend(files.iter().map(|(field, file)| UploadPart {
                    name: format!("files_{signature}_member{index}_{field}"),
                    file: file.clone(),
                }));
            }
        }
    }
    parts
}

/// Compress every part concurrently, keeping the original of any part that
/// fails. Part order is preserved.
pub async fn compress_parts(parts: Vec<UploadPart>) -> Vec<UploadPart> {
    join_all(parts.into_iter().map(|part| async move {
        if !is_image(&part.file) {
            return part;
        }
        match compress_in_background(part.file.clone()).await {
            Ok(file) => UploadPart {
                name: part.name,
                file,
            },
            Err(error) => {
                tracing::warn!(part = %part.name, error = %error, "Compression failed, sending original");
                part
            },
        }
    }))
    .await
}
