//! Avatar downscaling: photos are cropped square, shrunk and re-encoded as a
//! small JPEG data URL before they go into the room document.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageError, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;

/// Longest side of a stored avatar, in pixels.
pub const AVATAR_SIZE: u32 = 96;
/// JPEG quality of stored avatars.
pub const AVATAR_QUALITY: u8 = 60;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Reasons an avatar could not be produced.
#[derive(Debug, Error)]
pub enum AvatarError {
    /// The upload is not an image we can read.
    #[error("failed to decode avatar image")]
    Decode(#[source] ImageError),
    /// The image has no pixels.
    #[error("avatar image is empty")]
    Empty,
    /// Re-encoding failed.
    #[error("failed to encode avatar image")]
    Encode(#[source] ImageError),
}

/// Turn uploaded image bytes into a `data:image/jpeg;base64,` URL.
pub fn encode_avatar(bytes: &[u8]) -> Result<String, AvatarError> {
    let image = image::load_from_memory(bytes).map_err(AvatarError::Decode)?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(AvatarError::Empty);
    }

    let side = width.min(height);
    let target = side.min(AVATAR_SIZE);
    let square = image
        .crop_imm((width - side) / 2, (height - side) / 2, side, side)
        .resize_exact(target, target, FilterType::Triangle)
        .into_rgb8();

    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, AVATAR_QUALITY);
        encoder.encode_image(&square).map_err(AvatarError::Encode)?;
    }
    Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(jpeg)))
}
