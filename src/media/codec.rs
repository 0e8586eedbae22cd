// Image codec: raw upload bytes -> DecodedImage -> transport payload

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use std::path::Path;

use super::MediaError;

/// Largest upload accepted, in raw bytes.
///
/// Inline image parts count against the provider request size limit, and a
/// base64 payload is a third bigger than the file itself.
pub const MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

/// Raster formats accepted from students.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// A successfully decoded upload.
///
/// Keeps the original encoded bytes alongside the pixels so that transport
/// encoding never re-compresses the image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    kind: ImageKind,
    bytes: Vec<u8>,
    pixels: DynamicImage,
}

impl DecodedImage {
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Original encoded bytes as uploaded.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Base64 of the original bytes (no data URI prefix).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

/// How a provider wants images delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEncoding {
    /// Inline base64 data URI (OpenAI-compatible `image_url`).
    DataUri,
    /// The decoded image itself; the adapter serialises it as it sees fit.
    Native,
}

/// An image ready to be attached to an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportPayload {
    DataUri(String),
    Native(DecodedImage),
}

impl TransportPayload {
    /// Mime type and base64 payload, whichever variant this is.
    pub fn inline_parts(&self) -> Result<(String, String), MediaError> {
        match self {
            TransportPayload::Native(image) => {
                Ok((image.mime_type().to_string(), image.to_base64()))
            }
            TransportPayload::DataUri(uri) => {
                let (mime, data) = split_data_uri(uri)?;
                Ok((mime.to_string(), data.to_string()))
            }
        }
    }

    /// Data URI form, whichever variant this is.
    pub fn data_uri(&self) -> String {
        match self {
            TransportPayload::DataUri(uri) => uri.clone(),
            TransportPayload::Native(image) => image.to_data_uri(),
        }
    }
}

/// Decode raw upload bytes.
///
/// The format is sniffed from the magic bytes; anything other than PNG or
/// JPEG is rejected before decoding. The whole image is decoded so that
/// truncated or corrupt files fail here rather than at the provider.
pub fn decode(raw: &[u8]) -> Result<DecodedImage, MediaError> {
    if raw.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            size: raw.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }

    let kind = match image::guess_format(raw) {
        Ok(ImageFormat::Png) => ImageKind::Png,
        Ok(ImageFormat::Jpeg) => ImageKind::Jpeg,
        _ => return Err(MediaError::UnsupportedFormat),
    };

    let pixels = image::load_from_memory_with_format(raw, kind.image_format())
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    tracing::debug!(
        mime = kind.mime_type(),
        bytes = raw.len(),
        width = pixels.width(),
        height = pixels.height(),
        "Decoded image upload"
    );

    Ok(DecodedImage {
        kind,
        bytes: raw.to_vec(),
        pixels,
    })
}

/// Read and decode an image file.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedImage, MediaError> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| MediaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode(&raw)
}

/// Prepare a decoded image for a provider request.
pub fn encode_for_transport(image: &DecodedImage, target: TransportEncoding) -> TransportPayload {
    match target {
        TransportEncoding::DataUri => TransportPayload::DataUri(image.to_data_uri()),
        TransportEncoding::Native => TransportPayload::Native(image.clone()),
    }
}

/// Parse a `data:<mime>;base64,<payload>` URI back into a decoded image.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, MediaError> {
    let (mime, data) = split_data_uri(uri)?;
    if ImageKind::from_mime_type(mime).is_none() {
        return Err(MediaError::UnsupportedFormat);
    }
    let raw = STANDARD
        .decode(data)
        .map_err(|e| MediaError::InvalidDataUri(e.to_string()))?;
    decode(&raw)
}

fn split_data_uri(uri: &str) -> Result<(&str, &str), MediaError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| MediaError::InvalidDataUri("missing 'data:' prefix".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidDataUri("missing ',' separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| MediaError::InvalidDataUri("only base64 data URIs are supported".to_string()))?;
    Ok((mime, data))
}
