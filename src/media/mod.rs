// Image handling for uploaded problem photos
//
// Decodes PNG/JPEG uploads and prepares them for whichever transport the
// active provider expects (inline data URI or the decoded image itself).

pub mod codec;

pub use codec::{
    decode, decode_data_uri, decode_file, encode_for_transport, DecodedImage, ImageKind,
    TransportEncoding, TransportPayload, MAX_IMAGE_BYTES,
};

use thiserror::Error;

/// Errors raised while decoding or encoding an image.
///
/// All of these are recoverable: the upload is rejected and the session keeps
/// going.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("unsupported image format (only PNG and JPEG are accepted)")]
    UnsupportedFormat,

    #[error("image is too large ({size} bytes, limit is {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not read image file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
}
