use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodedImageError {
    #[error("frame is empty")]
    Empty,
    #[error("frame is not a recognized image: {0}")]
    UnknownFormat(#[source] image::ImageError),
}

/// A single still frame in its encoded (JPEG, PNG, ...) form.
///
/// The pixels are never decoded here; the analysis service receives the
/// bytes verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl EncodedImage {
    /// Wraps encoded bytes, sniffing the format from the magic number.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EncodedImageError> {
        if bytes.is_empty() {
            return Err(EncodedImageError::Empty);
        }
        let format = image::guess_format(&bytes).map_err(EncodedImageError::UnknownFormat)?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// File name used when uploading, e.g. `frame.jpg`.
    pub fn file_name(&self) -> String {
        let ext = self.format.extensions_str().first().copied().unwrap_or("bin");
        format!("frame.{ext}")
    }
}
