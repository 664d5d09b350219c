use crate::error::{AppError, FrameSourceError};
use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, RgbImage};
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// A captured RGB frame of known size.
#[derive(Clone, PartialEq)]
pub struct FrameBuffer {
    pixels: RgbImage,
}

// Pixel data stays out of logs.
impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameBuffer({}x{})", self.width(), self.height())
    }
}

impl FrameBuffer {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgb8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Decodes an encoded image (JPEG, PNG, ...) into a frame.
pub fn decode_image(bytes: &[u8]) -> Result<FrameBuffer, AppError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::Decode(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(AppError::Decode("Image has no pixels".to_string()));
    }

    Ok(FrameBuffer::from_dynamic(img))
}

/// Decodes a `data:<mime>;base64,<payload>` URL, as a browser file reader produces.
pub fn decode_data_url(url: &str) -> Result<FrameBuffer, AppError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Decode("Not a data URL".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Decode("Data URL has no payload".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(AppError::Decode(
            "Only base64 data URLs are supported".to_string(),
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::Decode(format!("Invalid base64 payload: {}", e)))?;

    decode_image(&bytes)
}

/// Camera or decoded upload feeding the session.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquires the underlying device. Resolves once frames can be read.
    async fn acquire(&self) -> Result<(), FrameSourceError>;

    /// The current frame. Only valid after `acquire` succeeded.
    fn current_frame(&self) -> Result<FrameBuffer, AppError>;
}

/// Serves a single image file as a frozen "camera".
pub struct StillImageSource {
    path: PathBuf,
    frame: RwLock<Option<FrameBuffer>>,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: RwLock::new(None),
        }
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    async fn acquire(&self) -> Result<(), FrameSourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(match e.kind() {
                    std::io::ErrorKind::NotFound => FrameSourceError::DeviceNotFound,
                    std::io::ErrorKind::PermissionDenied => FrameSourceError::PermissionDenied,
                    _ => FrameSourceError::Other,
                })
            }
        };

        let frame = decode_image(&bytes).map_err(|_| FrameSourceError::Other)?;
        info!(
            "Loaded still image {} ({}x{})",
            self.path.display(),
            frame.width(),
            frame.height()
        );
        *self.frame.write() = Some(frame);
        Ok(())
    }

    fn current_frame(&self) -> Result<FrameBuffer, AppError> {
        self.frame
            .read()
            .clone()
            .ok_or(AppError::FrameSource(FrameSourceError::Other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_image() {
        let frame = decode_image(&png_bytes(4, 3)).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixels().get_pixel(0, 0), &Rgb([10, 200, 30]));
    }

    #[test]
    fn test_decode_garbage_bytes() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_data_url() {
        let payload = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let url = format!("data:image/png;base64,{}", payload);
        let frame = decode_data_url(&url).unwrap();
        assert_eq!((frame.width(), frame.height()), (2, 2));
    }

    #[test]
    fn test_decode_data_url_rejects_bad_input() {
        assert!(decode_data_url("http://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }

    #[tokio::test]
    async fn test_still_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bottle.png");
        std::fs::write(&path, png_bytes(5, 5)).unwrap();

        let source = StillImageSource::new(&path);
        assert!(source.current_frame().is_err());
        source.acquire().await.unwrap();
        assert_eq!(source.current_frame().unwrap().width(), 5);
    }

    #[tokio::test]
    async fn test_still_image_source_missing_file() {
        let source = StillImageSource::new("/nonexistent/bottle.jpg");
        assert_eq!(
            source.acquire().await,
            Err(FrameSourceError::DeviceNotFound)
        );
    }
}
