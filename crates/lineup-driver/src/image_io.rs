//! Image loading for the driver.
//!
//! Decodes a file into the contract's raster [`Image`]: grayscale stays
//! 8-bit, everything else converts to 24-bit RGB.

use lineup_core::Image;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("cannot decode image {0}: {1}")]
    Decode(String, image::ImageError),
    #[error("image {0} is {1}x{2}; dimensions must fit in 16 bits")]
    TooLarge(String, u32, u32),
}

pub fn read_image(path: &Path) -> Result<Image, ImageError> {
    let decoded =
        image::open(path).map_err(|e| ImageError::Decode(path.display().to_string(), e))?;

    let (width, height) = (decoded.width(), decoded.height());
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(ImageError::TooLarge(
            path.display().to_string(),
            width,
            height,
        ));
    }

    let (depth, data) = match decoded {
        image::DynamicImage::ImageLuma8(gray) => (8, gray.into_raw()),
        other => (24, other.into_rgb8().into_raw()),
    };

    Ok(Image {
        width: width as u16,
        height: height as u16,
        depth,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_grayscale_as_depth_8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 3, image::Luma([128])).save(&path).unwrap();

        let img = read_image(&path).unwrap();
        assert_eq!((img.width, img.height, img.depth), (4, 3, 8));
        assert_eq!(img.data.len(), img.size());
    }

    #[test]
    fn test_reads_color_as_depth_24() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3])).save(&path).unwrap();

        let img = read_image(&path).unwrap();
        assert_eq!((img.width, img.height, img.depth), (2, 2, 24));
        assert_eq!(img.data.len(), 12);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        assert!(matches!(
            read_image(Path::new("/nonexistent.png")),
            Err(ImageError::Decode(..))
        ));
    }
}
