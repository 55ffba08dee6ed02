//! JPEG encoding helpers for the MJPEG delivery path

use crate::error::{EnhanceError, EnhanceResult};
use crate::pipeline::bytes_to_mat;
use opencv::{
    core::{Mat, Vector, CV_8UC3},
    imgcodecs,
    prelude::*,
};

/// Encode a BGR frame as JPEG: quality 85, optimized, progressive
pub fn encode_jpeg(bgr: &[u8], width: u32, height: u32) -> EnhanceResult<Vec<u8>> {
    let mat = bytes_to_mat(bgr, width, height)?;
    encode_mat(&mat)
}

/// Black placeholder frame emitted before the first decoded frame arrives
pub fn black_jpeg(width: u32, height: u32) -> EnhanceResult<Vec<u8>> {
    let blank = Mat::zeros(height as i32, width as i32, CV_8UC3)?.to_mat()?;
    encode_mat(&blank)
}

fn encode_mat(mat: &Mat) -> EnhanceResult<Vec<u8>> {
    let params = Vector::from_slice(&[
        imgcodecs::IMWRITE_JPEG_QUALITY,
        85,
        imgcodecs::IMWRITE_JPEG_OPTIMIZE,
        1,
        imgcodecs::IMWRITE_JPEG_PROGRESSIVE,
        1,
    ]);

    let mut buf = Vector::<u8>::new();
    let ok = imgcodecs::imencode(".jpg", mat, &mut buf, &params)?;
    if !ok {
        return Err(EnhanceError::EncodeError("imencode returned false".to_string()));
    }
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_is_jpeg(data: &[u8]) {
        // SOI marker at the start, EOI marker at the end
        assert!(data.len() > 4);
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_constant_frame() {
        let bgr = vec![128u8; 64 * 48 * 3];
        let jpeg = encode_jpeg(&bgr, 64, 48).unwrap();
        assert_is_jpeg(&jpeg);
    }

    #[test]
    fn test_black_placeholder() {
        let jpeg = black_jpeg(960, 540).unwrap();
        assert_is_jpeg(&jpeg);
    }

    #[test]
    fn test_encode_rejects_bad_buffer() {
        assert!(encode_jpeg(&[0u8; 7], 64, 48).is_err());
    }
}
