//! Frame enhancement pipeline
//!
//! Fixed operation order: LUT -> gamma -> CLAHE (on the Lab L channel) ->
//! sharpen. Every stage preserves dimensions, 8-bit depth and BGR channel
//! order; intermediates saturate to [0, 255]. The defogging parameters are
//! recognized but the stage is reserved and never applied.

use crate::error::{EnhanceError, EnhanceResult};
use crate::lut::ColorLut;
use crate::params::EnhanceParams;
use log::{info, warn};
use opencv::{
    core::{self, Mat, Ptr, Size, Vector, BORDER_DEFAULT, CV_8UC3},
    imgproc,
    prelude::*,
};
use std::path::Path;

/// Fixed 3x3 sharpen kernel, center 1.8, neighbors -0.1 (sum 1.0)
const SHARPEN_KERNEL: [[f32; 3]; 3] = [
    [-0.1, -0.1, -0.1],
    [-0.1, 1.8, -0.1],
    [-0.1, -0.1, -0.1],
];

/// Per-camera frame enhancer
///
/// Owns the camera's LUT (if any), the sharpen kernel and a cached CLAHE
/// operator that is rebuilt only when the clip limit or tile grid changes.
/// Never shared across cameras.
pub struct FrameEnhancer {
    lut: Option<ColorLut>,
    sharpen_kernel: Mat,
    clahe: Ptr<imgproc::CLAHE>,
    clahe_clip_limit: f64,
    clahe_tile_grid: (u32, u32),
}

impl FrameEnhancer {
    /// Create an enhancer, loading the camera's LUT if a path is given
    ///
    /// A missing or malformed LUT file disables the LUT stage for this camera
    /// but never fails the enhancer.
    pub fn new(camera_id: &str, lut_path: Option<&Path>) -> EnhanceResult<Self> {
        let lut = match lut_path {
            Some(path) => match ColorLut::load(path) {
                Ok(lut) => {
                    info!("[{}] LUT loaded: {}", camera_id, path.display());
                    Some(lut)
                }
                Err(e) => {
                    warn!("[{}] LUT disabled ({}): {}", camera_id, path.display(), e);
                    None
                }
            },
            None => None,
        };

        let defaults = EnhanceParams::default();
        let (grid_w, grid_h) = defaults.clahe_tile_grid_size;
        let clahe = imgproc::create_clahe(
            defaults.clahe_clip_limit,
            Size::new(grid_w as i32, grid_h as i32),
        )?;

        Ok(Self {
            lut,
            sharpen_kernel: Mat::from_slice_2d(SHARPEN_KERNEL.as_slice())?,
            clahe,
            clahe_clip_limit: defaults.clahe_clip_limit,
            clahe_tile_grid: defaults.clahe_tile_grid_size,
        })
    }

    /// Whether this camera has a usable LUT
    pub fn has_lut(&self) -> bool {
        self.lut.is_some()
    }

    /// Run the full chain on one BGR frame, returning a new buffer
    pub fn enhance(
        &mut self,
        bgr: &[u8],
        width: u32,
        height: u32,
        params: &EnhanceParams,
    ) -> EnhanceResult<Vec<u8>> {
        let src = bytes_to_mat(bgr, width, height)?;
        let mut result = src.try_clone()?;

        // 1. LUT mapping with optional strength blend
        if params.lut_enabled {
            if let Some(ref lut) = self.lut {
                let mapped = lut.apply(&result)?;
                result = if params.lut_strength < 1.0 {
                    let mut blended = Mat::default();
                    core::add_weighted(
                        &result,
                        1.0 - params.lut_strength,
                        &mapped,
                        params.lut_strength,
                        0.0,
                        &mut blended,
                        -1,
                    )?;
                    blended
                } else {
                    mapped
                };
            }
        }

        // 2. Gamma correction
        if params.gamma != 1.0 {
            result = apply_gamma(&result, params.gamma)?;
        }

        // 3. CLAHE on the Lab lightness channel
        if params.clahe_enabled {
            result = self.apply_clahe(&result, params.clahe_clip_limit, params.clahe_tile_grid_size)?;
        }

        // 4. Sharpen
        let mut sharpened = Mat::default();
        imgproc::filter_2d(
            &result,
            &mut sharpened,
            -1,
            &self.sharpen_kernel,
            core::Point::new(-1, -1),
            0.0,
            BORDER_DEFAULT,
        )?;

        // 5. Defogging is accepted in the parameter record but not applied

        mat_to_bytes(&sharpened)
    }

    fn apply_clahe(&mut self, img: &Mat, clip_limit: f64, grid: (u32, u32)) -> EnhanceResult<Mat> {
        if clip_limit != self.clahe_clip_limit || grid != self.clahe_tile_grid {
            self.clahe =
                imgproc::create_clahe(clip_limit, Size::new(grid.0 as i32, grid.1 as i32))?;
            self.clahe_clip_limit = clip_limit;
            self.clahe_tile_grid = grid;
        }

        let mut lab = Mat::default();
        imgproc::cvt_color(img, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;

        let mut planes = Vector::<Mat>::new();
        core::split(&lab, &mut planes)?;

        let mut l_eq = Mat::default();
        self.clahe.apply(&planes.get(0)?, &mut l_eq)?;
        planes.set(0, l_eq)?;

        let mut merged = Mat::default();
        core::merge(&planes, &mut merged)?;

        let mut bgr = Mat::default();
        imgproc::cvt_color(&merged, &mut bgr, imgproc::COLOR_Lab2BGR, 0)?;
        Ok(bgr)
    }
}

/// Gamma correction through a precomputed 256-entry table
fn apply_gamma(img: &Mat, gamma: f64) -> EnhanceResult<Mat> {
    let inv = 1.0 / gamma;
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = ((i as f64 / 255.0).powf(inv) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let table_mat = Mat::from_slice(table.as_slice())?.try_clone()?;
    let mut out = Mat::default();
    core::lut(img, &table_mat, &mut out)?;
    Ok(out)
}

/// Wrap a BGR24 byte buffer as a Mat without copying
pub(crate) fn bytes_to_mat(bgr: &[u8], width: u32, height: u32) -> EnhanceResult<Mat> {
    let expected = (width as usize) * (height as usize) * 3;
    if bgr.len() != expected {
        return Err(EnhanceError::InvalidFrameBuffer {
            len: bgr.len(),
            expected,
            width,
            height,
        });
    }

    // SAFETY: the Mat borrows `bgr` only for the duration of this call chain;
    // every caller copies the data out before the buffer is released.
    let mat = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            height as i32,
            width as i32,
            CV_8UC3,
            bgr.as_ptr() as *mut std::ffi::c_void,
            (width * 3) as usize,
        )?
    };
    Ok(mat)
}

/// Copy a Mat's pixel data into an owned byte buffer
pub(crate) fn mat_to_bytes(mat: &Mat) -> EnhanceResult<Vec<u8>> {
    let rows = mat.rows();
    let cols = mat.cols();
    let data_size = (rows as usize) * (cols as usize) * 3;

    if mat.is_continuous() {
        let mut out = vec![0u8; data_size];
        // SAFETY: continuous CV_8UC3 Mat holds exactly rows*cols*3 bytes
        unsafe {
            let src_ptr = mat.ptr(0)?;
            std::ptr::copy_nonoverlapping(src_ptr, out.as_mut_ptr(), data_size);
        }
        Ok(out)
    } else {
        let mut out = Vec::with_capacity(data_size);
        for row in 0..rows {
            let row_data = mat.at_row::<u8>(row)?;
            out.extend_from_slice(row_data);
        }
        Ok(out)
    }
}
