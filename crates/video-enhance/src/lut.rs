//! Per-channel color look-up tables
//!
//! A LUT is a 256x3 byte mapping serialized as a JSON array of 256 rows of
//! 3 ints. Channel `c` maps source byte `v` to `LUT[v][c]`.

use crate::error::{EnhanceError, EnhanceResult};
use opencv::{
    core::{self, Mat, Vector},
    prelude::*,
};
use std::path::Path;

/// A 256x3 per-channel byte mapping
pub struct ColorLut {
    /// One 256-entry CV_8U table per BGR channel
    tables: [Mat; 3],
}

impl ColorLut {
    /// Load a LUT from a JSON file
    ///
    /// Any read, parse, shape or range problem is an error; callers decide
    /// whether that disables the LUT stage or fails harder.
    pub fn load<P: AsRef<Path>>(path: P) -> EnhanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<Vec<i64>> = serde_json::from_str(&content)
            .map_err(|e| EnhanceError::LutParseError(e.to_string()))?;
        Self::from_rows(&rows)
    }

    /// Build a LUT from 256 rows of 3 byte values
    pub fn from_rows(rows: &[Vec<i64>]) -> EnhanceResult<Self> {
        if rows.len() != 256 || rows.iter().any(|r| r.len() != 3) {
            return Err(EnhanceError::InvalidLutShape {
                rows: rows.len(),
                cols: rows.first().map_or(0, |r| r.len()),
            });
        }

        let mut channels = [[0u8; 256]; 3];
        for (v, row) in rows.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if !(0..=255).contains(&value) {
                    return Err(EnhanceError::LutParseError(format!(
                        "value {} out of byte range at [{}][{}]",
                        value, v, c
                    )));
                }
                channels[c][v] = value as u8;
            }
        }

        Ok(Self {
            tables: [
                make_table(&channels[0])?,
                make_table(&channels[1])?,
                make_table(&channels[2])?,
            ],
        })
    }

    /// The identity mapping, useful for tests and calibration baselines
    pub fn identity() -> EnhanceResult<Self> {
        let rows: Vec<Vec<i64>> = (0..256).map(|v| vec![v, v, v]).collect();
        Self::from_rows(&rows)
    }

    /// Map every channel of a BGR image through its table
    pub fn apply(&self, src: &Mat) -> EnhanceResult<Mat> {
        let mut planes = Vector::<Mat>::new();
        core::split(src, &mut planes)?;

        let mut mapped = Vector::<Mat>::new();
        for (c, table) in self.tables.iter().enumerate() {
            let mut out = Mat::default();
            core::lut(&planes.get(c)?, table, &mut out)?;
            mapped.push(out);
        }

        let mut result = Mat::default();
        core::merge(&mapped, &mut result)?;
        Ok(result)
    }
}

fn make_table(values: &[u8; 256]) -> EnhanceResult<Mat> {
    Ok(Mat::from_slice(values.as_slice())?.try_clone()?)
}
