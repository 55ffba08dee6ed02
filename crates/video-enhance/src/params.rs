//! Enhancement parameter management
//!
//! A single process-wide parameter record guarded by a mutex. The pipeline
//! takes one snapshot per frame; partial updates overwrite only the fields
//! they carry, and `reset` restores the full default set atomically.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Enhancement parameters applied by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceParams {
    /// LUT stage on/off (only effective when the camera has a valid LUT)
    pub lut_enabled: bool,
    /// Alpha blend between source and LUT-mapped image, in [0, 1]
    pub lut_strength: f64,
    /// Gamma correction value, identity when 1.0
    pub gamma: f64,
    /// CLAHE stage on/off
    pub clahe_enabled: bool,
    /// CLAHE clip limit, >= 1
    pub clahe_clip_limit: f64,
    /// CLAHE tile grid size
    pub clahe_tile_grid_size: (u32, u32),
    /// Defogging stage (reserved, never applied)
    pub defogging_enabled: bool,
    /// Defogging strength (reserved, never applied)
    pub defogging_strength: f64,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            lut_enabled: true,
            lut_strength: 1.0,
            gamma: 1.0,
            clahe_enabled: true,
            clahe_clip_limit: 2.0,
            clahe_tile_grid_size: (8, 8),
            defogging_enabled: false,
            defogging_strength: 0.3,
        }
    }
}

/// Partial parameter update; only the provided fields overwrite the record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhanceParamsUpdate {
    pub lut_enabled: Option<bool>,
    pub lut_strength: Option<f64>,
    pub gamma: Option<f64>,
    pub clahe_enabled: Option<bool>,
    pub clahe_clip_limit: Option<f64>,
    pub clahe_tile_grid_size: Option<(u32, u32)>,
    pub defogging_enabled: Option<bool>,
    pub defogging_strength: Option<f64>,
}

impl EnhanceParamsUpdate {
    /// True when the update carries no fields at all
    pub fn is_empty(&self) -> bool {
        self.lut_enabled.is_none()
            && self.lut_strength.is_none()
            && self.gamma.is_none()
            && self.clahe_enabled.is_none()
            && self.clahe_clip_limit.is_none()
            && self.clahe_tile_grid_size.is_none()
            && self.defogging_enabled.is_none()
            && self.defogging_strength.is_none()
    }

    /// Overlay this update onto an existing record
    pub fn apply_to(&self, params: &mut EnhanceParams) {
        if let Some(v) = self.lut_enabled {
            params.lut_enabled = v;
        }
        if let Some(v) = self.lut_strength {
            params.lut_strength = v;
        }
        if let Some(v) = self.gamma {
            params.gamma = v;
        }
        if let Some(v) = self.clahe_enabled {
            params.clahe_enabled = v;
        }
        if let Some(v) = self.clahe_clip_limit {
            params.clahe_clip_limit = v;
        }
        if let Some(v) = self.clahe_tile_grid_size {
            params.clahe_tile_grid_size = v;
        }
        if let Some(v) = self.defogging_enabled {
            params.defogging_enabled = v;
        }
        if let Some(v) = self.defogging_strength {
            params.defogging_strength = v;
        }
    }
}

/// Process-wide parameter store with copy-on-read semantics
///
/// Out-of-range values are accepted as-is; the pipeline clamps pixel values,
/// not parameters.
pub struct ParamStore {
    inner: Mutex<EnhanceParams>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EnhanceParams::default()),
        }
    }

    /// Deep snapshot of the current record
    pub fn get(&self) -> EnhanceParams {
        self.inner.lock().unwrap().clone()
    }

    /// Overlay a partial update, returns the resulting record
    pub fn update(&self, update: &EnhanceParamsUpdate) -> EnhanceParams {
        let mut params = self.inner.lock().unwrap();
        update.apply_to(&mut params);
        params.clone()
    }

    /// Restore the full default set atomically
    pub fn reset(&self) -> EnhanceParams {
        let mut params = self.inner.lock().unwrap();
        *params = EnhanceParams::default();
        params.clone()
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}
