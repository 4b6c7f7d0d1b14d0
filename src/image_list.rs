use std::collections::HashMap;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One calibration group, possibly shared by several images taken with the
/// same camera. `k` is the 3x3 calibration matrix in row-major order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntrinsicGroup {
    pub focal: f64,
    pub k: [[f64; 3]; 3],
    pub known: bool,
    pub width: u32,
    pub height: u32,
}

impl IntrinsicGroup {
    pub fn k_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::from_fn(|r, c| self.k[r][c])
    }

    /// True if two groups carry the same calibration matrix. Kept as an
    /// extension point for grouping images by identical calibration; the
    /// pipeline does not act on it.
    pub fn same_calibration(&self, other: &IntrinsicGroup) -> bool {
        self.k == other.k
    }
}

/// One image of the collection. The image id is its index in
/// `ImageList::images`; records are immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecord {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub intrinsic_id: usize,
}

impl ImageRecord {
    /// Filename without directory and extension, used to key the per-image
    /// feature artifacts.
    pub fn stem(&self) -> &str {
        let name = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename);
        name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageList {
    pub images: Vec<ImageRecord>,
    pub intrinsics: Vec<IntrinsicGroup>,
}

impl ImageList {
    pub fn from_json(text: &str) -> Result<ImageList> {
        let list: ImageList = serde_json::from_str(text)?;
        if list.images.is_empty() {
            return Err(Error::Parse("image list holds no images".to_string()));
        }
        for (i, img) in list.images.iter().enumerate() {
            if img.intrinsic_id >= list.intrinsics.len() {
                return Err(Error::Parse(format!(
                    "image {} references unknown intrinsic group {}",
                    i, img.intrinsic_id
                )));
            }
        }
        Ok(list)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Calibration matrix per image id, for images whose group is known.
    /// Images with unknown intrinsics are simply absent.
    pub fn known_k_by_image(&self) -> HashMap<u32, na::Matrix3<f64>> {
        self.images
            .iter()
            .enumerate()
            .filter_map(|(i, img)| {
                let group = &self.intrinsics[img.intrinsic_id];
                group.known.then(|| (i as u32, group.k_matrix()))
            })
            .collect()
    }
}
