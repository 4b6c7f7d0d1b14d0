use glam::Vec2;
use image::GrayImage;

use crate::features::{Descriptor, FeatureSet, KeyPoint};

/// Keypoint/descriptor extraction strategy. The pipeline only sees this
/// trait, so the detector can be swapped at runtime (or stubbed in tests)
/// without touching the stage logic.
pub trait FeatureDetector: Send + Sync {
    fn extract(&self, img: &GrayImage) -> FeatureSet;
}

const RING_OFFSETS: [(i32, i32); 12] = [
    (-3, 0),
    (-2, 1),
    (-1, 2),
    (0, 3),
    (1, 2),
    (2, 1),
    (3, 0),
    (2, -1),
    (1, -2),
    (0, -3),
    (-1, -2),
    (-2, -1),
];

// Patch support half-width; keypoints closer to the border are dropped.
const PATCH_MARGIN: i32 = 8;

/// Built-in detector: FAST-style ring test for corners, normalized 8x8
/// intensity patch (64 floats) as descriptor, intensity-centroid
/// orientation.
pub struct CornerPatchDetector {
    pub threshold: u8,
    pub max_features: usize,
}

impl Default for CornerPatchDetector {
    fn default() -> Self {
        CornerPatchDetector {
            threshold: 20,
            max_features: 2000,
        }
    }
}

impl CornerPatchDetector {
    fn corner_score(&self, img: &GrayImage, x: i32, y: i32) -> Option<u32> {
        let p = img.get_pixel(x as u32, y as u32)[0];
        let mut brighter = 0u32;
        let mut darker = 0u32;
        let mut score = 0u32;
        for &(dx, dy) in &RING_OFFSETS {
            let val = img.get_pixel((x + dx) as u32, (y + dy) as u32)[0];
            if val > p.saturating_add(self.threshold) {
                brighter += 1;
                score += (val - p) as u32;
            } else if val < p.saturating_sub(self.threshold) {
                darker += 1;
                score += (p - val) as u32;
            }
        }
        (brighter >= 9 || darker >= 9).then_some(score)
    }

    fn describe(&self, img: &GrayImage, x: i32, y: i32) -> (Descriptor, f32) {
        let mut desc = Vec::with_capacity(64);
        let mut centroid = Vec2::ZERO;
        let mut mass = 0.0f32;
        for r in 0..8i32 {
            for c in 0..8i32 {
                let dx = c * 2 - 7;
                let dy = r * 2 - 7;
                let v = img.get_pixel((x + dx) as u32, (y + dy) as u32)[0] as f32;
                centroid += Vec2::new(dx as f32, dy as f32) * v;
                mass += v;
                desc.push(v);
            }
        }
        let mean = mass / 64.0;
        for v in desc.iter_mut() {
            *v -= mean;
        }
        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-6 {
            for v in desc.iter_mut() {
                *v /= norm;
            }
        }
        let orientation = if mass > 0.0 {
            let c = centroid / mass;
            c.y.atan2(c.x)
        } else {
            0.0
        };
        (desc, orientation)
    }
}

impl FeatureDetector for CornerPatchDetector {
    fn extract(&self, img: &GrayImage) -> FeatureSet {
        let w = img.width() as i32;
        let h = img.height() as i32;
        let mut corners: Vec<(u32, i32, i32)> = Vec::new();
        if w > 2 * PATCH_MARGIN && h > 2 * PATCH_MARGIN {
            for y in PATCH_MARGIN..h - PATCH_MARGIN {
                for x in PATCH_MARGIN..w - PATCH_MARGIN {
                    if let Some(score) = self.corner_score(img, x, y) {
                        corners.push((score, x, y));
                    }
                }
            }
        }
        corners.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)).then(a.1.cmp(&b.1)));
        corners.truncate(self.max_features);

        let mut set = FeatureSet::default();
        for (_, x, y) in corners {
            let (desc, orientation) = self.describe(img, x, y);
            set.keypoints.push(KeyPoint {
                x: x as f32,
                y: y as f32,
                scale: PATCH_MARGIN as f32,
                orientation,
            });
            set.descriptors.push(desc);
        }
        set
    }
}
