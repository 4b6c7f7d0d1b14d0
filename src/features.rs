use serde::{Deserialize, Serialize};

/// Descriptor length of the built-in patch detector.
pub const DESC_DIM: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub orientation: f32,
}

impl KeyPoint {
    pub fn pos(&self) -> glam::Vec2 {
        glam::Vec2::new(self.x, self.y)
    }
}

pub type Descriptor = Vec<f32>;

/// Keypoints and descriptors of one image, aligned index for index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
