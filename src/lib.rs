pub mod artifact;
pub mod detect;
pub mod error;
pub mod export;
pub mod feature_store;
pub mod features;
pub mod geometry;
pub mod image_list;
pub mod matching;
pub mod pairs;
pub mod pipeline;
