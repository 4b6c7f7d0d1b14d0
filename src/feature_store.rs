use std::path::{Path, PathBuf};

use image::ImageReader;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::artifact::{self, ArtifactStore};
use crate::detect::FeatureDetector;
use crate::error::{Error, Result};
use crate::features::{Descriptor, FeatureSet, KeyPoint};
use crate::image_list::ImageRecord;

/// Per-image feature cache. Extraction runs once per image; afterwards the
/// two persisted artifacts (keypoints, descriptors) are reloaded instead of
/// re-invoking the detector. Image dimensions come from the image list
/// metadata, so the cached path never touches the image file.
pub struct FeatureStore<'a> {
    store: &'a dyn ArtifactStore,
    detector: &'a dyn FeatureDetector,
    img_dir: PathBuf,
}

impl<'a> FeatureStore<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        detector: &'a dyn FeatureDetector,
        img_dir: impl AsRef<Path>,
    ) -> FeatureStore<'a> {
        FeatureStore {
            store,
            detector,
            img_dir: img_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the image's features, extracting and persisting them on the
    /// first call and reloading the artifacts on every later call.
    /// `Ok(None)` means the image failed to decode and was skipped.
    pub fn ensure(&self, record: &ImageRecord) -> Result<Option<FeatureSet>> {
        let stem = record.stem();
        let feat = artifact::feat_name(stem);
        let desc = artifact::desc_name(stem);

        if self.store.exists(&feat) && self.store.exists(&desc) {
            let keypoints: Vec<KeyPoint> = serde_json::from_str(&self.store.read(&feat)?)
                .map_err(|e| Error::Parse(format!("{}: {}", feat, e)))?;
            let descriptors: Vec<Descriptor> = serde_json::from_str(&self.store.read(&desc)?)
                .map_err(|e| Error::Parse(format!("{}: {}", desc, e)))?;
            if keypoints.len() != descriptors.len() {
                return Err(Error::Parse(format!(
                    "{}: {} keypoints but {} descriptors",
                    stem,
                    keypoints.len(),
                    descriptors.len()
                )));
            }
            return Ok(Some(FeatureSet {
                keypoints,
                descriptors,
            }));
        }

        let path = self.img_dir.join(&record.filename);
        let img = match ImageReader::open(&path) {
            Ok(reader) => match reader.decode() {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("skipping {}: decode failed ({})", record.filename, e);
                    return Ok(None);
                }
            },
            Err(e) => {
                log::warn!("skipping {}: {}", record.filename, e);
                return Ok(None);
            }
        };

        let set = self.detector.extract(&img.to_luma8());
        self.store
            .write(&feat, &serde_json::to_string(&set.keypoints).map_err(Error::from)?)?;
        self.store
            .write(&desc, &serde_json::to_string(&set.descriptors).map_err(Error::from)?)?;
        Ok(Some(set))
    }

    /// Runs `ensure` for every image in parallel, with a progress bar.
    /// Entries are `None` for images that failed to decode.
    pub fn ensure_all(&self, records: &[ImageRecord]) -> Result<Vec<Option<FeatureSet>>> {
        records
            .par_iter()
            .progress_count(records.len() as u64)
            .map(|record| self.ensure(record))
            .collect()
    }
}
