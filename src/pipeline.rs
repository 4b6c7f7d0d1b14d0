use std::path::PathBuf;
use std::time::Instant;

use crate::artifact::{self, ArtifactStore};
use crate::detect::FeatureDetector;
use crate::error::{Error, Result};
use crate::export;
use crate::feature_store::FeatureStore;
use crate::geometry::{self, GeometricModel, GeometricVerifier, PairFitter, RansacParams};
use crate::image_list::ImageList;
use crate::matching::{self, DescriptorMatcher, PairwiseMatches};
use crate::pairs::{self, PairSet};

pub struct MatchingConfig {
    pub img_dir: PathBuf,
    /// Nearest-neighbor distance ratio, in (0, 1).
    pub dist_ratio: f32,
    pub model: GeometricModel,
    /// Sequence-overlap window; mutually exclusive with `pair_list`.
    pub overlap: Option<usize>,
    /// Path to a predefined pair list; mutually exclusive with `overlap`.
    pub pair_list: Option<PathBuf>,
    pub ransac: RansacParams,
}

impl MatchingConfig {
    pub fn new(img_dir: impl Into<PathBuf>) -> MatchingConfig {
        MatchingConfig {
            img_dir: img_dir.into(),
            dist_ratio: 0.6,
            model: GeometricModel::Fundamental,
            overlap: None,
            pair_list: None,
            ransac: RansacParams::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineReport {
    pub images: usize,
    pub skipped_images: usize,
    pub putative_pairs: usize,
    pub geometric_pairs: usize,
}

/// The sequential batch pipeline: extract features, match putative pairs,
/// verify geometrically, export. Every stage is gated on its artifact in
/// the store, so a rerun resumes at the first incomplete stage.
pub struct MatchingPipeline<'a> {
    pub config: MatchingConfig,
    pub store: &'a dyn ArtifactStore,
    pub detector: &'a dyn FeatureDetector,
    pub matcher: &'a dyn DescriptorMatcher,
    /// Overrides the model-derived robust fitter when set.
    pub fitter: Option<&'a dyn PairFitter>,
}

impl<'a> MatchingPipeline<'a> {
    pub fn run(&self) -> Result<PipelineReport> {
        self.validate_config()?;

        if !self.store.exists(artifact::IMAGE_LIST) {
            return Err(Error::MissingInput(format!(
                "image list artifact {:?}",
                artifact::IMAGE_LIST
            )));
        }
        let list = ImageList::from_json(&self.store.read(artifact::IMAGE_LIST)?)?;
        let mut report = PipelineReport {
            images: list.len(),
            ..Default::default()
        };

        log::info!("extracting features for {} images", list.len());
        let timer = Instant::now();
        let feature_store = FeatureStore::new(self.store, self.detector, &self.config.img_dir);
        let features = feature_store.ensure_all(&list.images)?;
        report.skipped_images = features.iter().filter(|f| f.is_none()).count();
        log::info!("feature extraction done in {:.3} s", timer.elapsed().as_secs_f64());

        let putative = self.putative_stage(&list, &features)?;
        report.putative_pairs = putative.len();
        self.store.write(
            artifact::PUTATIVE_ADJACENCY,
            &export::adjacency_svg(list.len(), &putative),
        )?;

        let geometric = self.geometric_stage(&list, &features, &putative)?;
        report.geometric_pairs = geometric.len();
        self.store.write(
            artifact::GEOMETRIC_ADJACENCY,
            &export::adjacency_svg(list.len(), &geometric),
        )?;

        if report.skipped_images > 0 {
            log::warn!(
                "{} of {} images failed to decode and were skipped",
                report.skipped_images,
                report.images
            );
        }
        Ok(report)
    }

    fn validate_config(&self) -> Result<()> {
        if self.config.overlap.is_some() && self.config.pair_list.is_some() {
            return Err(Error::Config(
                "sequence-overlap window and predefined pair list are mutually exclusive"
                    .to_string(),
            ));
        }
        if self.config.overlap == Some(0) {
            return Err(Error::Config(
                "sequence-overlap window must be greater than zero".to_string(),
            ));
        }
        if !(0.0 < self.config.dist_ratio && self.config.dist_ratio < 1.0) {
            return Err(Error::Config(format!(
                "distance ratio {} outside (0, 1)",
                self.config.dist_ratio
            )));
        }
        Ok(())
    }

    fn select_pairs(&self, n: usize) -> Result<PairSet> {
        let selected = if let Some(w) = self.config.overlap {
            log::info!("sequence matching with overlap {}", w);
            pairs::contiguous_with_overlap(n, w)
        } else if let Some(path) = &self.config.pair_list {
            log::info!("predefined pair list {:?}", path);
            let text = std::fs::read_to_string(path)
                .map_err(|_| Error::MissingInput(format!("pair list {:?}", path)))?;
            pairs::predefined_pairs(&text, n)?
        } else {
            log::info!("exhaustive matching");
            pairs::exhaustive_pairs(n)
        };
        if selected.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(selected)
    }

    fn putative_stage(
        &self,
        list: &ImageList,
        features: &[Option<crate::features::FeatureSet>],
    ) -> Result<PairwiseMatches> {
        if self.store.exists(artifact::PUTATIVE_MATCHES) {
            log::info!("previous putative matches loaded");
            return export::matches_from_string(&self.store.read(artifact::PUTATIVE_MATCHES)?);
        }
        let selected = self.select_pairs(list.len())?;
        log::info!("matching {} pairs", selected.len());
        let timer = Instant::now();
        let putative = matching::match_pairs(&selected, features, self.matcher);
        log::info!("putative matching done in {:.3} s", timer.elapsed().as_secs_f64());
        self.store
            .write(artifact::PUTATIVE_MATCHES, &export::matches_to_string(&putative))?;
        Ok(putative)
    }

    fn geometric_stage(
        &self,
        list: &ImageList,
        features: &[Option<crate::features::FeatureSet>],
        putative: &PairwiseMatches,
    ) -> Result<PairwiseMatches> {
        let name = artifact::geometric_matches_name(self.config.model);
        if self.store.exists(name) {
            log::info!("previous geometric matches loaded");
            return export::matches_from_string(&self.store.read(name)?);
        }
        log::info!("geometric filtering of {} pairs", putative.len());
        let timer = Instant::now();
        let default_fitter;
        let fitter: &dyn PairFitter = match self.fitter {
            Some(f) => f,
            None => {
                default_fitter = geometry::build_fitter(self.config.model, list, self.config.ransac);
                default_fitter.as_ref()
            }
        };
        let verifier = GeometricVerifier::new(fitter, self.config.model);
        let geometric = verifier.verify(putative, features);
        log::info!(
            "geometric filtering done in {:.3} s",
            timer.elapsed().as_secs_f64()
        );
        self.store.write(name, &export::matches_to_string(&geometric))?;
        Ok(geometric)
    }
}
