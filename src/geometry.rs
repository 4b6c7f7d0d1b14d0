use std::collections::HashMap;

use indicatif::ParallelProgressIterator;
use nalgebra as na;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::features::FeatureSet;
use crate::image_list::ImageList;
use crate::matching::{IndMatch, PairwiseMatches};
use crate::pairs::Pair;

/// Geometric model family used for pairwise verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometricModel {
    Fundamental,
    Essential,
    Homography,
}

/// Residual tolerance in pixels for the robust fit.
pub const MAX_RESIDUAL: f64 = 4.0;

/// Essential-model overlap gate: a verified pair is kept only with at
/// least this many inliers...
pub const MIN_INLIER_COUNT: usize = 50;
/// ...and at least this inlier/putative ratio. Low-overlap pairs hurt
/// reconstruction more than they help.
pub const MIN_INLIER_RATIO: f32 = 0.3;

/// Survival rule for the essential-model gate. Both boundaries survive.
pub fn passes_overlap_gate(geometric: usize, putative: usize) -> bool {
    if putative == 0 {
        return false;
    }
    geometric >= MIN_INLIER_COUNT && geometric as f32 / putative as f32 >= MIN_INLIER_RATIO
}

pub type PointPair = (na::Point2<f64>, na::Point2<f64>);

/// Minimal-sample model estimator driven by `ransac`.
pub trait RobustModel {
    type Model;
    fn min_sample_size(&self) -> usize;
    fn estimate(&self, sample: &[PointPair]) -> Option<Self::Model>;
    fn error(&self, model: &Self::Model, pair: &PointPair) -> f64;
}

#[derive(Clone, Copy, Debug)]
pub struct RansacParams {
    pub max_iterations: usize,
    pub threshold: f64,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        RansacParams {
            max_iterations: 1024,
            threshold: MAX_RESIDUAL,
            confidence: 0.99,
            seed: 0,
        }
    }
}

fn score_inliers<M: RobustModel>(
    estimator: &M,
    model: &M::Model,
    data: &[PointPair],
    threshold: f64,
) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, p)| estimator.error(model, p) < threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Seeded RANSAC over a minimal-sample estimator. Returns the inlier
/// indices of the best consensus, in ascending order, after one refit on
/// the consensus set. Empty when no consistent model is found.
pub fn ransac<M: RobustModel>(estimator: &M, data: &[PointPair], params: &RansacParams) -> Vec<usize> {
    let m = estimator.min_sample_size();
    if data.len() < m {
        return Vec::new();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut best: Vec<usize> = Vec::new();
    let mut needed = params.max_iterations;
    let mut it = 0;
    while it < needed.min(params.max_iterations) {
        it += 1;
        let idx = rand::seq::index::sample(&mut rng, data.len(), m);
        let sample: Vec<PointPair> = idx.iter().map(|i| data[i]).collect();
        let Some(model) = estimator.estimate(&sample) else {
            continue;
        };
        let inliers = score_inliers(estimator, &model, data, params.threshold);
        if inliers.len() > best.len() {
            best = inliers;
            // Standard adaptive stop on the inlier fraction seen so far.
            let w = best.len() as f64 / data.len() as f64;
            let denom = (1.0 - w.powi(m as i32)).max(1e-12).ln();
            needed = ((1.0 - params.confidence).ln() / denom).ceil() as usize;
        }
    }
    if best.len() < m {
        return Vec::new();
    }
    let consensus: Vec<PointPair> = best.iter().map(|&i| data[i]).collect();
    if let Some(model) = estimator.estimate(&consensus) {
        let refined = score_inliers(estimator, &model, data, params.threshold);
        if refined.len() >= best.len() {
            return refined;
        }
    }
    best
}

/// Hartley normalization: centroid to the origin, mean distance sqrt(2).
fn normalize_points(pts: &[na::Point2<f64>]) -> (Vec<na::Point2<f64>>, na::Matrix3<f64>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = na::Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| na::Point2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    (normalized, t)
}

/// Unit vector spanning the (approximate) nullspace of `a`, via the
/// smallest eigenpair of a^T a. Works for the minimal 8x9 case where a
/// thin SVD would not expose the ninth right singular vector.
fn nullspace(a: &na::DMatrix<f64>) -> Option<na::DVector<f64>> {
    let ata = a.transpose() * a;
    let eigen = na::SymmetricEigen::new(ata);
    let mut min_idx = 0;
    for (i, val) in eigen.eigenvalues.iter().enumerate() {
        if *val < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    let v = eigen.eigenvectors.column(min_idx).into_owned();
    (v.norm() > 1e-12).then_some(v)
}

fn vec9_to_mat3(v: &na::DVector<f64>) -> na::Matrix3<f64> {
    na::Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8])
}

fn epipolar_rows(a: &mut na::DMatrix<f64>, row: usize, p1: &na::Point2<f64>, p2: &na::Point2<f64>) {
    a[(row, 0)] = p2.x * p1.x;
    a[(row, 1)] = p2.x * p1.y;
    a[(row, 2)] = p2.x;
    a[(row, 3)] = p2.y * p1.x;
    a[(row, 4)] = p2.y * p1.y;
    a[(row, 5)] = p2.y;
    a[(row, 6)] = p1.x;
    a[(row, 7)] = p1.y;
    a[(row, 8)] = 1.0;
}

fn eight_point(sample: &[PointPair]) -> Option<na::Matrix3<f64>> {
    let (n1, t1) = normalize_points(&sample.iter().map(|p| p.0).collect::<Vec<_>>());
    let (n2, t2) = normalize_points(&sample.iter().map(|p| p.1).collect::<Vec<_>>());
    let mut a = na::DMatrix::zeros(sample.len(), 9);
    for (r, (p1, p2)) in n1.iter().zip(&n2).enumerate() {
        epipolar_rows(&mut a, r, p1, p2);
    }
    let f = vec9_to_mat3(&nullspace(&a)?);
    Some(t2.transpose() * f * t1)
}

fn project_rank2(f: &na::Matrix3<f64>, essential: bool) -> na::Matrix3<f64> {
    let svd = na::SVD::new(*f, true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return *f;
    };
    let sv = &svd.singular_values;
    let diag = if essential {
        let s = 0.5 * (sv[0] + sv[1]);
        na::Vector3::new(s, s, 0.0)
    } else {
        na::Vector3::new(sv[0], sv[1], 0.0)
    };
    u * na::Matrix3::from_diagonal(&diag) * v_t
}

/// Distance of each point to the epipolar line induced by the other, the
/// larger of the two directions.
fn epipolar_distance(f: &na::Matrix3<f64>, pair: &PointPair) -> f64 {
    let x1 = na::Vector3::new(pair.0.x, pair.0.y, 1.0);
    let x2 = na::Vector3::new(pair.1.x, pair.1.y, 1.0);
    let l2 = f * x1;
    let l1 = f.transpose() * x2;
    let d2 = line_distance(&l2, &x2);
    let d1 = line_distance(&l1, &x1);
    d1.max(d2)
}

fn line_distance(l: &na::Vector3<f64>, x: &na::Vector3<f64>) -> f64 {
    let denom = (l.x * l.x + l.y * l.y).sqrt();
    if denom < 1e-12 {
        return f64::INFINITY;
    }
    (l.dot(x)).abs() / denom
}

/// Fundamental matrix, normalized 8-point algorithm with rank-2 projection.
pub struct FundamentalEstimator;

impl RobustModel for FundamentalEstimator {
    type Model = na::Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        8
    }

    fn estimate(&self, sample: &[PointPair]) -> Option<Self::Model> {
        eight_point(sample).map(|f| project_rank2(&f, false))
    }

    fn error(&self, model: &Self::Model, pair: &PointPair) -> f64 {
        epipolar_distance(model, pair)
    }
}

/// Essential matrix via the 8-point algorithm on K-normalized coordinates,
/// with singular values projected to (s, s, 0). Expects its input already
/// normalized by the calibration matrices; errors are in normalized units.
pub struct EssentialEstimator;

impl RobustModel for EssentialEstimator {
    type Model = na::Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        8
    }

    fn estimate(&self, sample: &[PointPair]) -> Option<Self::Model> {
        eight_point(sample).map(|e| project_rank2(&e, true))
    }

    fn error(&self, model: &Self::Model, pair: &PointPair) -> f64 {
        epipolar_distance(model, pair)
    }
}

/// Homography via the normalized 4-point DLT.
pub struct HomographyEstimator;

impl RobustModel for HomographyEstimator {
    type Model = na::Matrix3<f64>;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, sample: &[PointPair]) -> Option<Self::Model> {
        let (n1, t1) = normalize_points(&sample.iter().map(|p| p.0).collect::<Vec<_>>());
        let (n2, t2) = normalize_points(&sample.iter().map(|p| p.1).collect::<Vec<_>>());
        let mut a = na::DMatrix::zeros(sample.len() * 2, 9);
        for (r, (p1, p2)) in n1.iter().zip(&n2).enumerate() {
            let (x1, y1) = (p1.x, p1.y);
            let (x2, y2) = (p2.x, p2.y);
            a[(2 * r, 0)] = -x1;
            a[(2 * r, 1)] = -y1;
            a[(2 * r, 2)] = -1.0;
            a[(2 * r, 6)] = x2 * x1;
            a[(2 * r, 7)] = x2 * y1;
            a[(2 * r, 8)] = x2;
            a[(2 * r + 1, 3)] = -x1;
            a[(2 * r + 1, 4)] = -y1;
            a[(2 * r + 1, 5)] = -1.0;
            a[(2 * r + 1, 6)] = y2 * x1;
            a[(2 * r + 1, 7)] = y2 * y1;
            a[(2 * r + 1, 8)] = y2;
        }
        let h = vec9_to_mat3(&nullspace(&a)?);
        let h = t2.try_inverse()? * h * t1;
        (h[(2, 2)].abs() > 1e-12).then(|| h / h[(2, 2)])
    }

    fn error(&self, model: &Self::Model, pair: &PointPair) -> f64 {
        let p = model * na::Vector3::new(pair.0.x, pair.0.y, 1.0);
        if p.z.abs() < 1e-12 {
            return f64::INFINITY;
        }
        let dx = p.x / p.z - pair.1.x;
        let dy = p.y / p.z - pair.1.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Per-pair robust fit strategy, the seam the verifier dispatches through.
/// `admissible` excludes pairs the model cannot handle at all (essential
/// without known calibration); `fit_pair` returns inlier indices into the
/// pair's putative correspondence list.
pub trait PairFitter: Send + Sync {
    fn admissible(&self, _pair: Pair) -> bool {
        true
    }
    fn fit_pair(&self, pair: Pair, pts: &[PointPair]) -> Vec<usize>;
}

fn pair_seed(base: u64, (i, j): Pair) -> u64 {
    base ^ ((i as u64) << 32 | j as u64)
}

pub struct FundamentalFitter {
    pub params: RansacParams,
}

impl PairFitter for FundamentalFitter {
    fn fit_pair(&self, pair: Pair, pts: &[PointPair]) -> Vec<usize> {
        let params = RansacParams {
            seed: pair_seed(self.params.seed, pair),
            ..self.params
        };
        ransac(&FundamentalEstimator, pts, &params)
    }
}

pub struct HomographyFitter {
    pub params: RansacParams,
}

impl PairFitter for HomographyFitter {
    fn fit_pair(&self, pair: Pair, pts: &[PointPair]) -> Vec<usize> {
        let params = RansacParams {
            seed: pair_seed(self.params.seed, pair),
            ..self.params
        };
        ransac(&HomographyEstimator, pts, &params)
    }
}

/// Essential-model fitter. Pairs where either image lacks a known
/// calibration matrix are inadmissible by construction. Points are mapped
/// through K^-1 and the pixel residual tolerance is rescaled by the mean
/// focal length of the two cameras.
pub struct EssentialFitter {
    pub params: RansacParams,
    k_inv: HashMap<u32, na::Matrix3<f64>>,
    focal: HashMap<u32, f64>,
}

impl EssentialFitter {
    pub fn new(list: &ImageList, params: RansacParams) -> EssentialFitter {
        let mut k_inv = HashMap::new();
        let mut focal = HashMap::new();
        for (id, k) in list.known_k_by_image() {
            if let Some(inv) = k.try_inverse() {
                focal.insert(id, 0.5 * (k[(0, 0)] + k[(1, 1)]));
                k_inv.insert(id, inv);
            }
        }
        EssentialFitter {
            params,
            k_inv,
            focal,
        }
    }

    fn apply(k_inv: &na::Matrix3<f64>, p: &na::Point2<f64>) -> na::Point2<f64> {
        let v = k_inv * na::Vector3::new(p.x, p.y, 1.0);
        na::Point2::new(v.x / v.z, v.y / v.z)
    }
}

impl PairFitter for EssentialFitter {
    fn admissible(&self, (i, j): Pair) -> bool {
        self.k_inv.contains_key(&i) && self.k_inv.contains_key(&j)
    }

    fn fit_pair(&self, pair: Pair, pts: &[PointPair]) -> Vec<usize> {
        let (i, j) = pair;
        let (Some(ki), Some(kj)) = (self.k_inv.get(&i), self.k_inv.get(&j)) else {
            return Vec::new();
        };
        let normalized: Vec<PointPair> = pts
            .iter()
            .map(|(p1, p2)| (Self::apply(ki, p1), Self::apply(kj, p2)))
            .collect();
        let mean_focal = 0.5 * (self.focal[&i] + self.focal[&j]);
        let params = RansacParams {
            threshold: self.params.threshold / mean_focal.max(1e-12),
            seed: pair_seed(self.params.seed, pair),
            ..self.params
        };
        ransac(&EssentialEstimator, &normalized, &params)
    }
}

/// Builds the fitter matching a model choice.
pub fn build_fitter(
    model: GeometricModel,
    list: &ImageList,
    params: RansacParams,
) -> Box<dyn PairFitter> {
    match model {
        GeometricModel::Fundamental => Box::new(FundamentalFitter { params }),
        GeometricModel::Homography => Box::new(HomographyFitter { params }),
        GeometricModel::Essential => Box::new(EssentialFitter::new(list, params)),
    }
}

/// Robust per-pair verification plus the essential-model overlap gate.
pub struct GeometricVerifier<'a> {
    fitter: &'a dyn PairFitter,
    prune_low_overlap: bool,
}

impl<'a> GeometricVerifier<'a> {
    pub fn new(fitter: &'a dyn PairFitter, model: GeometricModel) -> GeometricVerifier<'a> {
        GeometricVerifier {
            fitter,
            prune_low_overlap: model == GeometricModel::Essential,
        }
    }

    /// Verifies every putative pair. Each surviving entry is a subsequence
    /// of the pair's putative correspondences; pairs with no consistent
    /// model simply drop out.
    pub fn verify(
        &self,
        putative: &PairwiseMatches,
        features: &[Option<FeatureSet>],
    ) -> PairwiseMatches {
        let entries: Vec<(&Pair, &Vec<IndMatch>)> = putative.iter().collect();
        let mut verified: PairwiseMatches = entries
            .par_iter()
            .progress_count(entries.len() as u64)
            .filter_map(|&(&pair, matches)| {
                if !self.fitter.admissible(pair) {
                    return None;
                }
                let (i, j) = pair;
                let a = features.get(i as usize)?.as_ref()?;
                let b = features.get(j as usize)?.as_ref()?;
                if !matches
                    .iter()
                    .all(|m| (m.i as usize) < a.len() && (m.j as usize) < b.len())
                {
                    log::warn!("pair {:?}: match indices out of range, skipping", pair);
                    return None;
                }
                let pts: Vec<PointPair> = matches
                    .iter()
                    .map(|m| {
                        let ka = &a.keypoints[m.i as usize];
                        let kb = &b.keypoints[m.j as usize];
                        (
                            na::Point2::new(ka.x as f64, ka.y as f64),
                            na::Point2::new(kb.x as f64, kb.y as f64),
                        )
                    })
                    .collect();
                let inliers = self.fitter.fit_pair(pair, &pts);
                if inliers.is_empty() {
                    return None;
                }
                let kept: Vec<IndMatch> = inliers.iter().map(|&k| matches[k]).collect();
                Some((pair, kept))
            })
            .collect();

        if self.prune_low_overlap {
            verified.retain(|pair, kept| {
                let total = putative.get(pair).map_or(0, |m| m.len());
                let keep = passes_overlap_gate(kept.len(), total);
                if !keep {
                    log::debug!("pruning pair {:?}: {}/{} inliers", pair, kept.len(), total);
                }
                keep
            });
        }
        verified
    }
}
