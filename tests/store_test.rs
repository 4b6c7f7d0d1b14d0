use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma};
use pairwise_matching::artifact::{ArtifactStore, MemoryStore};
use pairwise_matching::detect::FeatureDetector;
use pairwise_matching::feature_store::FeatureStore;
use pairwise_matching::features::{FeatureSet, KeyPoint};
use pairwise_matching::image_list::ImageRecord;

struct CountingDetector {
    calls: AtomicUsize,
}

impl CountingDetector {
    fn new() -> CountingDetector {
        CountingDetector {
            calls: AtomicUsize::new(0),
        }
    }
}

impl FeatureDetector for CountingDetector {
    fn extract(&self, _img: &GrayImage) -> FeatureSet {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FeatureSet {
            keypoints: vec![
                KeyPoint {
                    x: 10.0,
                    y: 20.0,
                    scale: 1.0,
                    orientation: 0.5,
                },
                KeyPoint {
                    x: 30.0,
                    y: 12.0,
                    scale: 1.0,
                    orientation: -0.25,
                },
            ],
            descriptors: vec![vec![1.0, 0.0, 0.5], vec![0.0, 1.0, 0.25]],
        }
    }
}

fn write_test_image(dir: &std::path::Path, name: &str) {
    let img = GrayImage::from_fn(32, 32, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));
    img.save(dir.join(name)).unwrap();
}

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("pwm_store_test_{}_{}", tag, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_ensure_is_idempotent() {
    let img_dir = temp_dir("idempotent");
    write_test_image(&img_dir, "view0.png");

    let store = MemoryStore::new();
    let detector = CountingDetector::new();
    let feature_store = FeatureStore::new(&store, &detector, &img_dir);
    let record = ImageRecord {
        filename: "view0.png".to_string(),
        width: 32,
        height: 32,
        intrinsic_id: 0,
    };

    let first = feature_store.ensure(&record).unwrap().unwrap();
    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert!(store.exists("view0.feat"));
    assert!(store.exists("view0.desc"));

    // Second call must reload the artifacts, not re-run the detector, and
    // return identical data.
    let second = feature_store.ensure(&record).unwrap().unwrap();
    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);

    std::fs::remove_dir_all(&img_dir).ok();
}

#[test]
fn test_decode_failure_is_skipped() {
    let img_dir = temp_dir("decode_failure");
    std::fs::write(img_dir.join("broken.png"), b"not an image").unwrap();

    let store = MemoryStore::new();
    let detector = CountingDetector::new();
    let feature_store = FeatureStore::new(&store, &detector, &img_dir);

    let broken = ImageRecord {
        filename: "broken.png".to_string(),
        width: 32,
        height: 32,
        intrinsic_id: 0,
    };
    let missing = ImageRecord {
        filename: "no_such_file.png".to_string(),
        width: 32,
        height: 32,
        intrinsic_id: 0,
    };

    assert!(feature_store.ensure(&broken).unwrap().is_none());
    assert!(feature_store.ensure(&missing).unwrap().is_none());
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);

    std::fs::remove_dir_all(&img_dir).ok();
}

#[test]
fn test_ensure_all_reports_gaps_in_place() {
    let img_dir = temp_dir("ensure_all");
    write_test_image(&img_dir, "ok.png");

    let store = MemoryStore::new();
    let detector = CountingDetector::new();
    let feature_store = FeatureStore::new(&store, &detector, &img_dir);
    let records = vec![
        ImageRecord {
            filename: "ok.png".to_string(),
            width: 32,
            height: 32,
            intrinsic_id: 0,
        },
        ImageRecord {
            filename: "gone.png".to_string(),
            width: 32,
            height: 32,
            intrinsic_id: 0,
        },
    ];

    let features = feature_store.ensure_all(&records).unwrap();
    assert_eq!(features.len(), 2);
    assert!(features[0].is_some());
    assert!(features[1].is_none());

    std::fs::remove_dir_all(&img_dir).ok();
}
