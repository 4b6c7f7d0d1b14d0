use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::geometry::GeometricModel;

pub const IMAGE_LIST: &str = "lists.json";
pub const PUTATIVE_MATCHES: &str = "matches.putative.txt";
pub const PUTATIVE_ADJACENCY: &str = "putative_adjacency.svg";
pub const GEOMETRIC_ADJACENCY: &str = "geometric_adjacency.svg";

/// Keypoint artifact name for an image file stem.
pub fn feat_name(stem: &str) -> String {
    format!("{}.feat", stem)
}

/// Descriptor artifact name for an image file stem.
pub fn desc_name(stem: &str) -> String {
    format!("{}.desc", stem)
}

/// Geometric match artifact name, one per model family.
pub fn geometric_matches_name(model: GeometricModel) -> &'static str {
    match model {
        GeometricModel::Fundamental => "matches.f.txt",
        GeometricModel::Essential => "matches.e.txt",
        GeometricModel::Homography => "matches.h.txt",
    }
}

/// Named text artifacts keyed by relative name. Every stage of the pipeline
/// is gated on artifact presence through this trait, so tests can swap in
/// an in-memory store and assert what was (not) recomputed.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, name: &str) -> bool;
    fn read(&self, name: &str) -> io::Result<String>;
    fn write(&self, name: &str, contents: &str) -> io::Result<()>;
}

/// Filesystem-backed store rooted at the output directory.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens the store, creating the directory if needed.
    pub fn create(root: impl AsRef<Path>) -> io::Result<DirStore> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(DirStore { root })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ArtifactStore for DirStore {
    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn read(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.path(name))
    }

    fn write(&self, name: &str, contents: &str) -> io::Result<()> {
        // Whole-file replace via rename, so readers never see a torn file.
        let tmp = self.path(&format!("{}.tmp", name));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, self.path(name))
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn insert(&self, name: &str, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), contents.to_string());
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }

    fn write(&self, name: &str, contents: &str) -> io::Result<()> {
        self.insert(name, contents);
        Ok(())
    }
}
