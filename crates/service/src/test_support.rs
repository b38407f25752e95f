#![cfg(test)]
use std::path::{Path, PathBuf};

/// Scratch directory under the system temp dir, removed on drop.
pub struct TempDir {
    root: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let root = std::env::temp_dir().join(format!("snapkv_{prefix}_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("create temp dir");
        Self { root }
    }

    pub fn join<P: AsRef<Path>>(&self, rel: P) -> PathBuf {
        self.root.join(rel)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
