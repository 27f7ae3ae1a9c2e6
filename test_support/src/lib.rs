//! Test utilities for build script scenarios.
//!
//! [`Project`] owns a temporary directory standing in for a source tree:
//! tests write a build script and input files into it, age files to control
//! staleness, and inspect what a build left behind.

use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// Name of the build script written by [`Project::script`].
pub const SCRIPT: &str = "make.maat";

/// A temporary source tree.
#[derive(Debug)]
pub struct Project {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    /// Create an empty tree.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        Self { _dir: dir, root }
    }

    /// Directory holding the tree.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `name`.
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write `contents` to `name`, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> &Self {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        self
    }

    /// Write the build script.
    pub fn script(&self, text: &str) -> &Self {
        self.write(SCRIPT, text)
    }

    /// Set the modification time of `name` to `secs` seconds ago.
    pub fn age(&self, name: &str, secs: u64) -> &Self {
        let time = SystemTime::now() - Duration::from_secs(secs);
        File::options()
            .write(true)
            .open(self.path(name))
            .and_then(|file| file.set_modified(time))
            .expect("set mtime");
        self
    }

    /// Modification time of `name`.
    pub fn modified(&self, name: &str) -> SystemTime {
        fs::metadata(self.path(name))
            .and_then(|meta| meta.modified())
            .expect("mtime")
    }

    /// Contents of `name`.
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).expect("read file")
    }

    /// Whether `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}
