//! Common fixtures: temporary static roots, file helpers and async polling.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

/// HRRR grid constants.
pub mod hrrr {
    pub const NX: u32 = 1799;
    pub const NY: u32 = 1059;
    pub const FIRST_LAT: f64 = 21.138123;
    pub const FIRST_LON: f64 = -122.719528;
    pub const LOV: f64 = -97.5;
    pub const LATIN: f64 = 38.5;
    pub const DX: f64 = 3000.0;
}

/// Well-known places inside the CONUS overlay extent, as (lat, lon).
pub mod places {
    pub const KANSAS_CITY: (f64, f64) = (39.0, -94.5);
    pub const DENVER: (f64, f64) = (39.74, -104.99);
    pub const MIAMI: (f64, f64) = (25.76, -80.19);
    pub const SEATTLE: (f64, f64) = (47.61, -122.33);
}

/// A temporary directory laid out like the server's static root.
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Create `rel` (and its parents) with the given contents.
    pub fn write(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Create empty files named `names` inside `rel_dir`.
    pub fn touch_all(&self, rel_dir: impl AsRef<Path>, names: &[&str]) {
        for name in names {
            self.write(rel_dir.as_ref().join(name), b"");
        }
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted file names directly inside `dir`. A missing directory yields an empty list.
pub fn list_file_names(dir: impl AsRef<Path>) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses. Returns whether it held.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_write_and_list() {
        let root = TestRoot::new();
        root.touch_all("pngs", &["b.png", "a.png"]);
        assert_eq!(list_file_names(root.join("pngs")), vec!["a.png", "b.png"]);
        assert!(list_file_names(root.join("missing")).is_empty());
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(30), || false).await);
        assert!(wait_until(Duration::from_millis(30), || true).await);
    }
}
