//! Dataset scanner - discovers candidate FLAIR volumes

use crate::core::{InputVolume, PrepError};
use regex::Regex;
use std::fs::{DirEntry, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sub-directory of the dataset holding the input images
pub const IMAGES_DIR: &str = "images";

/// Default name filter: contains `flair`, any case
const DEFAULT_KEYWORD: &str = "flair";

/// Finds input volumes in `<dataset>/images`
#[derive(Debug, Clone)]
pub struct DatasetScanner {
    images_dir: PathBuf,
    pattern: Option<Regex>,
}

impl DatasetScanner {
    pub fn new(dataset_dir: impl AsRef<Path>) -> Self {
        Self {
            images_dir: dataset_dir.as_ref().join(IMAGES_DIR),
            pattern: None,
        }
    }

    /// Replace the file name filter
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Enumerate candidate volumes
    ///
    /// The listing is lazy, non-recursive and in filesystem order. A file
    /// qualifies when its name matches the pattern and ends in `.nii` or
    /// `.nii.gz`. Entries that cannot be read are skipped with a warning.
    ///
    /// # Errors
    /// `PrepError::InputDiscovery` if the images directory is missing or
    /// cannot be listed.
    pub fn scan(&self) -> Result<Scan, PrepError> {
        if !self.images_dir.is_dir() {
            return Err(PrepError::InputDiscovery {
                path: self.images_dir.clone(),
                reason: "directory does not exist".to_string(),
            });
        }

        let entries = std::fs::read_dir(&self.images_dir).map_err(|e| {
            PrepError::InputDiscovery {
                path: self.images_dir.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!("Scanning {}", self.images_dir.display());
        Ok(Scan {
            entries,
            pattern: self.pattern.clone(),
        })
    }
}

/// Lazy iterator over the qualifying volumes of one scan
#[derive(Debug)]
pub struct Scan {
    entries: ReadDir,
    pattern: Option<Regex>,
}

impl Scan {
    fn name_matches(&self, name: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(name),
            None => name.to_lowercase().contains(DEFAULT_KEYWORD),
        }
    }

    fn accept(&self, entry: io::Result<DirEntry>) -> Option<InputVolume> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                return None;
            }
        };

        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!("Skipping non-UTF-8 file name {}", path.display());
            return None;
        };

        if !self.name_matches(&name) {
            return None;
        }

        // Follows symlinks, so a linked image still counts as a file
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return None,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return None;
            }
        }

        InputVolume::from_path(path)
    }
}

impl Iterator for Scan {
    type Item = InputVolume;

    fn next(&mut self) -> Option<InputVolume> {
        loop {
            let entry = self.entries.next()?;
            if let Some(volume) = self.accept(entry) {
                return Some(volume);
            }
        }
    }
}
