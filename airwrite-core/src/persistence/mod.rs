//! persistence — finished strokes → uniquely named dataset files
//!
//! Each stroke longer than the minimum is written to
//! `<dir>/{index}_{length}.npy`.  The next index continues after the highest
//! one already in the directory; if that name is somehow taken the index is
//! bumped until a free name is found.  The store assumes it is the only
//! writer to its directory.

mod naming;
mod npy;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::trajectory::Stroke;

pub use naming::{natural_cmp, EntryName, ENTRY_EXTENSION};

/// Strokes with this many points or fewer are discarded.
pub const DEFAULT_MIN_STROKE_LEN: usize = 10;
pub const DEFAULT_DATASET_DIR: &str = "generated_data";

/// One file found in the dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub name: EntryName,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StrokeStore {
    dir: PathBuf,
    min_stroke_len: usize,
}

impl StrokeStore {
    pub fn new<P: AsRef<Path>>(dir: P, min_stroke_len: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            min_stroke_len,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `stroke` and return its path, or `Ok(None)` if it is too short
    /// to keep.  Filesystem failures are returned, never retried.
    pub fn persist(&self, stroke: &Stroke) -> Result<Option<PathBuf>> {
        if stroke.len() <= self.min_stroke_len {
            debug!(
                points = stroke.len(),
                min = self.min_stroke_len,
                "stroke too short; discarded"
            );
            return Ok(None);
        }

        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create dataset directory {}", self.dir.display())
        })?;

        let mut index = self.next_index()?;
        let path = loop {
            let candidate = self.dir.join(EntryName::new(index, stroke.len()).to_string());
            if !candidate.exists() {
                break candidate;
            }
            index += 1;
        };

        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        npy::write_points(&mut out, stroke.points())
            .with_context(|| format!("failed to write stroke to {}", path.display()))?;
        out.flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;

        info!(path = %path.display(), points = stroke.len(), "stroke saved");
        Ok(Some(path))
    }

    /// Dataset entries in natural filename order.  A missing directory is an
    /// empty dataset.
    pub fn entries(&self) -> Result<Vec<DatasetEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let listing = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;

        let mut named = Vec::new();
        for dirent in listing {
            let dirent =
                dirent.with_context(|| format!("failed to list {}", self.dir.display()))?;
            let file_name = dirent.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = EntryName::parse(file_name) {
                named.push((file_name.to_owned(), name));
            }
        }
        named.sort_by(|(a, _), (b, _)| natural_cmp(a, b));

        Ok(named
            .into_iter()
            .map(|(file_name, name)| DatasetEntry {
                name,
                path: self.dir.join(file_name),
            })
            .collect())
    }

    /// One past the index of the last entry in natural order, or 0.
    fn next_index(&self) -> Result<u64> {
        Ok(self
            .entries()?
            .last()
            .map_or(0, |entry| entry.name.index + 1))
    }
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self::new(DEFAULT_DATASET_DIR, DEFAULT_MIN_STROKE_LEN)
    }
}

/// Load a stroke previously written by [`StrokeStore::persist`].
pub fn read_stroke<P: AsRef<Path>>(path: P) -> Result<Stroke> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let points = npy::read_points(&mut BufReader::new(file))
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(Stroke::new(points))
}
