//! Offline rebuild of the exact-hash and perceptual-hash lookup files from a
//! git archive of reference images.
//!
//! Any failure aborts the run: a failed clone or pull, a missing image
//! directory, an unreadable or undecodable image. Nothing is written until
//! every image has been hashed.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::config::{ArchiveConfig, Config};
use crate::error::{Error, Result};
use crate::hasher;
use crate::lookup::{self, HashEntry};

/// Progress events emitted while ingesting.
pub enum IngestProgress {
    /// Cloning or pulling the archive.
    Syncing { dir: PathBuf },
    /// About to hash `count` images.
    HashStart { count: usize },
    /// One image has been hashed.
    Hashed { name: String },
    /// Both files have been written.
    Complete { exact: usize, perceptual: usize },
}

/// Sizes of the two tables as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub exact: usize,
    pub perceptual: usize,
}

/// Sync the archive, then rebuild both lookup files.
pub fn run(
    config: &Config,
    mut progress_cb: Option<&mut dyn FnMut(IngestProgress)>,
) -> Result<IngestSummary> {
    if let Some(ref mut cb) = progress_cb {
        cb(IngestProgress::Syncing {
            dir: config.archive.dir.clone(),
        });
    }
    sync_archive(&config.archive)?;
    rebuild_tables(config, progress_cb)
}

/// Clone the archive if there is no working copy yet, then pull.
pub fn sync_archive(archive: &ArchiveConfig) -> Result<()> {
    if !archive.dir.exists() {
        tracing::info!("Cloning {} into {}", archive.url, archive.dir.display());
        run_git(
            &[
                OsStr::new("clone"),
                OsStr::new(&archive.url),
                archive.dir.as_os_str(),
            ],
            None,
        )?;
    }
    tracing::info!("Pulling {}", archive.dir.display());
    run_git(&[OsStr::new("pull")], Some(&archive.dir))
}

fn run_git(args: &[&OsStr], cwd: Option<&Path>) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let status = cmd.status()?;
    if !status.success() {
        let command = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(Error::Git { command, status });
    }
    Ok(())
}

/// Rehash every archive image and rewrite both lookup files.
///
/// The exact-hash file is merged: existing entries are kept unless an image
/// with the same hash renames them. The perceptual-hash file is rebuilt from
/// this run's images alone.
pub fn rebuild_tables(
    config: &Config,
    mut progress_cb: Option<&mut dyn FnMut(IngestProgress)>,
) -> Result<IngestSummary> {
    let images_dir = config.archive.images_dir();
    if !images_dir.is_dir() {
        return Err(Error::ArchiveNotFound(images_dir));
    }

    let mut hashes = MergedHashes::new(lookup::read_exact_hashes(&config.image_hashes)?);
    let mut phashes: BTreeMap<String, String> = BTreeMap::new();

    let images = list_images(&images_dir)?;
    tracing::info!(count = images.len(), "Hashing images in {}", images_dir.display());
    if let Some(ref mut cb) = progress_cb {
        cb(IngestProgress::HashStart {
            count: images.len(),
        });
    }

    for path in &images {
        let md5 = hasher::compute_md5(path)?;
        let name = display_name(path)?;
        let phash = hasher::perceptual::compute_phash(path)?;

        hashes.insert(md5, name.clone());
        phashes.insert(name.clone(), phash);

        if let Some(ref mut cb) = progress_cb {
            cb(IngestProgress::Hashed { name });
        }
    }

    lookup::write_exact_hashes(&config.image_hashes, &hashes.entries)?;
    lookup::write_perceptual_hashes(&config.phashes, &phashes)?;

    let summary = IngestSummary {
        exact: hashes.entries.len(),
        perceptual: phashes.len(),
    };
    tracing::info!(
        exact = summary.exact,
        perceptual = summary.perceptual,
        "Wrote {} and {}",
        config.image_hashes.display(),
        config.phashes.display()
    );
    if let Some(ref mut cb) = progress_cb {
        cb(IngestProgress::Complete {
            exact: summary.exact,
            perceptual: summary.perceptual,
        });
    }
    Ok(summary)
}

/// Regular files directly inside `dir`, in filename order. Symlinks are
/// followed, so a link to an image is hashed under the link's name.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

/// Pokemon name for an archive image: the file name up to its first `.`,
/// with the first letter capitalized.
pub fn display_name(path: &Path) -> Result<String> {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidImageName(path.to_path_buf()))?;

    let mut chars = stem.chars();
    let name: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    if name == "TypeNull" {
        return Ok("Type: Null".to_string());
    }
    Ok(name)
}

/// Exact-hash entries keyed by hash, kept in first-seen order.
struct MergedHashes {
    entries: Vec<HashEntry>,
    index: HashMap<String, usize>,
}

impl MergedHashes {
    fn new(existing: Vec<HashEntry>) -> Self {
        let mut merged = Self {
            entries: Vec::with_capacity(existing.len()),
            index: HashMap::with_capacity(existing.len()),
        };
        for entry in existing {
            merged.insert(entry.hash, entry.name);
        }
        merged
    }

    /// Last write wins on the name; the position stays where the hash was
    /// first seen.
    fn insert(&mut self, hash: String, name: String) {
        match self.index.get(&hash) {
            Some(&i) => self.entries[i].name = name,
            None => {
                self.index.insert(hash.clone(), self.entries.len());
                self.entries.push(HashEntry { name, hash });
            }
        }
    }
}
