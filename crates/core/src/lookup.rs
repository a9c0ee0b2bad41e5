//! Static name tables: exact hash to name, perceptual hash to name, and
//! flavor text.
//!
//! A table built from a file reads it in full on first use and never again,
//! unless it is explicitly [`reset`](HashTable::reset). A missing file fails
//! the lookup that tried to load it; the next lookup tries again.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

/// One record of the exact-hash file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEntry {
    pub name: String,
    pub hash: String,
}

/// Which hash a record is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    /// MD5 of the file bytes.
    Exact,
    /// DCT perceptual hash of the decoded pixels.
    Perceptual,
}

/// Lazily loaded `hash -> name` mapping.
pub struct HashTable {
    kind: HashKind,
    path: Option<PathBuf>,
    entries: OnceCell<HashMap<String, String>>,
}

impl HashTable {
    pub fn from_file(kind: HashKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: Some(path.into()),
            entries: OnceCell::new(),
        }
    }

    /// A table with fixed contents that never touches the filesystem.
    pub fn from_entries<I>(kind: HashKind, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            kind,
            path: None,
            entries: OnceCell::with_value(entries.into_iter().collect()),
        }
    }

    /// Name registered for `hash`, loading the backing file on first use.
    pub fn resolve(&self, hash: &str) -> Result<Option<String>> {
        let entries = self.entries.get_or_try_init(|| self.load())?;
        Ok(entries.get(hash).cloned())
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.get().is_some()
    }

    /// Forget loaded contents so the next lookup rereads the file.
    /// Tables built from fixed entries are left alone.
    pub fn reset(&mut self) {
        if self.path.is_some() {
            self.entries.take();
        }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(HashMap::new());
        };
        let entries: HashMap<String, String> = match self.kind {
            HashKind::Exact => read_exact_hashes(path)?
                .into_iter()
                .map(|e| (e.hash, e.name))
                .collect(),
            // Stored as name -> hash
            HashKind::Perceptual => read_perceptual_hashes(path)?
                .into_iter()
                .map(|(name, hash)| (hash, name))
                .collect(),
        };
        tracing::debug!(
            kind = ?self.kind,
            count = entries.len(),
            "Loaded hash table from {}",
            path.display()
        );
        Ok(entries)
    }
}

/// Lazily loaded `lowercased name -> flavor lines` mapping.
pub struct FlavorTable {
    path: Option<PathBuf>,
    entries: OnceCell<HashMap<String, Vec<String>>>,
}

impl FlavorTable {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: OnceCell::new(),
        }
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        Self {
            path: None,
            entries: OnceCell::with_value(entries.into_iter().collect()),
        }
    }

    /// A random line for `name`. `None` when the name has no lines.
    pub fn pick<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<Option<String>> {
        let entries = self.entries.get_or_try_init(|| self.load())?;
        Ok(entries
            .get(&name.to_lowercase())
            .and_then(|lines| lines.choose(rng))
            .cloned())
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.get().is_some()
    }

    pub fn reset(&mut self) {
        if self.path.is_some() {
            self.entries.take();
        }
    }

    fn load(&self) -> Result<HashMap<String, Vec<String>>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(HashMap::new());
        };
        let entries: HashMap<String, Vec<String>> =
            serde_json::from_reader(BufReader::new(open_lookup(path)?))?;
        tracing::debug!(count = entries.len(), "Loaded flavors from {}", path.display());
        Ok(entries)
    }
}

/// The three tables a [`Database`](crate::Database) resolves names against.
pub struct Lookups {
    hashes: HashTable,
    phashes: HashTable,
    flavors: FlavorTable,
}

impl Lookups {
    pub fn new(hashes: HashTable, phashes: HashTable, flavors: FlavorTable) -> Self {
        Self {
            hashes,
            phashes,
            flavors,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            HashTable::from_file(HashKind::Exact, &config.image_hashes),
            HashTable::from_file(HashKind::Perceptual, &config.phashes),
            FlavorTable::from_file(&config.flavors),
        )
    }

    pub fn table(&self, kind: HashKind) -> &HashTable {
        match kind {
            HashKind::Exact => &self.hashes,
            HashKind::Perceptual => &self.phashes,
        }
    }

    pub fn flavors(&self) -> &FlavorTable {
        &self.flavors
    }

    pub fn reset(&mut self) {
        self.hashes.reset();
        self.phashes.reset();
        self.flavors.reset();
    }
}

fn open_lookup(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::LookupFileMissing(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Read the exact-hash file in file order.
pub fn read_exact_hashes(path: &Path) -> Result<Vec<HashEntry>> {
    Ok(serde_json::from_reader(BufReader::new(open_lookup(path)?))?)
}

/// Overwrite the exact-hash file.
pub fn write_exact_hashes(path: &Path, entries: &[HashEntry]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, entries)?;
    writer.flush()?;
    Ok(())
}

/// Read the perceptual-hash file as `name -> hash`.
pub fn read_perceptual_hashes(path: &Path) -> Result<BTreeMap<String, String>> {
    Ok(serde_yaml_ng::from_reader(BufReader::new(open_lookup(path)?))?)
}

/// Overwrite the perceptual-hash file. Keys come out sorted.
pub fn write_perceptual_hashes(path: &Path, phashes: &BTreeMap<String, String>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml_ng::to_writer(&mut writer, phashes)?;
    writer.flush()?;
    Ok(())
}
