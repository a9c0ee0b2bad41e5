//! Runtime configuration.
//!
//! Read from a TOML file. Every field has a default, so a missing file or a
//! partial file is fine; a file that fails to parse is an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub db: PathBuf,
    /// Exact-hash lookup table (JSON list of `{name, hash}`).
    pub image_hashes: PathBuf,
    /// Perceptual-hash lookup table (YAML mapping of name to hash).
    pub phashes: PathBuf,
    /// Flavor text (JSON mapping of lowercased name to a list of lines).
    pub flavors: PathBuf,
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: PathBuf::from("pkmnhelper.db"),
            image_hashes: PathBuf::from("imagehashes.json"),
            phashes: PathBuf::from("phashes.yaml"),
            flavors: PathBuf::from("flavors.json"),
            archive: ArchiveConfig::default(),
        }
    }
}

/// Where the ingestion run fetches its reference images from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub url: String,
    /// Local working copy.
    pub dir: PathBuf,
    /// Subdirectory of the working copy holding one image per pokemon.
    pub images: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/MikeTheShadow/DisCatcher.git".to_string(),
            dir: PathBuf::from("DisCatcher"),
            images: PathBuf::from("pokedex"),
        }
    }
}

impl ArchiveConfig {
    pub fn images_dir(&self) -> PathBuf {
        self.dir.join(&self.images)
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config found at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_file_returns_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&tmp.path().join("pkmnhelper.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pkmnhelper.toml");
        std::fs::write(
            &path,
            r#"
db = "/var/lib/bot/pokedex.db"

[archive]
dir = "/srv/archive"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.db, PathBuf::from("/var/lib/bot/pokedex.db"));
        assert_eq!(config.image_hashes, PathBuf::from("imagehashes.json"));
        assert_eq!(config.archive.dir, PathBuf::from("/srv/archive"));
        assert_eq!(config.archive.images, PathBuf::from("pokedex"));
        assert_eq!(
            config.archive.images_dir(),
            PathBuf::from("/srv/archive/pokedex")
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pkmnhelper.toml");
        std::fs::write(&path, "db = [unterminated").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
