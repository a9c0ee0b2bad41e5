use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("lookup file does not exist: {}", .0.display())]
    LookupFileMissing(PathBuf),

    #[error("image resize failed: {0}")]
    Resize(String),

    #[error("`git {command}` failed with {status}")]
    Git { command: String, status: std::process::ExitStatus },

    #[error("archive image directory does not exist: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    #[error("cannot derive a pokemon name from {}", .0.display())]
    InvalidImageName(PathBuf),

    #[error("store connection is closed")]
    StoreClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
