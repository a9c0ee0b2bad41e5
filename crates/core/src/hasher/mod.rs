pub mod perceptual;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::Result;

/// MD5 of a file's bytes as 32 lowercase hex digits, the key format of the
/// exact-hash table. The file is streamed, never read whole.
pub fn compute_md5(path: &Path) -> Result<String> {
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let mut hasher = Md5::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
