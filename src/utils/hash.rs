use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::debug;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::constants::{HASH_CHUNK_SIZE, MAX_HASH_FILE_SIZE_MB};

/// Calculate SHA-256 hash of a file
///
/// Returns None if:
/// - The file is larger than max_size_mb
/// - The path is not a regular file
pub fn calculate_sha256(path: &Path, max_size_mb: u64) -> io::Result<Option<String>> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() > max_size_mb * 1024 * 1024 {
        return Ok(None);
    }

    if !metadata.is_file() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Some(format!("{:x}", hasher.finalize())))
}

/// SHA-256 of every regular file under `root`, keyed by `/`-separated
/// relative path. Files in `skip` (relative names) are left out.
pub fn manifest(root: &Path, skip: &[&str]) -> io::Result<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => continue,
        };
        if skip.contains(&relative.as_str()) {
            continue;
        }

        match calculate_sha256(entry.path(), MAX_HASH_FILE_SIZE_MB)? {
            Some(hash) => {
                digests.insert(relative, hash);
            }
            None => debug!("Not hashing {}", entry.path().display()),
        }
    }

    Ok(digests)
}
