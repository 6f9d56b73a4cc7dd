use sha3::{Digest, Sha3_256};
use std::{fs::File, io::Read, path::Path};

use crate::error::Result;

/// Computes SHA3-256 hash of a file as lowercase hex
///
/// Used to tell whether a cached embedding still describes the file on disk.
pub fn compute_file_hash<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha3_256::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}
