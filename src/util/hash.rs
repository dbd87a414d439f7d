//! Hash utilities
//!
//! SHA1 fingerprints of mod files.

use sha1::{Digest, Sha1};
use std::path::Path;

/// Calculate SHA1 hash of a file
pub fn sha1_file(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    let hash = Sha1::digest(&bytes);
    Ok(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha1_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha1_file(&path).unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert!(sha1_file(&tmp.path().join("missing")).is_err());
    }
}
