use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::UploadError;

/// SHA-256 of the full file content, lower-case hex.
///
/// Hashing runs on the blocking pool so large videos do not stall the runtime.
pub async fn calculate_file_hash(path: &Path) -> Result<String, UploadError> {
    let path: PathBuf = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(io::Error::other)??;
    Ok(digest)
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_digests() {
        let dir = tempfile::tempdir().unwrap();
        let abc = dir.path().join("abc.jpg");
        let empty = dir.path().join("empty.jpg");
        std::fs::write(&abc, b"abc").unwrap();
        std::fs::write(&empty, b"").unwrap();

        assert_eq!(
            calculate_file_hash(&abc).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            calculate_file_hash(&empty).await.unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_same_content_same_digest() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("nested-copy.jpg");
        std::fs::write(&a, vec![7u8; 300_000]).unwrap();
        std::fs::write(&b, vec![7u8; 300_000]).unwrap();

        let digest = calculate_file_hash(&a).await.unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, calculate_file_hash(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = calculate_file_hash(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
