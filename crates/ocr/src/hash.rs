use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex encoding (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Content-addressed storage path: `<base>/<first_2_hex_chars>/<full_hex>.<ext>`.
pub fn attachment_path(attachments_dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    attachments_dir.join(&hash_hex[..2]).join(format!("{hash_hex}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_known_vector() {
        assert_eq!(
            to_hex(&sha256_bytes(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn deterministic_and_distinct() {
        assert_eq!(sha256_bytes(b"receipt"), sha256_bytes(b"receipt"));
        assert_ne!(sha256_bytes(b"receipt"), sha256_bytes(b"invoice"));
    }

    #[test]
    fn attachment_path_shards_by_prefix() {
        let hash = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        let path = attachment_path(Path::new("/data/att"), hash, "jpg");
        assert_eq!(path, PathBuf::from(format!("/data/att/ab/{hash}.jpg")));
    }
}
