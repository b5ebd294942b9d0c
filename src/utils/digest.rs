// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, base64-encoded.
///
/// ```rust
/// use signal_sandbox::utils::sha256_base64;
///
/// let digest = sha256_base64(b"");
/// assert_eq!(digest, "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
/// ```
pub fn sha256_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}

/// Digest over several parts. Each part is length-prefixed.
pub fn sha256_base64_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_boundaries_affect_digest() {
        let a = sha256_base64_parts([b"ab".as_slice(), b"c".as_slice()]);
        let b = sha256_base64_parts([b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(sha256_base64(b"signal"), sha256_base64(b"signal"));
        assert_eq!(sha256_base64(b"").len(), 44);
    }
}
