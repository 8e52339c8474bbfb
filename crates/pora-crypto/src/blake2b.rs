//! BLAKE2b-512 hashing, used for the scratch-pad seed and the quality score.

use blake2::{Blake2b512, Digest};

/// Compute BLAKE2b-512 of the input data.
pub fn blake2b512(data: &[u8]) -> [u8; 64] {
    blake2b512_concat(&[data])
}

/// Compute BLAKE2b-512 over the concatenation of `parts`.
pub fn blake2b512_concat(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_blake2b_rfc7693_vector() {
        let expected = hex!(
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1"
            "7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        );
        assert_eq!(blake2b512(b"abc"), expected);
    }

    #[test]
    fn test_blake2b_empty() {
        let expected = hex!(
            "786a02f742015903c6c6fd852552d272912f4740e15847618a86e217f71f5419"
            "d25e1031afee585313896444934eb04b903a685b1448b755d56f701afe9be2ce"
        );
        assert_eq!(blake2b512(b""), expected);
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        let parts: [&[u8]; 3] = [b"miner", b"nonce", &[0u8; 64]];
        let joined: Vec<u8> = parts.concat();
        assert_eq!(blake2b512_concat(&parts), blake2b512(&joined));
    }
}
