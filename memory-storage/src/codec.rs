//! Embedding blob encoding, similarity, and descriptor hashing.
//!
//! Vectors are packed as a little-endian sequence of 32-bit floats; this is
//! the only on-disk representation the store ever writes for an embedding
//! column, so every tier that stores one goes through here.

/// Pack a vector into its on-disk blob representation.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Unpack a blob into a vector. Returns an empty vector if the byte length
/// is not a multiple of 4 rather than erroring — callers treat a malformed
/// embedding as "no embedding" and skip the row.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 4 != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`. Returns `0.0` for mismatched lengths or
/// either operand being zero-norm, matching the documented boundary
/// behavior for degenerate queries.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Stable hex digest of a descriptor/handle string, used to detect drift
/// between the text a descriptor was derived from and what's stored.
pub fn descriptor_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Stable hex digest of raw content, used for vector-tier dedup.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any finite vector survives an encode/decode round trip exactly —
        /// the blob format is lossless for the class of values this store
        /// ever writes to it.
        #[test]
        fn encode_decode_roundtrips(v in prop::collection::vec(-1e6f32..1e6f32, 0..64)) {
            prop_assert_eq!(decode(&encode(&v)), v);
        }

        /// `decode` never panics on arbitrary bytes; malformed lengths fall
        /// back to empty rather than indexing out of bounds.
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..65)) {
            let out = decode(&bytes);
            if bytes.len() % 4 != 0 {
                prop_assert!(out.is_empty());
            } else {
                prop_assert_eq!(out.len(), bytes.len() / 4);
            }
        }

        /// Cosine similarity is symmetric and bounded to `[-1, 1]` for any
        /// pair of equal-length, non-zero-norm vectors.
        #[test]
        fn cosine_is_symmetric_and_bounded(
            a in prop::collection::vec(-100f32..100f32, 1..16),
            b in prop::collection::vec(-100f32..100f32, 1..16),
        ) {
            let len = a.len().min(b.len());
            let a = &a[..len];
            let b = &b[..len];
            let sim_ab = cosine(a, b);
            let sim_ba = cosine(b, a);
            prop_assert!((sim_ab - sim_ba).abs() < 1e-5);
            prop_assert!(sim_ab >= -1.0001 && sim_ab <= 1.0001);
        }
    }
}
