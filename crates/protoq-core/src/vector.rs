//! Embedding vector codec and similarity math.
//!
//! Vectors are persisted as fixed-width sequences of little-endian IEEE-754
//! f32 values (4 bytes per component). Decoding reproduces the stored vector
//! bit-for-bit.

/// Encode a vector into its binary storage layout.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a vector from its binary storage layout.
///
/// Returns `None` if the byte length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when the vectors have different lengths or when either has
/// zero magnitude, so a corrupted row never aborts a multi-candidate scan.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip_exact() {
        let vector = vec![0.1f32, -2.5, 3.75, f32::MIN_POSITIVE, 1e30, -0.0];
        let bytes = encode_embedding(&vector);
        assert_eq!(bytes.len(), vector.len() * 4);

        let decoded = decode_embedding(&bytes).unwrap();
        assert_eq!(decoded.len(), vector.len());
        for (orig, out) in vector.iter().zip(decoded.iter()) {
            assert_eq!(orig.to_bits(), out.to_bits(), "round trip must be lossless");
        }
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        let bytes = encode_embedding(&[1.0, 2.0]);
        assert!(decode_embedding(&bytes[..7]).is_none());
    }

    #[test]
    fn test_decode_empty_blob() {
        assert_eq!(decode_embedding(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_cosine_similarity_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let a = vec![0.3, -0.7, 2.1];
        let b = vec![1.5, 0.2, -0.4];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &a), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch_is_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_bounded() {
        let a = vec![3.2, -1.1, 0.5, 9.9];
        let b = vec![-0.4, 7.7, 2.3, -5.5];
        let sim = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&sim));
    }
}
