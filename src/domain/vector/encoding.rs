//! Binary vector encoding for store persistence
//!
//! Each element is a little-endian IEEE-754 f32, packed with no padding.

use crate::domain::DomainError;

const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode a vector into little-endian packed bytes
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * F32_WIDTH);

    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    bytes
}

/// Decode little-endian packed bytes into a vector
///
/// A trailing partial chunk (fewer than 4 bytes) is ignored.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(F32_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Decode bytes, rejecting input whose length is not a multiple of 4
pub fn try_decode(bytes: &[u8]) -> Result<Vec<f32>, DomainError> {
    if bytes.len() % F32_WIDTH != 0 {
        return Err(DomainError::validation(format!(
            "Encoded vector length {} is not a multiple of {}",
            bytes.len(),
            F32_WIDTH
        )));
    }

    Ok(decode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&[1.0, -2.5]);

        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
    }

    #[test]
    fn test_round_trip() {
        let vector = vec![
            0.0,
            -0.0,
            1.5,
            -3.25e-7,
            f32::MAX,
            f32::MIN_POSITIVE,
            f32::INFINITY,
        ];

        let decoded = decode(&encode(&vector));

        assert_eq!(decoded.len(), vector.len());
        for (a, b) in vector.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_round_trip_preserves_nan_bits() {
        let nan = f32::from_bits(0x7fc0_0001);
        let decoded = decode(&encode(&[nan]));

        assert_eq!(decoded[0].to_bits(), nan.to_bits());
    }

    #[test]
    fn test_encode_empty() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_decode_ignores_partial_chunk() {
        let mut bytes = encode(&[4.0]);
        bytes.push(0xff);

        assert_eq!(decode(&bytes), vec![4.0]);
    }

    #[test]
    fn test_try_decode_rejects_misaligned() {
        let result = try_decode(&[0u8, 1, 2]);
        assert!(result.is_err());

        let ok = try_decode(&encode(&[0.25, 0.5])).unwrap();
        assert_eq!(ok, vec![0.25, 0.5]);
    }
}
