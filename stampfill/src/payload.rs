//! Random upload payloads.

use bytes::Bytes;
use rand::TryRngCore;
use rand::rngs::OsRng;

/// The OS random source failed to produce a payload.
#[derive(Debug, thiserror::Error)]
#[error("failed to generate {size} random bytes")]
pub struct PayloadError {
    size: usize,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Generates `size` bytes of random data.
///
/// Every payload is freshly random, so the node can never deduplicate chunks across uploads and
/// each upload consumes batch capacity.
pub fn generate(size: usize) -> Result<Bytes, PayloadError> {
    let mut buf = vec![0; size];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|source| PayloadError {
            size,
            source: source.into(),
        })?;
    Ok(buf.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_exact_size() {
        assert_eq!(generate(0).unwrap().len(), 0);
        assert_eq!(generate(4096).unwrap().len(), 4096);
    }

    #[test]
    fn payloads_differ() {
        let first = generate(64).unwrap();
        let second = generate(64).unwrap();
        assert_ne!(first, second);
    }
}
