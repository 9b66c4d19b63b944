//! CRC32 checksums over WAL frame payloads

/// Compute the CRC32 checksum of a payload.
pub fn compute_checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}
