/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 digest rendered as `blake3:<hex>`, used for audit summaries.
pub fn digest_hex(data: &[u8]) -> String {
    format!("blake3:{}", hex::encode(hash(data)))
}
