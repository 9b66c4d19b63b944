//! Opaque identifier generation
//!
//! Entity ids are URL-safe, unpadded base64 over 16 random bytes. They
//! carry no structure; the path remains the hierarchical identity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Generate a new opaque, URL-safe id.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
