//! Request ID and synthetic identifier generation

use base64::Engine;
use uuid::Uuid;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lambda-style request ID
#[derive(Debug, Clone)]
pub struct RequestId {
    /// Primary request ID (hyphenated UUID)
    pub id: String,
    /// Extended request ID, base64 encoded
    pub extended_id: String,
}

impl RequestId {
    /// Generate a new request ID pair
    pub fn new() -> Self {
        let id = Uuid::new_v4().hyphenated().to_string();
        let extended_id = base64::engine::general_purpose::STANDARD.encode(&Uuid::new_v4().as_bytes()[..12]);
        Self { id, extended_id }
    }

    /// X-Ray style trace header value: `Root=1-<epoch hex>-<24 hex>`
    pub fn trace_id(epoch_secs: i64) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!("Root=1-{:08x}-{}", epoch_secs, &random[..24])
    }

    /// Random lowercase alphanumeric identifier of `len` characters
    pub fn short_id(len: usize) -> String {
        let mut out = String::with_capacity(len);
        while out.len() < len {
            for byte in Uuid::new_v4().as_bytes() {
                if out.len() == len {
                    break;
                }
                out.push(ALPHANUMERIC[*byte as usize % ALPHANUMERIC.len()] as char);
            }
        }
        out
    }

    /// 32 hex characters, as used in log stream names
    pub fn hex32() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
