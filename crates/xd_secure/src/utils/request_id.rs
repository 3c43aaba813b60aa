use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const HEADER: &str = "x-request-id";

/// Longest client-supplied id that is echoed back instead of replaced.
pub const MAX_LEN: usize = 128;

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique id: hex microsecond timestamp and a hex sequence number.
pub fn generate() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{micros:x}-{seq:x}")
}

/// Whether a client-supplied id is safe to reuse in logs and headers.
pub fn is_acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
