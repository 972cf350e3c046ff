//! Process-wide request-id allocator.
//!
//! A single monotonic counter shared by every component that needs a local
//! correlation id (log lines, audit events, toast-style notices). Allocation
//! goes through one function; nothing else touches the counter.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REQUEST_ID: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(1));

/// Allocate the next request id. Ids start at 1 and never repeat within a
/// process.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let a = next_request_id();
        let b = next_request_id();
        let c = next_request_id();
        assert!(a < b && b < c);
    }
}
