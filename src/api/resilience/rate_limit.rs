//! Rate-limit bookkeeping
//!
//! Keeps the rate-limit state advertised by the most recent response so it
//! can be inspected without a dedicated network call.

use arc_swap::ArcSwapOption;
use chrono::DateTime;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;

use super::super::constants::headers;
use super::super::models::RateLimitSnapshot;

/// Single-slot holder for the latest [`RateLimitSnapshot`].
///
/// The slot is swapped as a whole, so readers never observe a mix of two
/// responses.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    latest: ArcSwapOption<RateLimitSnapshot>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rate-limit headers of a response.
    ///
    /// Only replaces the snapshot when limit, remaining and reset are all
    /// present and numeric. Returns whether the snapshot changed.
    pub fn record_headers(&self, response_headers: &HashMap<String, String>) -> bool {
        match parse_snapshot(response_headers) {
            Some(snapshot) => {
                debug!(
                    "Rate limit: {}/{} remaining, resets at {}",
                    snapshot.remaining, snapshot.limit, snapshot.reset_at
                );
                self.latest.store(Some(Arc::new(snapshot)));
                true
            }
            None => {
                trace!("Response carried no complete rate-limit headers");
                false
            }
        }
    }

    /// Latest snapshot, or `None` if no response has carried the headers yet
    pub fn snapshot(&self) -> Option<RateLimitSnapshot> {
        self.latest.load_full().map(|snapshot| (*snapshot).clone())
    }
}

fn parse_snapshot(response_headers: &HashMap<String, String>) -> Option<RateLimitSnapshot> {
    let lookup = |name: &str| {
        response_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    };

    let limit = lookup(headers::RATE_LIMIT_LIMIT)?.parse::<u64>().ok()?;
    let remaining = lookup(headers::RATE_LIMIT_REMAINING)?.parse::<u64>().ok()?;
    let reset = lookup(headers::RATE_LIMIT_RESET)?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset, 0)?;

    Some(RateLimitSnapshot {
        limit,
        remaining,
        reset_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_until_first_complete_response() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.snapshot().is_none());

        assert!(!tracker.record_headers(&headers(&[("content-type", "application/json")])));
        assert!(tracker.snapshot().is_none());
    }

    #[test]
    fn test_records_complete_headers() {
        let tracker = RateLimitTracker::new();
        let updated = tracker.record_headers(&headers(&[
            ("X-RateLimit-Limit", "100"),
            ("X-RateLimit-Remaining", "42"),
            ("X-RateLimit-Reset", "1760000000"),
        ]));

        assert!(updated);
        let snapshot = tracker.snapshot().unwrap();
        assert_eq!(snapshot.limit, 100);
        assert_eq!(snapshot.remaining, 42);
        assert_eq!(snapshot.reset_at.timestamp(), 1_760_000_000);
    }

    #[test]
    fn test_partial_headers_leave_snapshot_untouched() {
        let tracker = RateLimitTracker::new();
        tracker.record_headers(&headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "99"),
            ("x-ratelimit-reset", "1760000000"),
        ]));
        let before = tracker.snapshot();

        assert!(!tracker.record_headers(&headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "10"),
        ])));
        assert_eq!(tracker.snapshot(), before);

        assert!(!tracker.record_headers(&headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "ten"),
            ("x-ratelimit-reset", "1760000000"),
        ])));
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn test_newer_response_overwrites() {
        let tracker = RateLimitTracker::new();
        tracker.record_headers(&headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "99"),
            ("x-ratelimit-reset", "1760000000"),
        ]));
        tracker.record_headers(&headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "98"),
            ("x-ratelimit-reset", "1760000060"),
        ]));

        let snapshot = tracker.snapshot().unwrap();
        assert_eq!(snapshot.remaining, 98);
        assert_eq!(snapshot.reset_at.timestamp(), 1_760_000_060);
    }
}
