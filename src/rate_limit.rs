use axum::http::HeaderMap;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

// How often the background sweep reclaims expired windows
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// Rate limit entry - tracks requests per client key within one window
struct RateLimitEntry {
    count: u32,
    reset_at: i64, // epoch millis when the window expires
}

// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
}

// Fixed-window per-client limiter. Cloning shares the same registry, so the
// state lives wherever the caller puts it instead of in a module global.
// Counters are per process; a multi-instance fleet does not coordinate.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    window_ms: i64,
    max_requests: u32,
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                window_ms: window.as_millis() as i64,
                max_requests,
                entries: DashMap::new(),
            }),
        }
    }

    pub fn check(&self, client_key: &str) -> RateLimitDecision {
        self.check_at(client_key, Utc::now().timestamp_millis())
    }

    // The DashMap entry guard holds the per-key lock for the whole
    // read-modify-write, so concurrent checks for one key cannot interleave.
    pub fn check_at(&self, client_key: &str, now: i64) -> RateLimitDecision {
        let max = self.inner.max_requests;

        let mut entry = self
            .inner
            .entries
            .entry(client_key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: now + self.inner.window_ms,
            });

        // Window expired..? Reset it
        if now > entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + self.inner.window_ms;
            return RateLimitDecision {
                admitted: true,
                limit: max,
                remaining: max - 1,
                reset_at: entry.reset_at,
            };
        }

        // Under limit..? Allow
        if entry.count < max {
            entry.count += 1;
            return RateLimitDecision {
                admitted: true,
                limit: max,
                remaining: max - entry.count,
                reset_at: entry.reset_at,
            };
        }

        // Over limit - no increment, reset_at stays put
        RateLimitDecision {
            admitted: false,
            limit: max,
            remaining: 0,
            reset_at: entry.reset_at,
        }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now().timestamp_millis())
    }

    // Drops entries whose window has passed. check() already treats those as
    // absent, so this only bounds memory for clients that stopped sending.
    pub fn sweep_at(&self, now: i64) -> usize {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| now <= entry.reset_at);
        before - self.inner.entries.len()
    }
}

// Derive the client identity the way proxies report it: first hop of
// x-forwarded-for, then x-real-ip. Everything unidentifiable shares the
// "unknown" bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}

// Background sweep loop, spawned once at startup
pub async fn sweep_loop(limiter: RateLimiter, period: Duration) {
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;
        let removed = limiter.sweep();
        if removed > 0 {
            debug!("rate limiter sweep removed {} expired entries", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn burst_of_twelve_admits_ten() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 10);

        let decisions: Vec<RateLimitDecision> =
            (0..12).map(|_| limiter.check_at("203.0.113.9", T0)).collect();

        let admitted: Vec<&RateLimitDecision> =
            decisions.iter().filter(|d| d.admitted).collect();
        assert_eq!(admitted.len(), 10);

        let remaining: Vec<u32> = admitted.iter().map(|d| d.remaining).collect();
        assert_eq!(remaining, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);

        for rejected in &decisions[10..] {
            assert!(!rejected.admitted);
            assert_eq!(rejected.limit, 10);
            assert_eq!(rejected.remaining, 0);
            assert_eq!(rejected.reset_at, T0 + 60_000);
        }
    }

    #[test]
    fn window_fully_resets_after_expiry() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        limiter.check_at("client", T0);
        limiter.check_at("client", T0);
        let rejected = limiter.check_at("client", T0 + 1_000);
        assert!(!rejected.admitted);

        // past reset_at the prior rejection carries no debt
        let readmitted = limiter.check_at("client", T0 + 60_001);
        assert!(readmitted.admitted);
        assert_eq!(readmitted.remaining, 1);
        assert_eq!(readmitted.reset_at, T0 + 60_001 + 60_000);
    }

    #[test]
    fn keys_are_counted_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.check_at("1.1.1.1", T0).admitted);
        assert!(!limiter.check_at("1.1.1.1", T0).admitted);
        assert!(limiter.check_at("2.2.2.2", T0).admitted);
    }

    #[test]
    fn concurrent_checks_never_exceed_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 10);
        let admitted = AtomicU32::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        if limiter.check("10.1.1.1").admitted {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 10);

        limiter.check_at("old", T0);
        limiter.check_at("fresh", T0 + 50_000);

        // "old" expired at T0 + 60_000, "fresh" runs until T0 + 110_000
        let removed = limiter.sweep_at(T0 + 61_000);
        assert_eq!(removed, 1);

        // the surviving entry kept its count
        let decision = limiter.check_at("fresh", T0 + 60_000);
        assert_eq!(decision.remaining, 8);

        // the swept key starts over
        let decision = limiter.check_at("old", T0 + 61_000);
        assert_eq!(decision.remaining, 9);
    }

    #[test]
    fn client_key_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn client_key_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(client_key(&headers), "10.0.0.2");
    }

    #[test]
    fn unidentified_clients_share_one_bucket() {
        let headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");

        let mut empty_forwarded = HeaderMap::new();
        empty_forwarded.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_key(&empty_forwarded), "unknown");
    }
}
