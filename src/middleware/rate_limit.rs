//! Per-client token bucket admission.
//!
//! Each client identity gets its own `governor` limiter with refill rate R
//! and burst B. All entries live in one mutex guarded map which is never held
//! across an await. A sweeper task drops entries that have been idle for more
//! than [`IDLE_EVICTION`], which bounds memory for clients that went away.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock, Reference},
    middleware::NoOpMiddleware,
    nanos::Nanos,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::LimiterConfig;
use crate::error::ApiError;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const IDLE_EVICTION: Duration = Duration::from_secs(3 * 60);

type Bucket<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct ClientEntry<C: Clock> {
    bucket: Bucket<C>,
    last_seen: C::Instant,
}

pub struct ClientThrottle<C: Clock = DefaultClock> {
    enabled: bool,
    quota: Quota,
    clock: C,
    clients: Mutex<HashMap<String, ClientEntry<C>>>,
}

impl ClientThrottle<DefaultClock> {
    pub fn new(config: &LimiterConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> ClientThrottle<C> {
    pub fn with_clock(config: &LimiterConfig, clock: C) -> Self {
        Self {
            enabled: config.enabled,
            quota: quota_for(config.rps, config.burst),
            clock,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Consumes one token for `client` if one is available.
    pub fn admit(&self, client: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let now = self.clock.now();
        let mut clients = self.lock();
        let entry = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: RateLimiter::direct_with_clock(self.quota, &self.clock),
                last_seen: now,
            });

        entry.last_seen = entry.last_seen.max(now);
        entry.bucket.check().is_ok()
    }

    /// Drops every client idle for longer than [`IDLE_EVICTION`]. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let idle = Nanos::from(IDLE_EVICTION);

        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, entry| now.duration_since(entry.last_seen) <= idle);
        before - clients.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map holds no invariants a panicking holder could break, so a
    // poisoned lock is recovered instead of propagated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry<C>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C> ClientThrottle<C>
where
    C: Clock + Send + Sync + 'static,
    C::Instant: Send + Sync,
{
    /// Runs [`ClientThrottle::sweep`] every [`SWEEP_INTERVAL`] for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let throttle = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = throttle.sweep();
                if evicted > 0 {
                    debug!(evicted, remaining = throttle.len(), "rate limiter sweep");
                }
            }
        })
    }
}

/// Refill one token every 1/rps seconds, holding at most `burst`.
fn quota_for(rps: f64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    // governor keeps period * burst as u64 nanoseconds, with headroom for clock sums.
    let longest = Duration::from_nanos(u64::MAX / 2 / u64::from(burst.get()));
    let period = if rps.is_finite() && rps > 0.0 {
        Duration::try_from_secs_f64(1.0 / rps)
            .unwrap_or(longest)
            .clamp(Duration::from_nanos(1), longest)
    } else {
        Duration::from_secs(1)
    };
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

/// Client identity: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded.or(real_ip) {
        Some(ip) => ip.to_string(),
        None => peer.map(|p| p.ip().to_string()).unwrap_or_default(),
    }
}

/// Middleware rejecting requests from clients whose bucket is empty.
pub async fn rate_limit(
    State(throttle): State<Arc<ClientThrottle>>,
    request: Request,
    next: Next,
) -> Response {
    if throttle.enabled() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_identity(request.headers(), peer);

        if !throttle.admit(&client) {
            return ApiError::RateLimitExceeded.into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn config(enabled: bool, rps: f64, burst: u32) -> LimiterConfig {
        LimiterConfig {
            enabled,
            rps,
            burst,
        }
    }

    fn throttle(rps: f64, burst: u32) -> (ClientThrottle<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        (ClientThrottle::with_clock(&config(true, rps, burst), clock.clone()), clock)
    }

    #[test]
    fn burst_of_four_then_deny() {
        let (throttle, _clock) = throttle(2.0, 4);
        let outcomes: Vec<bool> = (0..5).map(|_| throttle.admit("10.0.0.1")).collect();
        assert_eq!(outcomes, vec![true, true, true, true, false]);
    }

    #[test]
    fn refills_at_configured_rate() {
        let (throttle, clock) = throttle(2.0, 4);
        for _ in 0..4 {
            assert!(throttle.admit("10.0.0.1"));
        }
        assert!(!throttle.admit("10.0.0.1"));

        clock.advance(Duration::from_millis(500));
        assert!(throttle.admit("10.0.0.1"));
        assert!(!throttle.admit("10.0.0.1"));
    }

    #[test]
    fn requests_below_rate_are_always_admitted() {
        let (throttle, clock) = throttle(2.0, 1);
        for _ in 0..20 {
            assert!(throttle.admit("10.0.0.1"));
            clock.advance(Duration::from_millis(600));
        }
    }

    #[test]
    fn clients_have_independent_buckets() {
        let (throttle, _clock) = throttle(1.0, 1);
        assert!(throttle.admit("a"));
        assert!(!throttle.admit("a"));
        assert!(throttle.admit("b"));
        assert_eq!(throttle.len(), 2);
    }

    #[test]
    fn sweep_evicts_idle_and_keeps_active() {
        let (throttle, clock) = throttle(2.0, 4);
        throttle.admit("idle");
        throttle.admit("active");

        clock.advance(Duration::from_secs(150));
        throttle.admit("active");

        clock.advance(Duration::from_secs(40));
        assert_eq!(throttle.sweep(), 1);
        assert_eq!(throttle.len(), 1);

        // "active" is 40s idle, the first client is 190s idle and gone
        assert!(throttle.admit("active"));
        assert_eq!(throttle.len(), 1);
    }

    #[test]
    fn exactly_three_minutes_idle_is_kept() {
        let (throttle, clock) = throttle(2.0, 4);
        throttle.admit("c");
        clock.advance(IDLE_EVICTION);
        assert_eq!(throttle.sweep(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(throttle.sweep(), 1);
        assert!(throttle.is_empty());
    }

    #[test]
    fn disabled_admits_everything_without_state() {
        let throttle = ClientThrottle::with_clock(&config(false, 1.0, 1), FakeRelativeClock::default());
        for _ in 0..100 {
            assert!(throttle.admit("10.0.0.1"));
        }
        assert!(throttle.is_empty());
    }

    #[test]
    fn identity_prefers_forwarding_headers() {
        let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, Some(peer)), "192.0.2.10");

        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        assert_eq!(client_identity(&headers, Some(peer)), "198.51.100.7");

        headers.insert("x-forwarded-for", "203.0.113.1, 10.0.0.1".parse().unwrap());
        assert_eq!(client_identity(&headers, Some(peer)), "203.0.113.1");
    }

    #[test]
    fn degenerate_limits_still_build_a_quota() {
        let (throttle, _clock) = throttle(0.0, 0);
        assert!(throttle.admit("x"));
        assert!(!throttle.admit("x"));
    }

    #[test]
    fn vanishing_rate_never_refills() {
        let (throttle, clock) = throttle(1e-30, 2);
        assert!(throttle.admit("x"));
        assert!(throttle.admit("x"));
        assert!(!throttle.admit("x"));

        clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
        assert!(!throttle.admit("x"));
    }

    #[test]
    fn extreme_limits_build_without_panicking() {
        let (slow, _clock) = throttle(1e-30, u32::MAX);
        assert!(slow.admit("x"));

        let (throttle, clock) = throttle(1e300, 1);
        assert!(throttle.admit("x"));
        clock.advance(Duration::from_nanos(1));
        assert!(throttle.admit("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_skips_its_first_tick_then_keeps_sweeping() {
        let clock = FakeRelativeClock::default();
        let throttle = Arc::new(ClientThrottle::with_clock(&config(true, 2.0, 4), clock.clone()));

        throttle.admit("idle");
        clock.advance(Duration::from_secs(4 * 60));
        throttle.admit("active");

        let sweeper = throttle.spawn_sweeper();

        tokio::time::sleep(SWEEP_INTERVAL - Duration::from_secs(1)).await;
        assert_eq!(throttle.len(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(throttle.len(), 1);

        clock.advance(Duration::from_secs(4 * 60));
        tokio::time::sleep(SWEEP_INTERVAL).await;
        assert!(throttle.is_empty());

        sweeper.abort();
    }
}
