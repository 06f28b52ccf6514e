//! Per-IP rate limiting middleware using a token bucket.
//!
//! The limiter is an admission filter ahead of every handler. It tracks one
//! bucket per client IP and evicts stale entries in a background sweep so
//! memory stays bounded under IP-spraying abuse.
//!
//! # Security Note
//!
//! X-Forwarded-For and X-Real-IP headers are NOT trusted by default. They
//! are only consulted when the direct connection comes from an IP listed in
//! `rate_limit.trusted_proxies` (or `["*"]`, which trusts everything and is
//! not recommended outside development).

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{DashMap, mapref::entry::Entry};
use ferry_core::config::RateLimitConfig;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
};
use ipnet::IpNet;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Type alias for the keyed per-IP limiter.
type KeyedLimiter =
    RateLimiter<String, DashMap<String, InMemoryState>, DefaultClock, NoOpMiddleware>;

/// Evictions must reach this fraction of tracked entries before the governor
/// limiter is rebuilt (rebuilding resets in-flight rate-limit state).
const REBUILD_EVICTION_THRESHOLD_FRACTION: f64 = 0.10;

/// Minimum eviction count that always justifies a rebuild.
const REBUILD_EVICTION_MIN_COUNT: usize = 100;

/// Rebuild at least this often once evictions occur, so memory is
/// eventually reclaimed even below the thresholds.
const REBUILD_MIN_INTERVAL: Duration = Duration::from_secs(300);

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Option<Arc<RateLimitStateInner>>,
}

/// Inner state, only allocated when rate limiting is enabled.
struct RateLimitStateInner {
    /// Keyed limiter; behind a RwLock so cleanup can rebuild it (governor's
    /// internal map does not support key removal).
    limiter: RwLock<KeyedLimiter>,
    /// Last-access timestamps per IP, for eviction.
    last_access: DashMap<String, Instant>,
    trusted_proxies: TrustedProxies,
    max_entries: u32,
    entry_ttl: Duration,
    /// Quota kept around for rebuilding.
    quota: Quota,
    last_rebuild: RwLock<Instant>,
    connect_info_warned: AtomicBool,
    at_capacity_warned: AtomicBool,
}

/// A parsed trusted proxy entry.
#[derive(Clone, Debug)]
enum TrustedEntry {
    Ip(IpAddr),
    Cidr(IpNet),
}

/// Trusted proxy configuration for IP extraction.
#[derive(Clone, Debug)]
enum TrustedProxies {
    /// Never trust forwarded headers (default).
    None,
    /// Trust headers from all sources (development only).
    All,
    /// Trust headers only from specific IPs/CIDRs.
    List(Vec<TrustedEntry>),
}

impl TrustedProxies {
    fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            Self::None
        } else if proxies.len() == 1 && proxies[0] == "*" {
            Self::All
        } else {
            let entries = proxies
                .iter()
                .filter_map(|p| {
                    let parsed = if p.contains('/') {
                        p.parse::<IpNet>().map(TrustedEntry::Cidr).map_err(|e| e.to_string())
                    } else {
                        p.parse::<IpAddr>().map(TrustedEntry::Ip).map_err(|e| e.to_string())
                    };
                    match parsed {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            tracing::warn!("Invalid entry in trusted_proxies: '{}': {}", p, e);
                            None
                        }
                    }
                })
                .collect();
            Self::List(entries)
        }
    }

    fn is_trusted(&self, connection_ip: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(entries) => {
                let ip: IpAddr = match connection_ip.parse() {
                    Ok(ip) => ip,
                    Err(_) => return false,
                };
                entries.iter().any(|entry| match entry {
                    TrustedEntry::Ip(trusted) => *trusted == ip,
                    TrustedEntry::Cidr(network) => network.contains(&ip),
                })
            }
        }
    }
}

impl RateLimitState {
    /// Create a new rate limit state from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { inner: None };
        }

        let quota = Quota::per_minute(
            NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::new(60).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(1).unwrap()));

        Self {
            inner: Some(Arc::new(RateLimitStateInner {
                limiter: RwLock::new(RateLimiter::dashmap(quota)),
                last_access: DashMap::new(),
                trusted_proxies: TrustedProxies::from_config(&config.trusted_proxies),
                max_entries: config.max_entries,
                entry_ttl: Duration::from_secs(config.entry_ttl_secs),
                quota,
                last_rebuild: RwLock::new(Instant::now()),
                connect_info_warned: AtomicBool::new(false),
                at_capacity_warned: AtomicBool::new(false),
            })),
        }
    }

    /// Check if a request from the given IP is allowed.
    pub fn check_ip(&self, ip: &str) -> Result<(), RateLimitError> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return Ok(()),
        };

        let now = Instant::now();
        let key = ip.to_string();

        // Capacity is read before taking the entry lock; DashMap's len()
        // can deadlock while an entry lock is held. Slightly racy, bounded
        // by the number of concurrent threads.
        let current_len = inner.last_access.len();
        let at_capacity = current_len >= inner.max_entries as usize;

        match inner.last_access.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                if at_capacity {
                    if !inner.at_capacity_warned.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            current_entries = current_len,
                            max_entries = inner.max_entries,
                            "Rate limiter at capacity, rejecting new IPs (logged once per event)"
                        );
                    }
                    return Err(RateLimitError {
                        retry_after_secs: 60,
                        reason: RateLimitReason::AtCapacity,
                    });
                }
                entry.insert(now);
            }
        }

        let limiter = inner.limiter.read().unwrap_or_else(|poisoned| {
            tracing::warn!("rate limiter RwLock was poisoned, recovering");
            poisoned.into_inner()
        });
        match limiter.check_key(&key) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time =
                    not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
                Err(RateLimitError {
                    retry_after_secs: wait_time.as_secs() + 1,
                    reason: RateLimitReason::RateLimited,
                })
            }
        }
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Evict stale entries and rebuild the limiter when enough were evicted.
    /// Returns the number of entries evicted.
    pub fn cleanup(&self) -> usize {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return 0,
        };

        let now = Instant::now();
        let ttl = inner.entry_ttl;
        let mut evicted = 0;

        let stale: Vec<String> = inner
            .last_access
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        for key in stale {
            // remove_if re-checks staleness so a freshly accessed entry is
            // never evicted between collection and removal.
            if inner
                .last_access
                .remove_if(&key, |_, last| now.duration_since(*last) > ttl)
                .is_some()
            {
                evicted += 1;
            }
        }

        if evicted > 0 {
            let entries_before = inner.last_access.len() + evicted;
            if self.should_rebuild(evicted, entries_before, inner, now) {
                let mut limiter = inner.limiter.write().unwrap_or_else(|poisoned| {
                    tracing::warn!("rate limiter RwLock was poisoned during rebuild, recovering");
                    poisoned.into_inner()
                });
                *limiter = RateLimiter::dashmap(inner.quota);
                drop(limiter);

                let mut last_rebuild = inner.last_rebuild.write().unwrap_or_else(|poisoned| {
                    tracing::warn!("last_rebuild RwLock was poisoned, recovering");
                    poisoned.into_inner()
                });
                *last_rebuild = Instant::now();

                tracing::debug!(
                    evicted = evicted,
                    remaining = inner.last_access.len(),
                    "Rebuilt rate limiter after cleanup"
                );
            }
            inner.at_capacity_warned.store(false, Ordering::Relaxed);
        }

        evicted
    }

    fn should_rebuild(
        &self,
        evicted: usize,
        entries_before: usize,
        inner: &RateLimitStateInner,
        now: Instant,
    ) -> bool {
        let threshold = ((entries_before as f64 * REBUILD_EVICTION_THRESHOLD_FRACTION) as usize)
            .max(REBUILD_EVICTION_MIN_COUNT);
        if evicted >= threshold {
            return true;
        }

        let last = inner.last_rebuild.read().unwrap_or_else(|poisoned| {
            tracing::warn!("last_rebuild RwLock was poisoned, recovering");
            poisoned.into_inner()
        });
        now.duration_since(*last) >= REBUILD_MIN_INTERVAL
    }

    /// Get the current number of tracked IPs.
    pub fn entry_count(&self) -> usize {
        match &self.inner {
            Some(inner) => inner.last_access.len(),
            None => 0,
        }
    }

    fn warn_connect_info_missing(&self) {
        if let Some(inner) = &self.inner
            && !inner.connect_info_warned.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                "ConnectInfo not available for rate limiting; all requests share one \
                 bucket ('unknown' IP). Serve the router with \
                 .into_make_service_with_connect_info::<SocketAddr>() to fix this."
            );
        }
    }
}

/// Reason for rate limit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Request exceeded the rate limit.
    RateLimited,
    /// Limiter at capacity, cannot track new IPs.
    AtCapacity,
}

/// Error returned when a request is not admitted.
#[derive(Debug)]
pub struct RateLimitError {
    /// Number of seconds to wait before retrying.
    pub retry_after_secs: u64,
    /// Reason for the rejection.
    pub reason: RateLimitReason,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let message = match self.reason {
            RateLimitReason::RateLimited => format!(
                "Rate limit exceeded. Retry after {} seconds.",
                self.retry_after_secs
            ),
            RateLimitReason::AtCapacity => {
                "Server is experiencing high load. Please retry later.".to_string()
            }
        };

        let body = serde_json::json!({
            "message": message,
            "retry_after": self.retry_after_secs,
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after_secs.to_string())],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Extract a forwarded client IP from headers (only called when trusted).
fn extract_forwarded_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(s) = forwarded.to_str()
        && let Some(ip) = s.split(',').next()
    {
        return Some(ip.trim().to_string());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(s) = real_ip.to_str()
    {
        return Some(s.trim().to_string());
    }

    None
}

/// Extract the direct connection IP from ConnectInfo.
fn extract_connection_ip(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// Resolve the client IP, honoring the trusted-proxy configuration.
fn extract_ip(req: &Request<Body>, state: &RateLimitState) -> String {
    let inner = match &state.inner {
        Some(inner) => inner,
        None => return "unknown".to_string(),
    };

    let connection_ip = extract_connection_ip(req);

    let trust_headers = match (&connection_ip, &inner.trusted_proxies) {
        (None, TrustedProxies::All) => true,
        // Without a connection IP a proxy list cannot be verified.
        (None, _) => false,
        (Some(conn_ip), trusted) => trusted.is_trusted(conn_ip),
    };

    if trust_headers && let Some(forwarded_ip) = extract_forwarded_ip(req) {
        return forwarded_ip;
    }

    match connection_ip {
        Some(ip) => ip,
        None => {
            state.warn_connect_info_missing();
            "unknown".to_string()
        }
    }
}

/// Per-IP rate limiting middleware, applied ahead of the handlers.
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.is_enabled() {
        return next.run(req).await;
    }

    let ip = extract_ip(&req, &rate_limit);

    match rate_limit.check_ip(&ip) {
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Spawn a background task that periodically evicts stale entries.
pub fn spawn_cleanup_task(
    state: RateLimitState,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = state.cleanup();
            if evicted > 0 {
                tracing::info!(evicted = evicted, "Rate limiter evicted stale entries");
            }
        }
    })
}
