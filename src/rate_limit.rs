// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Per-Route Rate Limiting
//!
//! `governor` keyed limiters, one per configured quota, keyed by
//! (route, client IP). Every API route gets the per-route quotas plus the
//! default quotas, and a request is admitted only if every limiter admits it.
//!
//! Default limits: `1/second` per route, plus `200/day` and `50/hour`.
//! A quota of `N/period` allows bursts of `N` and replenishes one request
//! every `period / N`.
//!
//! ## Client Identity
//!
//! The client IP comes from `ConnectInfo<SocketAddr>`, so the server must be
//! started with `into_make_service_with_connect_info`. Requests without it
//! (e.g. in-process tests) share one bucket under the unspecified address.
//!
//! ## Cleanup
//!
//! [`RateLimiter::run_sweeper`] periodically drops keys whose buckets have
//! fully replenished, until its `CancellationToken` is cancelled.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota as GovernorQuota,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ApiError;

/// Default interval between cleanup sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// Quotas
// =============================================================================

/// `limit` requests per `period`, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub period: Duration,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid rate limit {0:?} (expected e.g. `10/minute` or `10 per 2 hours`)")]
pub struct QuotaParseError(String);

impl Quota {
    pub const fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period }
    }

    /// Parse a `;` or `,` separated list of quotas.
    pub fn parse_list(s: &str) -> Result<Vec<Quota>, QuotaParseError> {
        s.split([';', ','])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse::<Quota>)
            .collect()
    }

    /// The equivalent `governor` quota: a burst of `limit`, one cell
    /// replenished every `period / limit`.
    ///
    /// `None` when the replenish interval rounds down to zero.
    pub fn to_governor(&self) -> Option<GovernorQuota> {
        let burst = NonZeroU32::new(self.limit)?;
        GovernorQuota::with_period(self.period / self.limit).map(|quota| quota.allow_burst(burst))
    }
}

impl FromStr for Quota {
    type Err = QuotaParseError;

    /// Accepts `N/unit`, `N per unit`, `N/M units` and `N per M units`,
    /// where unit is second, minute, hour or day (singular or plural).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuotaParseError(s.to_string());
        let s = s.trim();

        let (count, span) = match s.split_once('/') {
            Some(parts) => parts,
            None => s.split_once(" per ").ok_or_else(err)?,
        };

        let limit: u32 = count.trim().parse().map_err(|_| err())?;

        let mut words = span.split_whitespace();
        let (multiplier, unit) = match (words.next(), words.next(), words.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => (n.parse::<u64>().map_err(|_| err())?, unit),
            _ => return Err(err()),
        };

        let unit_secs: u64 = match unit.to_ascii_lowercase().trim_end_matches('s') {
            "second" => 1,
            "minute" => 60,
            "hour" => 3_600,
            "day" => 86_400,
            _ => return Err(err()),
        };

        if limit == 0 || multiplier == 0 {
            return Err(err());
        }

        let secs = multiplier.checked_mul(unit_secs).ok_or_else(err)?;
        let quota = Quota::new(limit, Duration::from_secs(secs));
        quota.to_governor().ok_or_else(err)?;
        Ok(quota)
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.period.as_secs();
        let (n, unit) = [(86_400, "day"), (3_600, "hour"), (60, "minute")]
            .into_iter()
            .find(|(unit_secs, _)| secs >= *unit_secs && secs % unit_secs == 0)
            .map(|(unit_secs, unit)| (secs / unit_secs, unit))
            .unwrap_or((secs, "second"));
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{} per {n} {unit}{plural}", self.limit)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Quotas specific to each route.
    pub route: Vec<Quota>,
    /// Quotas every route gets on top of its own.
    pub default: Vec<Quota>,
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            route: Vec::new(),
            default: Vec::new(),
        }
    }

    fn quotas(&self) -> impl Iterator<Item = &Quota> {
        self.route.iter().chain(self.default.iter())
    }
}

// =============================================================================
// Limiter
// =============================================================================

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited {
        /// The exhausted quota with the longest wait
        quota: Quota,
        /// Time until that quota admits another request
        retry_after: Duration,
    },
}

type BucketKey = (String, IpAddr);

type KeyedLimiter<C> = governor::RateLimiter<
    BucketKey,
    DashMapStateStore<BucketKey>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// Per-route, per-client rate limiter over one `governor` limiter per quota.
pub struct RateLimiter<C: Clock = DefaultClock> {
    config: RateLimitConfig,
    clock: C,
    limiters: Vec<(Quota, KeyedLimiter<C>)>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Build a limiter reading time from `clock`.
    ///
    /// Quotas that have no `governor` equivalent are skipped with a warning;
    /// [`Quota::from_str`] never produces one.
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Self {
        let limiters = if config.enabled {
            config
                .quotas()
                .filter_map(|quota| match quota.to_governor() {
                    Some(governor_quota) => Some((
                        *quota,
                        governor::RateLimiter::dashmap_with_clock(governor_quota, &clock),
                    )),
                    None => {
                        warn!(%quota, "Ignoring unrepresentable rate limit");
                        None
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            config,
            clock,
            limiters,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request from `client` to `route` against every quota.
    pub fn check(&self, route: &str, client: IpAddr) -> RateLimitResult {
        if self.limiters.is_empty() {
            return RateLimitResult::Allowed;
        }

        let key = (route.to_string(), client);
        let mut limited: Option<(Quota, Duration)> = None;
        for (quota, limiter) in &self.limiters {
            if let Err(not_until) = limiter.check_key(&key) {
                let retry_after = not_until.wait_time_from(self.clock.now());
                if limited.map_or(true, |(_, longest)| retry_after > longest) {
                    limited = Some((*quota, retry_after));
                }
            }
        }

        match limited {
            Some((quota, retry_after)) => RateLimitResult::Limited { quota, retry_after },
            None => RateLimitResult::Allowed,
        }
    }

    /// Drop keys whose buckets have fully replenished. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let before = self.bucket_count();
        for (_, limiter) in &self.limiters {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        before.saturating_sub(self.bucket_count())
    }

    /// Number of tracked (quota, route, client) buckets.
    pub fn bucket_count(&self) -> usize {
        self.limiters.iter().map(|(_, limiter)| limiter.len()).sum()
    }

    /// Run cleanup sweeps until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(limiter.clone().run_sweeper(DEFAULT_SWEEP_INTERVAL, shutdown.clone()));
    /// ```
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        info!(
            interval_secs = interval.as_secs(),
            "Rate limit sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let removed = self.cleanup();
                    if removed > 0 {
                        debug!(removed, "Removed idle rate limit buckets");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Rate limit sweeper shutting down");
                    return;
                }
            }
        }
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Rate limiting middleware; apply with `route_layer` so the matched route
/// is known.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let route = format!("{} {path}", request.method());
    let client = client_ip(&request);

    match limiter.check(&route, client) {
        RateLimitResult::Allowed => next.run(request).await,
        RateLimitResult::Limited { quota, retry_after } => {
            warn!(%route, %client, %quota, "Rate limit exceeded");
            let retry_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            let mut response =
                ApiError::too_many_requests(format!("Rate limit exceeded: {quota}")).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_secs));
            response
        }
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn limiter(route: &str, default: &str) -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let config = RateLimitConfig {
            enabled: true,
            route: Quota::parse_list(route).unwrap(),
            default: Quota::parse_list(default).unwrap(),
        };
        (RateLimiter::with_clock(config, clock.clone()), clock)
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));

    #[test]
    fn parses_quota_formats() {
        assert_eq!(
            "1/second".parse::<Quota>().unwrap(),
            Quota::new(1, Duration::from_secs(1))
        );
        assert_eq!(
            "50 per hour".parse::<Quota>().unwrap(),
            Quota::new(50, Duration::from_secs(3_600))
        );
        assert_eq!(
            "10/2 minutes".parse::<Quota>().unwrap(),
            Quota::new(10, Duration::from_secs(120))
        );
        assert_eq!(
            "200 per 1 Days".parse::<Quota>().unwrap(),
            Quota::new(200, Duration::from_secs(86_400))
        );
        for bad in ["", "lots", "0/second", "5/fortnight", "5 per 0 hours", "x/second"] {
            assert!(bad.parse::<Quota>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn huge_periods_are_rejected_not_wrapped() {
        let huge = format!("1 per {} days", u64::MAX / 2);
        assert!(huge.parse::<Quota>().is_err());
    }

    #[test]
    fn maps_to_governor_quota() {
        let quota = Quota::new(50, Duration::from_secs(3_600)).to_governor().unwrap();
        assert_eq!(quota.burst_size().get(), 50);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(72));

        assert!(Quota::new(u32::MAX, Duration::from_secs(1)).to_governor().is_none());
    }

    #[test]
    fn parses_lists() {
        assert_eq!(
            Quota::parse_list("200/day; 50/hour").unwrap(),
            vec![
                Quota::new(200, Duration::from_secs(86_400)),
                Quota::new(50, Duration::from_secs(3_600)),
            ]
        );
        assert!(Quota::parse_list("").unwrap().is_empty());
        assert!(Quota::parse_list("1/second;nope").is_err());
    }

    #[test]
    fn displays_like_limit_headers() {
        assert_eq!(Quota::new(1, Duration::from_secs(1)).to_string(), "1 per 1 second");
        assert_eq!(Quota::new(50, Duration::from_secs(3_600)).to_string(), "50 per 1 hour");
        assert_eq!(Quota::new(10, Duration::from_secs(120)).to_string(), "10 per 2 minutes");
        assert_eq!(Quota::new(3, Duration::from_secs(90)).to_string(), "3 per 90 seconds");
    }

    #[test]
    fn limits_per_route_and_client() {
        let (limiter, clock) = limiter("1/second", "");

        assert_eq!(limiter.check("GET /a", CLIENT), RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check("GET /a", CLIENT),
            RateLimitResult::Limited { .. }
        ));

        // Other routes and other clients have their own buckets.
        assert_eq!(limiter.check("POST /a", CLIENT), RateLimitResult::Allowed);
        assert_eq!(limiter.check("GET /a", OTHER), RateLimitResult::Allowed);

        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.check("GET /a", CLIENT), RateLimitResult::Allowed);
    }

    #[test]
    fn default_quotas_apply_on_top_of_route_quota() {
        let (limiter, clock) = limiter("1/second", "2/hour");

        assert_eq!(limiter.check("GET /a", CLIENT), RateLimitResult::Allowed);
        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.check("GET /a", CLIENT), RateLimitResult::Allowed);
        clock.advance(Duration::from_secs(1));

        match limiter.check("GET /a", CLIENT) {
            RateLimitResult::Limited { quota, retry_after } => {
                assert_eq!(quota, Quota::new(2, Duration::from_secs(3_600)));
                // One of the two hourly cells comes back 30 minutes after the first hit.
                assert_eq!(retry_after, Duration::from_secs(1_798));
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(RateLimitConfig::disabled());
        for _ in 0..10 {
            assert_eq!(limiter.check("GET /a", CLIENT), RateLimitResult::Allowed);
        }
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn cleanup_drops_replenished_buckets() {
        let (limiter, clock) = limiter("1/second", "");
        limiter.check("GET /a", CLIENT);
        limiter.check("GET /a", OTHER);
        assert_eq!(limiter.bucket_count(), 2);

        assert_eq!(limiter.cleanup(), 0);
        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.cleanup(), 2);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancel() {
        let (limiter, clock) = limiter("1/second", "");
        let limiter = Arc::new(limiter);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(limiter.clone().run_sweeper(Duration::from_secs(1), shutdown.clone()));

        limiter.check("GET /a", CLIENT);
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(limiter.bucket_count(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
