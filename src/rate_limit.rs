//! Rate limiting for token endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down refresh
//! token guessing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::RateLimitingMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use std::{
    num::NonZeroU32,
    sync::{Arc, Weak},
    time::Duration,
};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::extract_client_ip;
use crate::cli::ClientIpHeader;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Refresh requests allowed per minute per client IP.
pub const REFRESH_PER_MINUTE: u32 = 10;

/// How often stale per-IP entries are dropped from the limiters.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn refresh_quota() -> Quota {
    Quota::per_minute(NonZeroU32::new(REFRESH_PER_MINUTE).unwrap_or(NonZeroU32::MIN))
}

/// Rate limiting state for the refresh endpoint.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub refresh: Arc<IpLimiter>,
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            refresh: Arc::new(RateLimiter::keyed(refresh_quota())),
            ip_header,
        }
    }

    /// Spawn a background task that prunes the limiters every `PRUNE_INTERVAL`.
    /// The task stops once every clone of this config has been dropped.
    pub fn spawn_pruning(&self) -> tokio::task::JoinHandle<()> {
        let refresh: Weak<IpLimiter> = Arc::downgrade(&self.refresh);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                let Some(limiter) = refresh.upgrade() else {
                    break;
                };
                prune(&*limiter);
            }
        })
    }
}

/// Drop keys whose state is indistinguishable from a fresh client.
pub fn prune<C, MW>(limiter: &RateLimiter<String, DefaultKeyedStateStore<String>, C, MW>)
where
    C: Clock,
    MW: RateLimitingMiddleware<C::Instant>,
{
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    debug!(before, after = limiter.len(), "Pruned rate limiter");
}

/// Middleware for rate limiting the refresh endpoint.
pub async fn rate_limit_refresh(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejecting refresh without client IP");
            return ApiError::forbidden("Unable to determine client IP.").into_response();
        }
    };

    match config.refresh.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => ApiError::too_many_requests("Too many refresh attempts. Please try again later.")
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    #[test]
    fn test_prune_drops_idle_clients() {
        let clock = FakeRelativeClock::default();
        let limiter: RateLimiter<String, DefaultKeyedStateStore<String>, _, _> =
            RateLimiter::dashmap_with_clock(refresh_quota(), clock.clone());

        for i in 0..5 {
            assert!(limiter.check_key(&format!("198.51.100.{}", i)).is_ok());
        }
        assert_eq!(limiter.len(), 5);

        // Recent clients are kept
        prune(&limiter);
        assert_eq!(limiter.len(), 5);

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check_key(&"198.51.100.0".to_string()).is_ok());
        prune(&limiter);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_pruning_task_stops_with_config() {
        let config = RateLimitConfig::new(None);
        let handle = config.spawn_pruning();
        drop(config);

        tokio::time::timeout(PRUNE_INTERVAL * 2, handle)
            .await
            .expect("pruning task did not stop")
            .unwrap();
    }
}
