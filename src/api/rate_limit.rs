//! Gateway-wide request budget
//!
//! `/chat` and `/report` share one budget; `/health` is never limited. A
//! rejected request gets `429` with a `{message}` body and `Retry-After`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;

use super::ApiState;

/// Shown to clients that spent the budget
pub const RATE_LIMITED: &str = "Too many requests. Please try again shortly.";

/// Shared request budget
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Budget of `requests_per_minute`, all of which may arrive at once
#[must_use]
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Time until the budget admits another request, `None` if it does now
#[must_use]
pub fn check(limiter: &SharedLimiter) -> Option<Duration> {
    limiter
        .check()
        .err()
        .map(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
}

/// Whole seconds for `Retry-After`, never zero
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let Some(limiter) = &state.rate_limiter else {
        return next.run(req).await;
    };

    match check(limiter) {
        None => next.run(req).await,
        Some(wait) => {
            let secs = retry_after_secs(wait);
            tracing::warn!(path = %req.uri().path(), retry_after = secs, "request budget spent");

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "message": RATE_LIMITED })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_admits_burst_then_reports_wait() {
        let limiter = create_limiter(2);
        assert!(check(&limiter).is_none());
        assert!(check(&limiter).is_none());

        let wait = check(&limiter).unwrap();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(30));
    }

    #[test]
    fn zero_rpm_still_admits_one_request() {
        let limiter = create_limiter(0);
        assert!(check(&limiter).is_none());
        assert!(check(&limiter).is_some());
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(200)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(2)), 2);
        assert_eq!(retry_after_secs(Duration::from_millis(2500)), 3);
    }
}
