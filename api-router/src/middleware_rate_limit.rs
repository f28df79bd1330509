use std::collections::HashMap;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;

use common::utils::config::{AppConfig, RateLimitBackend};

use crate::{api_state::ApiState, error::ApiError, middleware_api_auth::extract_api_key};

/// In-process token bucket per client id. Single writer behind a mutex; no
/// cross-process coordination, which is why deployments with more than one
/// replica set `rate_limit_backend=external` and enforce limits upstream.
pub struct RateLimiter {
    enabled: bool,
    per_minute: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.rate_limit_backend == RateLimitBackend::Internal,
            per_minute: config.rate_limit_per_minute.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `client_id`; false means the caller is over the
    /// limit.
    pub async fn try_acquire(&self, client_id: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let capacity = f64::from(self.per_minute);
        let refill_per_sec = capacity / 60.0;
        let now = Instant::now();

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(client_id.to_string()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(capacity);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub async fn rate_limit(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_id = extract_api_key(&request).unwrap_or_else(|| "anonymous".to_string());

    if !state.limiter.try_acquire(&client_id).await {
        return Err(ApiError::RateLimited(
            "rate limit exceeded; retry later".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
