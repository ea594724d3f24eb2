use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use truekland_shared::UserId;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token-bucket limiter keyed by anything hashable (client IP, user id,
/// normalized email).
#[derive(Clone)]
pub struct RateLimiter<K> {
    buckets: Arc<Mutex<HashMap<K, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    /// Take one token for `key`. Returns `false` when the bucket is empty.
    pub async fn check(&self, key: &K) -> bool {
        let mut buckets = self.buckets.lock().await;
        if let Some(bucket) = buckets.get_mut(key) {
            return bucket.try_consume(self.rate, self.capacity);
        }
        let mut bucket = TokenBucket::new(self.capacity);
        let allowed = bucket.try_consume(self.rate, self.capacity);
        buckets.insert(key.clone(), bucket);
        allowed
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl<K: Eq + Hash + Clone> Default for RateLimiter<K> {
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

/// All limiters the API consults.
#[derive(Clone)]
pub struct Limiters {
    /// Every request, per client IP.
    pub requests: RateLimiter<IpAddr>,
    /// Login attempts, per normalized email.
    pub logins: RateLimiter<String>,
    /// Chat messages, per sender.
    pub messages: RateLimiter<UserId>,
    /// Post creation and exchange proposals, per user.
    pub writes: RateLimiter<UserId>,
}

impl Limiters {
    pub fn new(requests_per_sec: f64, request_burst: f64) -> Self {
        Self {
            requests: RateLimiter::new(requests_per_sec, request_burst),
            // 5 attempts, then one every 12 seconds
            logins: RateLimiter::new(1.0 / 12.0, 5.0),
            messages: RateLimiter::new(2.0, 20.0),
            writes: RateLimiter::new(0.2, 10.0),
        }
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        self.requests.purge_stale(max_idle_secs).await;
        self.logins.purge_stale(max_idle_secs).await;
        self.messages.purge_stale(max_idle_secs).await;
        self.writes.purge_stale(max_idle_secs).await;
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter<IpAddr>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = extract_client_ip(&req);

    if let Some(ip) = ip {
        if !limiter.check(&ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}
