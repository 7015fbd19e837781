//! Request-level gates applied before the attribution handlers run:
//! request-ID tagging, bearer-token auth, and a per-caller rate limit.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID for one request, carried as a request extension and echoed
/// back on the response so clients can quote it when reporting problems.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Accepted bearer tokens for the protected attribution routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads `ATTRIB_API_KEYS` (comma-separated tokens).
    ///
    /// A development deployment may omit the variable and run open; anywhere
    /// else an empty key set refuses to start rather than serve every tenant's
    /// attribution data unauthenticated.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let keys = parse_key_list(&std::env::var("ATTRIB_API_KEYS").unwrap_or_default());

        if keys.is_empty() {
            if is_development {
                tracing::warn!("ATTRIB_API_KEYS is empty; running without auth (development only)");
                return Ok(Self {
                    api_keys: Arc::new(keys),
                    enabled: false,
                });
            }
            anyhow::bail!("ATTRIB_API_KEYS must hold at least one token outside development");
        }

        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

fn parse_key_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug)]
struct CallerWindow {
    opened_at: Instant,
    hits: u32,
}

/// Fixed-window request limiter counted per bearer token, so one tenant's
/// burst of manual run triggers cannot lock the other tenants out. Requests
/// without a token share one anonymous bucket, which is only reachable when
/// auth is disabled in development.
#[derive(Clone)]
pub struct RateLimitState {
    max_hits: u32,
    window: Duration,
    callers: Arc<Mutex<HashMap<String, CallerWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_hits: u32, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            callers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records one hit for `caller` and reports whether it stays under the
    /// limit. Stale windows are reopened rather than evicted; the caller set
    /// is bounded by the configured key list plus the anonymous bucket.
    async fn try_acquire(&self, caller: &str) -> bool {
        let now = Instant::now();
        let mut callers = self.callers.lock().await;
        let window = callers
            .entry(caller.to_owned())
            .or_insert(CallerWindow { opened_at: now, hits: 0 });

        if now.duration_since(window.opened_at) >= self.window {
            window.opened_at = now;
            window.hits = 0;
        }

        if window.hits >= self.max_hits {
            return false;
        }
        window.hits += 1;
        true
    }
}

#[derive(Debug, Serialize)]
struct GateErrorBody {
    error: GateError,
}

#[derive(Debug, Serialize)]
struct GateError {
    code: &'static str,
    message: &'static str,
}

fn deny(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(GateErrorBody {
            error: GateError { code, message },
        }),
    )
        .into_response()
}

/// Tags the request with an `x-request-id`: the client's value when the
/// header is present, a fresh `UUIDv4` otherwise. The ID lands in request
/// extensions as [`RequestId`] and on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Rejects requests whose `Authorization` header does not carry a configured
/// bearer token. A no-op when auth is disabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => deny(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

/// Applies the per-caller fixed window; over-limit callers get a 429 while
/// everyone else proceeds untouched.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .unwrap_or("anonymous")
        .to_owned();

    if !rate_limit.try_acquire(&caller).await {
        let caller_known = caller != "anonymous";
        tracing::warn!(caller_known, "request rate limit hit");
        return deny(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.trim().is_empty())
}
