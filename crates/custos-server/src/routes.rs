//! Admin route dispatch.

use std::time::Instant;

use bytes::Bytes;
use custos_authz::{Custos, RefreshOutcome, UserRefresh};
use custos_core::{ServiceName, UserId};
use custos_telemetry::{record_request, render_metrics};
use http::request::Parts;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::admin_manifest::{cache_target, LIST_POLICIES_ACTION, REFRESH_ACTION};
use crate::error::{ErrorResponse, ServerError, ServerResult};
use crate::guard::{caller_id, enforce};

/// Largest body read when no limit is configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body of `POST /admin/cache/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    /// User whose bundles are refreshed.
    pub user_id: String,
    /// A single service; every registered service when absent.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Rebuild the bundle immediately instead of on the next request.
    #[serde(default)]
    pub eager: bool,
}

/// One pair in a bulk refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshPair {
    /// The user.
    pub user_id: String,
    /// The service.
    pub service_name: String,
}

/// Body of `POST /admin/cache/refresh/bulk`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkRefreshRequest {
    /// Pairs to refresh.
    pub pairs: Vec<RefreshPair>,
    /// Rebuild the bundles immediately.
    #[serde(default)]
    pub eager: bool,
}

/// Response of the refresh endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// Per-pair outcomes.
    pub outcomes: Vec<RefreshOutcome>,
    /// Number of pairs with an error.
    pub failed: usize,
    /// Bundles cleared by a refresh covering every service of a user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidated: Option<usize>,
}

impl From<Vec<RefreshOutcome>> for RefreshResponse {
    fn from(outcomes: Vec<RefreshOutcome>) -> Self {
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        Self {
            outcomes,
            failed,
            invalidated: None,
        }
    }
}

impl From<UserRefresh> for RefreshResponse {
    fn from(refresh: UserRefresh) -> Self {
        Self {
            invalidated: Some(refresh.invalidated),
            ..Self::from(refresh.outcomes)
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Routes admin requests to the authorization engine.
///
/// Every `/admin` route is itself guarded by the engine, under the
/// server's own service identity.
#[derive(Debug, Clone)]
pub struct AdminApi {
    custos: Custos,
    service: ServiceName,
    identity_header: String,
    max_body_bytes: usize,
}

impl AdminApi {
    /// Creates the API for `custos`, authorizing callers in `service`.
    pub fn new(custos: Custos, service: impl Into<ServiceName>, identity_header: impl Into<String>) -> Self {
        Self {
            custos,
            service: service.into(),
            identity_header: identity_header.into().to_lowercase(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the largest request body accepted.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// The wrapped engine.
    pub fn custos(&self) -> &Custos {
        &self.custos
    }

    /// Handles one request with a fully read body.
    pub async fn dispatch(&self, req: Request<Bytes>) -> Response<Full<Bytes>> {
        self.handle(req.map(Full::new)).await
    }

    /// Handles one request, reading at most the configured body size.
    ///
    /// Admin routes reject a missing caller identity before the body is
    /// read.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = tracing::info_span!(
            "admin_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        async move {
            let route = route_label(&path);
            let mut response = match self.read_and_route(req).await {
                Ok(response) => response,
                Err(e) => error_response(&e, &request_id),
            };
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            let status = response.status().as_u16();
            record_request(route, status);
            info!(
                status,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn read_and_route<B>(&self, req: Request<B>) -> ServerResult<Response<Full<Bytes>>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        self.preflight(&parts)?;
        let limit = self.max_body_bytes;
        let body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| body_error(&e, limit))?
            .to_bytes();
        self.route(Request::from_parts(parts, body)).await
    }

    // Checks that need only the head of the request.
    fn preflight(&self, parts: &Parts) -> ServerResult<()> {
        if route_label(parts.uri.path()).starts_with("/admin") {
            caller_id(&parts.headers, &self.identity_header)?;
        }
        let declared = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let limit = u64::try_from(self.max_body_bytes).unwrap_or(u64::MAX);
        if declared.is_some_and(|len| len > limit) {
            return Err(ServerError::PayloadTooLarge {
                limit: self.max_body_bytes,
            });
        }
        Ok(())
    }

    async fn route(&self, req: Request<Bytes>) -> ServerResult<Response<Full<Bytes>>> {
        let path = req.uri().path().to_string();
        match (req.method(), path.as_str()) {
            (&Method::GET, "/health") => Ok(json_response(
                StatusCode::OK,
                &HealthResponse {
                    status: "healthy",
                    version: crate::VERSION,
                },
            )),
            (&Method::GET, "/metrics") => match render_metrics() {
                Some(text) => Ok(text_response(StatusCode::OK, text)),
                None => Err(ServerError::not_found(path)),
            },
            (&Method::GET, "/admin/policies") => self.list_policies(&req).await,
            (&Method::POST, "/admin/cache/refresh") => self.refresh(&req).await,
            (&Method::POST, "/admin/cache/refresh/bulk") => self.refresh_bulk(&req).await,
            (_, "/health" | "/metrics" | "/admin/policies" | "/admin/cache/refresh" | "/admin/cache/refresh/bulk") => {
                Err(ServerError::MethodNotAllowed)
            }
            _ => Err(ServerError::not_found(path)),
        }
    }

    async fn authorize(&self, req: &Request<Bytes>, action: &str) -> ServerResult<UserId> {
        let caller = caller_id(req.headers(), &self.identity_header)?;
        let target = cache_target();
        enforce(self.custos.engine(), &caller, &self.service, action, Some(&target)).await?;
        Ok(caller)
    }

    async fn list_policies(&self, req: &Request<Bytes>) -> ServerResult<Response<Full<Bytes>>> {
        self.authorize(req, LIST_POLICIES_ACTION).await?;
        Ok(json_response(StatusCode::OK, &self.custos.registry().describe()))
    }

    async fn refresh(&self, req: &Request<Bytes>) -> ServerResult<Response<Full<Bytes>>> {
        let caller = self.authorize(req, REFRESH_ACTION).await?;
        let body: RefreshRequest = parse_body(req.body())?;
        if body.user_id.trim().is_empty() {
            return Err(ServerError::bad_request("user_id must not be empty"));
        }

        let user_id = UserId::new(body.user_id);
        let response = match body.service_name {
            Some(service) => {
                let pairs = [(user_id.clone(), ServiceName::new(service))];
                RefreshResponse::from(self.custos.notifier().force_refresh(&pairs, body.eager).await)
            }
            None => RefreshResponse::from(self.custos.notifier().force_refresh_user(&user_id, body.eager).await?),
        };

        info!(caller = %caller, user_id = %user_id, eager = body.eager, "cache refresh requested");
        Ok(json_response(StatusCode::OK, &response))
    }

    async fn refresh_bulk(&self, req: &Request<Bytes>) -> ServerResult<Response<Full<Bytes>>> {
        let caller = self.authorize(req, REFRESH_ACTION).await?;
        let body: BulkRefreshRequest = parse_body(req.body())?;
        if body.pairs.is_empty() {
            return Err(ServerError::bad_request("pairs must not be empty"));
        }

        let pairs: Vec<(UserId, ServiceName)> = body
            .pairs
            .into_iter()
            .map(|p| (UserId::new(p.user_id), ServiceName::new(p.service_name)))
            .collect();
        let outcomes = self.custos.notifier().force_refresh(&pairs, body.eager).await;

        info!(caller = %caller, pairs = pairs.len(), eager = body.eager, "bulk cache refresh requested");
        Ok(json_response(StatusCode::OK, &RefreshResponse::from(outcomes)))
    }
}

fn body_error(err: &BoxError, limit: usize) -> ServerError {
    if err.downcast_ref::<LengthLimitError>().is_some() {
        ServerError::PayloadTooLarge { limit }
    } else {
        ServerError::bad_request(format!("failed to read body: {err}"))
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::bad_request(format!("invalid JSON body: {e}")))
}

// Metric label for a path; unknown paths share one label.
fn route_label(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/admin/policies" => "/admin/policies",
        "/admin/cache/refresh" => "/admin/cache/refresh",
        "/admin/cache/refresh/bulk" => "/admin/cache/refresh/bulk",
        _ => "unmatched",
    }
}

/// Create a JSON response.
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

/// Create an error response.
fn error_response(err: &ServerError, request_id: &str) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse::from(err).with_request_id(request_id);
    json_response(status, &body)
}
