//! Custom Axum extractors.
//!
//! This module contains extractors for the storefront request pipeline:
//! - `ActorId`: the acting principal (member id, or a header for internal callers)
//! - `ClientIp`: client IP address from proxy headers or the connection
//! - `PageParams`: validated `?cursor=&size=` listing parameters
//!
//! # Examples
//!
//! ```ignore
//! use axum::extract::State;
//! use storefront_web::extractors::{ActorId, PageParams};
//!
//! async fn curation_products(
//!     State(state): State<AppState<RedisKeyValueStore>>,
//!     Path(curation_id): Path<u64>,
//!     PageParams(request): PageParams,
//! ) -> Result<Json<CursorPage<ProductCard>>, AppError> {
//!     let rows = db.curation_products(curation_id, request.cursor(), request.fetch_limit()).await?;
//!     Ok(Json(request.paginate(rows, |p| p.id)))
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts, Query},
    http::{request::Parts, HeaderMap},
};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use storefront_core::config::PaginationConfig;
use storefront_core::CursorRequest;

/// Header carrying the actor for callers without an authenticated principal.
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";

/// Acting principal of a request.
///
/// Authentication middleware places an `ActorId` in the request extensions;
/// otherwise the `X-Actor-Id` header is used. Extraction fails with
/// `401 Unauthorized` when neither is present.
///
/// # Example
///
/// ```ignore
/// async fn create_order(actor: ActorId, Json(order): Json<NewOrder>) -> Result<StatusCode, AppError> {
///     orders.create(&actor.0, order).await?;
///     Ok(StatusCode::CREATED)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId(pub String);

impl ActorId {
    /// Actor from request extensions or the `X-Actor-Id` header.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        parts.extensions.get::<Self>().cloned().or_else(|| {
            parts
                .headers
                .get(ACTOR_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Self(s.to_string()))
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts).ok_or_else(|| AppError::unauthorized("Missing actor"))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection IP (when the server was started with `ConnectInfo`)
/// 4. `127.0.0.1`
///
/// # Example
///
/// ```ignore
/// async fn handler(client_ip: ClientIp) -> String {
///     format!("Client IP: {}", client_ip.0)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = client_ip(parts).unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        Ok(Self(ip))
    }
}

/// Client IP from proxy headers, then the connection, if known.
#[must_use]
pub fn client_ip(parts: &Parts) -> Option<IpAddr> {
    forwarded_ip(&parts.headers).or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Extract client IP from proxy headers.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // Try X-Forwarded-For (take first IP)
    let from_forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    from_forwarded.or_else(|| {
        headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    cursor: Option<u64>,
    size: Option<usize>,
}

/// Validated cursor-pagination parameters from `?cursor=&size=`.
///
/// A missing `size` takes the configured default. A `size` of zero or above
/// the configured maximum is rejected with `422 Unprocessable Entity`;
/// a malformed query string with `400 Bad Request`.
///
/// Page bounds come from the [`PaginationConfig`] reachable from the router
/// state through [`FromRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams(pub CursorRequest);

#[async_trait]
impl<S> FromRequestParts<S> for PageParams
where
    S: Send + Sync,
    PaginationConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let limits = PaginationConfig::from_ref(state);
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        let request = CursorRequest::new(
            query.cursor,
            query.size.unwrap_or(limits.default_size),
            limits.max_size,
        )?;

        Ok(Self(request))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn limits() -> PaginationConfig {
        PaginationConfig {
            default_size: 10,
            max_size: 100,
        }
    }

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_actor_from_extension_wins() {
        let mut req = Request::builder()
            .header(ACTOR_ID_HEADER, "from-header")
            .body(())
            .expect("Valid request");
        req.extensions_mut().insert(ActorId("42".to_string()));

        let mut parts = parts(req);
        let actor = ActorId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(actor.0, "42");
    }

    #[tokio::test]
    async fn test_actor_from_header() {
        let req = Request::builder()
            .header(ACTOR_ID_HEADER, " 7 ")
            .body(())
            .expect("Valid request");

        let actor = ActorId::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(actor.0, "7");
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let req = Request::builder().body(()).expect("Valid request");

        let err = ActorId::from_request_parts(&mut parts(req), &())
            .await
            .expect_err("Should reject");

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_client_ip_from_x_forwarded_for() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.1, 198.51.100.1")
            .body(())
            .expect("Valid request");

        let client_ip = ClientIp::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_from_x_real_ip() {
        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.42")
            .body(())
            .expect("Valid request");

        let client_ip = ClientIp::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn test_client_ip_from_connection() {
        let mut req = Request::builder().body(()).expect("Valid request");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4711))));

        let client_ip = ClientIp::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "192.0.2.9");
    }

    #[tokio::test]
    async fn test_client_ip_fallback() {
        let req = Request::builder().body(()).expect("Valid request");

        let client_ip = ClientIp::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_page_params_defaults() {
        let req = Request::builder()
            .uri("/api/curations/3/products")
            .body(())
            .expect("Valid request");

        let PageParams(request) = PageParams::from_request_parts(&mut parts(req), &limits())
            .await
            .expect("Should extract");

        assert_eq!(request.cursor(), None);
        assert_eq!(request.size(), 10);
        assert_eq!(request.fetch_limit(), 11);
    }

    #[tokio::test]
    async fn test_page_params_with_cursor() {
        let req = Request::builder()
            .uri("/api/curations/3/products?cursor=40&size=2")
            .body(())
            .expect("Valid request");

        let PageParams(request) = PageParams::from_request_parts(&mut parts(req), &limits())
            .await
            .expect("Should extract");

        assert_eq!(request.cursor(), Some(40));
        assert_eq!(request.size(), 2);
    }

    #[tokio::test]
    async fn test_page_params_rejects_oversized_page() {
        let req = Request::builder()
            .uri("/api/products?size=101")
            .body(())
            .expect("Valid request");

        let err = PageParams::from_request_parts(&mut parts(req), &limits())
            .await
            .expect_err("Should reject");

        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_page_params_rejects_malformed_cursor() {
        let req = Request::builder()
            .uri("/api/products?cursor=abc")
            .body(())
            .expect("Valid request");

        let err = PageParams::from_request_parts(&mut parts(req), &limits())
            .await
            .expect_err("Should reject");

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
