//! Request provenance extraction.
//!
//! The client address comes from the first `X-Forwarded-For` hop when a
//! proxy set one, otherwise from the socket peer. Neither is trusted for
//! anything beyond the audit metadata on a purchase.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};
use cartsync_engine::RequestContext;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Provenance of the current request.
#[derive(Debug, Clone)]
pub struct ClientContext(pub RequestContext);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let client_ip = forwarded_for(&parts.headers).or(peer);

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .filter(|ua| !ua.is_empty())
            .map(str::to_string);

        Ok(ClientContext(RequestContext::new(client_ip, user_agent)))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, _) = request.into_parts();
        let ClientContext(ctx) = ClientContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn prefers_forwarded_for() {
        let mut request = Request::builder()
            .header(FORWARDED_FOR, "203.0.113.9, 10.0.0.2")
            .header(USER_AGENT, "Mozilla/5.0")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let ctx = extract(request).await;
        assert_eq!(ctx.client_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn falls_back_to_peer_address() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 0, 4], 4000))));

        let ctx = extract(request).await;
        assert_eq!(ctx.client_ip.as_deref(), Some("192.168.0.4"));
        assert_eq!(ctx.user_agent, None);
    }

    #[tokio::test]
    async fn nothing_known() {
        let ctx = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(ctx, RequestContext::default());
    }
}
