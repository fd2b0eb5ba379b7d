use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

/// Address of the terminal that sent the request
///
/// The passkey throttle keys on this. Requests served without connection info
/// (in-process tests) share the `"unknown"` bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

fn peer_ip(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn client_address(mut request: Request, next: Next) -> Response {
    let addr = ClientAddr(peer_ip(&request));
    request.extensions_mut().insert(addr);
    next.run(request).await
}
