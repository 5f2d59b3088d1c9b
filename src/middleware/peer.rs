//! Peer address extraction for middleware.
//!
//! The client identity comes from the TCP peer address, which Axum exposes
//! through the `ConnectInfo<SocketAddr>` request extension when the app is
//! served with `into_make_service_with_connect_info::<SocketAddr>()` (see
//! [`crate::server::serve`]).
//!
//! Forwarding headers such as `X-Forwarded-For` are deliberately ignored:
//! they are client-controlled and would let a caller pick its own rate-limit
//! bucket.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

use crate::limiter::ClientKey;

/// Placeholder logged when the peer address is not available.
pub const UNKNOWN_ADDR: &str = "unknown";

/// Peer socket address of the connection the request arrived on.
#[inline]
pub fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Rate-limit identity for the request: peer host with the port stripped.
///
/// Returns `None` when no peer address is attached, in which case admission
/// cannot be evaluated and the caller must fail closed.
#[inline]
pub fn client_key<B>(req: &Request<B>) -> Option<ClientKey> {
    peer_addr(req).map(ClientKey::from)
}
