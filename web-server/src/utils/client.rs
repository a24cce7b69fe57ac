// web-server/src/utils/client.rs
use actix_web::dev::ConnectionInfo;
use std::net::SocketAddr;

/// Address a request is attributed to for rate limiting and audit logs.
///
/// Forwarded headers are client-supplied, so they are only honoured when the
/// gateway runs behind a trusted proxy. Otherwise the socket peer is used.
pub fn client_ip(peer_addr: Option<SocketAddr>, info: &ConnectionInfo, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = info.realip_remote_addr() {
            return ip.to_string();
        }
    }

    peer_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
