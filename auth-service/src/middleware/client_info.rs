use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::{models::ClientInfo, AppState};

/// Caller address and user agent, recorded on tokens and audit entries.
pub struct RequestClient(pub ClientInfo);

/// Nearest `X-Forwarded-For` hop that is not itself a trusted proxy.
fn forwarded_client(parts: &Parts, trusted_proxies: &[IpAddr]) -> Option<String> {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())?
        .rsplit(',')
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .find(|hop| {
            hop.parse::<IpAddr>()
                .map_or(true, |ip| !trusted_proxies.contains(&ip))
        })
        .map(str::to_string)
}

/// Socket peer address. `X-Forwarded-For` is only honoured when the peer is a
/// trusted proxy.
pub fn client_info_from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> ClientInfo {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let ip_address = match peer {
        Some(ip) if trusted_proxies.contains(&ip) => {
            forwarded_client(parts, trusted_proxies).or_else(|| Some(ip.to_string()))
        }
        other => other.map(|ip| ip.to_string()),
    };

    let user_agent = parts
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        ip_address,
        user_agent,
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestClient {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestClient(client_info_from_parts(
            parts,
            &state.config.security.trusted_proxies,
        )))
    }
}
