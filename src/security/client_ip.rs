//! Client identification for rate limiting.
//!
//! # Resolution order
//! 1. `X-Forwarded-For` (first entry that parses as an IP address)
//! 2. `X-Real-IP`
//! 3. Socket peer address
//! 4. `"unknown"`
//!
//! Malformed headers are skipped, never reported.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Identifier used when no address source is usable.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate limiting identifier for a request.
pub fn resolve_client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = forwarded_for(headers) {
        return ip.to_string();
    }
    if let Some(ip) = real_ip(headers) {
        return ip.to_string();
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(parse_ip)
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_ip)
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}
