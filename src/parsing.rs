use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::types::{Amount, ClusterUrl};

// Binary and decimal multipliers share a lookup; an unlisted suffix means the
// quantity is passed through untouched.
const MEMORY_UNITS: &[(&str, u64)] = &[
    ("Ki", 1 << 10),
    ("K", 1_000),
    ("Mi", 1 << 20),
    ("M", 1_000_000),
    ("Gi", 1 << 30),
    ("G", 1_000_000_000),
    ("Ti", 1 << 40),
    ("T", 1_000_000_000_000),
];

/// Parse a CPU quantity into cores. `500m` is half a core, `2` two cores.
/// Absent or empty values count as zero.
pub fn parse_cpu(value: Option<&str>) -> Amount {
    let q = match value.map(str::trim) {
        None | Some("") => return Amount::Cores(0.0),
        Some(q) => q,
    };

    let cores = if let Some(stripped) = q.strip_suffix('m') {
        stripped.parse::<f64>().ok().map(|mc| mc / 1000.0)
    } else if let Some(stripped) = q.strip_suffix('u') {
        stripped.parse::<f64>().ok().map(|us| us / 1_000_000.0)
    } else if let Some(stripped) = q.strip_suffix('n') {
        stripped.parse::<f64>().ok().map(|ns| ns / 1_000_000_000.0)
    } else {
        q.parse::<f64>().ok()
    };

    match cores {
        Some(c) if c.is_finite() => Amount::Cores(c),
        _ => Amount::Raw(q.to_string()),
    }
}

/// Parse a memory quantity (`<integer><unit?>`) into bytes. Values that do
/// not fit in a `u64` are passed through raw.
pub fn parse_memory(value: Option<&str>) -> Amount {
    let q = match value.map(str::trim) {
        None | Some("") => return Amount::Bytes(0),
        Some(q) => q,
    };

    let split = q.find(|c: char| !c.is_ascii_digit()).unwrap_or(q.len());
    let (digits, unit) = q.split_at(split);
    let Ok(n) = digits.parse::<u64>() else {
        return Amount::Raw(q.to_string());
    };
    if unit.is_empty() {
        return Amount::Bytes(n);
    }

    MEMORY_UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .and_then(|(_, factor)| n.checked_mul(*factor))
        .map(Amount::Bytes)
        .unwrap_or_else(|| Amount::Raw(q.to_string()))
}

/// Split the API base URL into scheme, host and port. Both the scheme and an
/// explicit port are mandatory.
pub fn parse_api_url(url: &str) -> Result<ClusterUrl> {
    let malformed = || Error::MalformedUrl { url: url.to_string() };

    let uri: http::Uri = url.trim().parse().map_err(|_| malformed())?;
    let scheme = match uri.scheme_str() {
        Some(s @ ("http" | "https")) => s.to_string(),
        _ => return Err(malformed()),
    };
    let host = uri
        .host()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .ok_or_else(malformed)?
        .to_string();
    let port = uri.port_u16().ok_or_else(malformed)?;

    Ok(ClusterUrl {
        scheme,
        host,
        port,
        base: url.trim().trim_end_matches('/').to_string(),
    })
}

/// Bracket IPv6 literals so they can be followed by `:port`. IPv4 addresses
/// and DNS names are returned unchanged.
pub fn format_host(host: &str) -> String {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<Ipv4Addr>().is_ok() || !bare.contains(':') {
        bare.to_string()
    } else {
        format!("[{}]", bare)
    }
}

pub fn scrape_url(scheme: &str, host: &str, port: impl std::fmt::Display) -> String {
    format!("{}://{}:{}", scheme, format_host(host), port)
}
