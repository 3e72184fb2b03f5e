// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spooler endpoints and the local/remote split that selects timeouts,
// connection permits, and circuit breaker.

use std::fmt;
use std::net::IpAddr;

use hyper::Uri;

use pressgang_core::error::ConnectionError;

/// Default IPP port (RFC 8010 §8.1).
pub const IPP_DEFAULT_PORT: u16 = 631;

/// Which route a request travels: the spooler on this host or any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Local,
    Remote,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spooler URI resolved to the HTTP target it is reached through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
    target: Uri,
    class: EndpointClass,
}

impl Endpoint {
    /// Parse an `ipp://` or `http://` URI for an explicitly chosen route.
    ///
    /// `ipp://` maps to `http://` on port 631 unless a port is given.
    /// `ipps://` and `https://` are rejected.
    pub fn new(uri: &str, class: EndpointClass) -> Result<Self, ConnectionError> {
        let invalid = |reason: &str| ConnectionError::InvalidEndpoint(format!("{uri}: {reason}"));

        let parsed = uri.parse::<Uri>().map_err(|e| invalid(&e.to_string()))?;
        let scheme = parsed.scheme_str().ok_or_else(|| invalid("missing scheme"))?;
        let default_port = match scheme.to_ascii_lowercase().as_str() {
            "ipp" => IPP_DEFAULT_PORT,
            "http" => 80,
            "ipps" | "https" => return Err(invalid("TLS endpoints are not supported")),
            _ => return Err(invalid("scheme must be ipp or http")),
        };
        let host = parsed.host().ok_or_else(|| invalid("missing host"))?;
        let port = parsed.port_u16().unwrap_or(default_port);
        let path = parsed
            .path_and_query()
            .map(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or("/");

        let target = format!("http://{host}:{port}{path}")
            .parse::<Uri>()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            uri: uri.to_string(),
            target,
            class,
        })
    }

    pub fn local(uri: &str) -> Result<Self, ConnectionError> {
        Self::new(uri, EndpointClass::Local)
    }

    pub fn remote(uri: &str) -> Result<Self, ConnectionError> {
        Self::new(uri, EndpointClass::Remote)
    }

    /// Choose the route from the host: loopback addresses and `localhost`
    /// are local, everything else is remote.
    pub fn classify(uri: &str) -> Result<Self, ConnectionError> {
        let mut endpoint = Self::new(uri, EndpointClass::Remote)?;
        if endpoint.target.host().is_some_and(is_loopback_host) {
            endpoint.class = EndpointClass::Local;
        }
        Ok(endpoint)
    }

    /// The URI as given by the caller.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The `http://` URI actually requested.
    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn class(&self) -> EndpointClass {
        self.class
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

fn is_loopback_host(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.eq_ignore_ascii_case("localhost")
        || bare.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipp_maps_to_http_on_631() {
        let endpoint = Endpoint::remote("ipp://printer.example.com/printers/office").unwrap();
        assert_eq!(
            endpoint.target().to_string(),
            "http://printer.example.com:631/printers/office"
        );
        assert_eq!(endpoint.uri(), "ipp://printer.example.com/printers/office");
    }

    #[test]
    fn explicit_port_is_kept() {
        let endpoint = Endpoint::local("ipp://localhost:8631/ipp/print").unwrap();
        assert_eq!(endpoint.target().port_u16(), Some(8631));
    }

    #[test]
    fn tls_and_unknown_schemes_are_rejected() {
        assert!(matches!(
            Endpoint::remote("ipps://printer/ipp/print"),
            Err(ConnectionError::InvalidEndpoint(_))
        ));
        assert!(Endpoint::remote("lpd://printer/queue").is_err());
        assert!(Endpoint::remote("not a uri").is_err());
    }

    #[test]
    fn classify_by_host() {
        assert_eq!(Endpoint::classify("ipp://localhost/printers/a").unwrap().class(), EndpointClass::Local);
        assert_eq!(Endpoint::classify("ipp://127.0.0.1:631/").unwrap().class(), EndpointClass::Local);
        assert_eq!(Endpoint::classify("ipp://[::1]/").unwrap().class(), EndpointClass::Local);
        assert_eq!(Endpoint::classify("ipp://10.0.0.7/").unwrap().class(), EndpointClass::Remote);
    }
}
