use std::fmt;

use anyhow::{anyhow, Context, Result};

/// Port used when an endpoint omits one.
pub const DEFAULT_PORT: u16 = 5555;

/// Transport endpoint, written `tcp://host:port`, `host:port`, or `host`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// `host:port` suitable for `TcpStream::connect` / `TcpListener::bind`.
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}", self.socket_addr())
    }
}

pub fn parse_endpoint(addr: &str, default_port: u16) -> Result<Endpoint> {
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        if scheme != "tcp" {
            return Err(anyhow!("unsupported transport scheme: {}", scheme));
        }
        remainder = rest;
    }
    if remainder.is_empty() {
        return Err(anyhow!("missing host in endpoint {:?}", addr));
    }

    let (host, port) = split_host_port(remainder, default_port)?;
    if host.is_empty() {
        return Err(anyhow!("missing host in endpoint {:?}", addr));
    }
    Ok(Endpoint { host, port })
}

fn split_host_port(addr: &str, default_port: u16) -> Result<(String, u16)> {
    // IPv6 in brackets: [::1]:5555
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid endpoint address: {}", addr))?;
        let port = match rest.strip_prefix(':') {
            Some(port) => port
                .parse()
                .with_context(|| format!("invalid port in {}", addr))?,
            None if rest.is_empty() => default_port,
            None => return Err(anyhow!("invalid endpoint address: {}", addr)),
        };
        return Ok((host.to_string(), port));
    }

    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in {}", addr))?;
            Ok((host.to_string(), port))
        }
        None => Ok((addr.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_and_port() {
        let ep = parse_endpoint("tcp://192.168.1.20:6000", DEFAULT_PORT).unwrap();
        assert_eq!(ep.host, "192.168.1.20");
        assert_eq!(ep.port, 6000);
        assert_eq!(ep.to_string(), "tcp://192.168.1.20:6000");
    }

    #[test]
    fn bare_host_gets_default_port() {
        let ep = parse_endpoint("127.0.0.1", DEFAULT_PORT).unwrap();
        assert_eq!(ep.socket_addr(), "127.0.0.1:5555");
    }

    #[test]
    fn ipv6_brackets() {
        let ep = parse_endpoint("tcp://[::1]:7000", DEFAULT_PORT).unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.socket_addr(), "[::1]:7000");
        let ep = parse_endpoint("[::1]", DEFAULT_PORT).unwrap();
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn rejects_other_schemes_and_bad_ports() {
        assert!(parse_endpoint("udp://host:1", DEFAULT_PORT).is_err());
        assert!(parse_endpoint("host:notaport", DEFAULT_PORT).is_err());
        assert!(parse_endpoint("tcp://", DEFAULT_PORT).is_err());
        assert!(parse_endpoint(":5555", DEFAULT_PORT).is_err());
    }
}
