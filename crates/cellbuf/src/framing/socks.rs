//! SOCKS4/4a/5 request framing.
//!
//! A connection's SOCKS handshake is tracked by a small [`Parser`] state
//! machine (method negotiation, then the request itself for v5; v4/4a has
//! no negotiation phase). The per-phase parsing is also exposed as free
//! functions so a caller that already knows its phase — or a test vector
//! that starts mid-handshake — can parse directly.

use crate::framing::Outcome;
use crate::ring::CellBuf;
use relay_error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr};

/// A parsed SOCKS proxy command. `ConnectDir` and the two resolve
/// commands are Tor extensions beyond the base SOCKS4/5 command sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    ConnectDir,
    Resolve,
    ResolvePtr,
}

const CMD_CONNECT: u8 = 0x01;
const CMD_CONNECT_DIR: u8 = 0x02;
const CMD_RESOLVE: u8 = 0xF0;
const CMD_RESOLVE_PTR: u8 = 0xF1;

fn command_from_byte(b: u8) -> Result<Command> {
    match b {
        CMD_CONNECT => Ok(Command::Connect),
        CMD_CONNECT_DIR => Ok(Command::ConnectDir),
        CMD_RESOLVE => Ok(Command::Resolve),
        CMD_RESOLVE_PTR => Ok(Command::ResolvePtr),
        _ => Err(Error::Protocol("unsupported SOCKS command")),
    }
}

/// A request destination: either an address the client already resolved,
/// or a hostname for the proxy to resolve itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ip(IpAddr),
    Fqdn(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksRequest {
    pub version: u8,
    pub command: Command,
    pub address: Address,
    pub port: u16,
    /// Set when the request arrived as a SOCKS4a hostname extension
    /// rather than plain SOCKS4 or SOCKS5.
    pub socks4a: bool,
}

/// A canned response telling an HTTP client that this port does not speak
/// HTTP, sent when the leading byte looks like an HTTP method.
pub const NOT_HTTP_PROXY_REPLY: &[u8] =
    b"HTTP/1.0 501 Tor is not an HTTP Proxy\r\nContent-Type: text/plain\r\n\r\nThis is a SOCKS proxy, not an HTTP proxy.\n";

/// One step of a SOCKS handshake: a reply the caller must write back, a
/// fully parsed request, or the canned not-an-HTTP-proxy bounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    MethodReply(Vec<u8>),
    Request(SocksRequest),
    NotHttpProxy(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingMethods,
    AwaitingRequest,
}

/// Per-connection SOCKS parsing state.
#[derive(Debug, Clone)]
pub struct Parser {
    stage: Stage,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            stage: Stage::AwaitingMethods,
        }
    }

    /// Advance the handshake by one step. `safe_socks` rejects requests
    /// that hand the proxy an address the client already resolved
    /// locally rather than a hostname.
    pub fn step(&mut self, buf: &mut CellBuf, safe_socks: bool) -> Result<Outcome<Step>> {
        let data = buf.peek_all();
        let Some(&first) = data.first() else {
            return Ok(Outcome::Incomplete);
        };

        match first {
            0x05 if self.stage == Stage::AwaitingMethods => {
                match parse_socks5_methods(buf)? {
                    Outcome::Complete(reply) => {
                        self.stage = Stage::AwaitingRequest;
                        Ok(Outcome::Complete(Step::MethodReply(reply)))
                    }
                    Outcome::Incomplete => Ok(Outcome::Incomplete),
                    Outcome::TooLarge => Ok(Outcome::TooLarge),
                }
            }
            0x05 => match parse_socks5_request(buf)? {
                Outcome::Complete(req) => finish_request(req, safe_socks),
                Outcome::Incomplete => Ok(Outcome::Incomplete),
                Outcome::TooLarge => Ok(Outcome::TooLarge),
            },
            0x04 => match parse_socks4_request(buf)? {
                Outcome::Complete(req) => finish_request(req, safe_socks),
                Outcome::Incomplete => Ok(Outcome::Incomplete),
                Outcome::TooLarge => Ok(Outcome::TooLarge),
            },
            b'G' | b'H' | b'P' | b'C' => {
                buf.clear();
                Ok(Outcome::Complete(Step::NotHttpProxy(NOT_HTTP_PROXY_REPLY.to_vec())))
            }
            _ => Err(Error::Protocol("unrecognized SOCKS version byte")),
        }
    }
}

fn finish_request(req: SocksRequest, safe_socks: bool) -> Result<Outcome<Step>> {
    if safe_socks && matches!(req.address, Address::Ip(_)) {
        return Err(Error::Protocol(
            "safe socks forbids a client-resolved literal address",
        ));
    }
    Ok(Outcome::Complete(Step::Request(req)))
}

/// Parse a SOCKS5 method-selection request (`VER NMETHODS METHODS...`),
/// requiring "no authentication" (0x00) among the offered methods.
/// Returns the two-byte method-selection reply to send back.
pub fn parse_socks5_methods(buf: &mut CellBuf) -> Result<Outcome<Vec<u8>>> {
    let data = buf.peek_all();
    if data.len() < 2 {
        return Ok(Outcome::Incomplete);
    }
    let nmethods = data[1] as usize;
    let total = 2 + nmethods;
    if data.len() < total {
        return Ok(Outcome::Incomplete);
    }
    let methods = &data[2..total];
    if !methods.contains(&0x00) {
        return Err(Error::Protocol("client offered no acceptable SOCKS5 auth method"));
    }
    buf.drop_front(total);
    Ok(Outcome::Complete(vec![0x05, 0x00]))
}

/// Parse a SOCKS5 request (`VER CMD RSV ATYP ...`) assuming method
/// negotiation already completed.
pub fn parse_socks5_request(buf: &mut CellBuf) -> Result<Outcome<SocksRequest>> {
    let data = buf.peek_all();
    if data.len() < 4 {
        return Ok(Outcome::Incomplete);
    }
    let version = data[0];
    let command = command_from_byte(data[1])?;
    let atyp = data[3];

    match atyp {
        0x01 => {
            let total = 4 + 4 + 2;
            if data.len() < total {
                return Ok(Outcome::Incomplete);
            }
            let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
            let port = u16::from_be_bytes([data[8], data[9]]);
            buf.drop_front(total);
            Ok(Outcome::Complete(SocksRequest {
                version,
                command,
                address: Address::Ip(IpAddr::V4(ip)),
                port,
                socks4a: false,
            }))
        }
        0x03 => {
            if data.len() < 5 {
                return Ok(Outcome::Incomplete);
            }
            let host_len = data[4] as usize;
            let total = 5 + host_len + 2;
            if data.len() < total {
                return Ok(Outcome::Incomplete);
            }
            let host = String::from_utf8_lossy(&data[5..5 + host_len]).into_owned();
            let port = u16::from_be_bytes([data[total - 2], data[total - 1]]);
            buf.drop_front(total);
            Ok(Outcome::Complete(SocksRequest {
                version,
                command,
                address: Address::Fqdn(host),
                port,
                socks4a: false,
            }))
        }
        _ => Err(Error::Protocol("unsupported SOCKS5 address type")),
    }
}

/// Parse a SOCKS4 or SOCKS4a request. A destination IP of `0.0.0.x`
/// (`x != 0`) signals SOCKS4a: the client wants the proxy to resolve a
/// hostname that follows the (NUL-terminated) userid field.
pub fn parse_socks4_request(buf: &mut CellBuf) -> Result<Outcome<SocksRequest>> {
    let data = buf.peek_all();
    if data.len() < 8 {
        return Ok(Outcome::Incomplete);
    }
    let version = data[0];
    let command = command_from_byte(data[1])?;
    let port = u16::from_be_bytes([data[2], data[3]]);
    let ip_bytes = [data[4], data[5], data[6], data[7]];

    let Some(userid_nul) = data[8..].iter().position(|&b| b == 0).map(|i| i + 8) else {
        return Ok(Outcome::Incomplete);
    };

    let is_socks4a = ip_bytes[0] == 0 && ip_bytes[1] == 0 && ip_bytes[2] == 0 && ip_bytes[3] != 0;

    if !is_socks4a {
        buf.drop_front(userid_nul + 1);
        return Ok(Outcome::Complete(SocksRequest {
            version,
            command,
            address: Address::Ip(IpAddr::V4(Ipv4Addr::from(ip_bytes))),
            port,
            socks4a: false,
        }));
    }

    let host_start = userid_nul + 1;
    let Some(host_nul) = data[host_start..].iter().position(|&b| b == 0).map(|i| i + host_start) else {
        return Ok(Outcome::Incomplete);
    };
    let host = String::from_utf8_lossy(&data[host_start..host_nul]).into_owned();
    buf.drop_front(host_nul + 1);
    Ok(Outcome::Complete(SocksRequest {
        version,
        command,
        address: Address::Fqdn(host),
        port,
        socks4a: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_fqdn_request() {
        let mut buf = CellBuf::new();
        // VER CMD RSV ATYP LEN "example.com" PORT(80)
        let mut bytes = vec![0x05, 0x01, 0x00, 0x03, 0x0B];
        bytes.extend_from_slice(b"example.com");
        bytes.extend_from_slice(&[0x00, 0x50]);
        buf.write(&bytes).unwrap();

        let out = parse_socks5_request(&mut buf).unwrap();
        match out {
            Outcome::Complete(req) => {
                assert_eq!(req.address, Address::Fqdn("example.com".to_string()));
                assert_eq!(req.port, 80);
                assert_eq!(req.command, Command::Connect);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_socks4a_request() {
        let mut buf = CellBuf::new();
        // VER CD PORT(80) IP(0.0.0.1) userid NUL host NUL
        let mut bytes = vec![0x04, 0x01, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00];
        bytes.extend_from_slice(b"host\0");
        buf.write(&bytes).unwrap();

        let out = parse_socks4_request(&mut buf).unwrap();
        match out {
            Outcome::Complete(req) => {
                assert_eq!(req.address, Address::Fqdn("host".to_string()));
                assert_eq!(req.port, 80);
                assert!(req.socks4a);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_socks4_plain_ip_request() {
        let mut buf = CellBuf::new();
        let bytes = vec![0x04, 0x01, 0x00, 0x50, 127, 0, 0, 1, 0x00];
        buf.write(&bytes).unwrap();
        let out = parse_socks4_request(&mut buf).unwrap();
        match out {
            Outcome::Complete(req) => {
                assert_eq!(req.address, Address::Ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
                assert!(!req.socks4a);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_method_negotiation_requires_no_auth() {
        let mut buf = CellBuf::new();
        buf.write(&[0x05, 0x01, 0x02]).unwrap(); // only offers method 0x02
        let err = parse_socks5_methods(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_full_handshake_via_parser() {
        let mut buf = CellBuf::new();
        buf.write(&[0x05, 0x01, 0x00]).unwrap();
        let mut parser = Parser::new();
        let step = parser.step(&mut buf, false).unwrap();
        assert_eq!(step, Outcome::Complete(Step::MethodReply(vec![0x05, 0x00])));

        let mut bytes = vec![0x05, 0x01, 0x00, 0x03, 0x03];
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0x01, 0xBB]);
        buf.write(&bytes).unwrap();
        let step = parser.step(&mut buf, false).unwrap();
        match step {
            Outcome::Complete(Step::Request(req)) => {
                assert_eq!(req.address, Address::Fqdn("abc".to_string()));
                assert_eq!(req.port, 443);
            }
            other => panic!("expected a completed request, got {other:?}"),
        }
    }

    #[test]
    fn test_safe_socks_rejects_literal_ip() {
        let mut buf = CellBuf::new();
        let bytes = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50];
        buf.write(&bytes).unwrap();
        let mut parser = Parser::new();
        parser.stage = Stage::AwaitingRequest;
        let err = parser.step(&mut buf, true).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_http_probe_gets_canned_reply() {
        let mut buf = CellBuf::new();
        buf.write(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let mut parser = Parser::new();
        let step = parser.step(&mut buf, false).unwrap();
        assert_eq!(step, Outcome::Complete(Step::NotHttpProxy(NOT_HTTP_PROXY_REPLY.to_vec())));
    }
}
