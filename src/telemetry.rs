// src/telemetry.rs - Location telemetry over a lazily connected stream
use crate::locate::Location;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("write failed, connection dropped: {0}")]
    Write(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Opens the outgoing stream. Separated from `Telemetry` so the state
/// machine can be driven without a network.
pub trait Connector {
    type Stream: Write;

    fn connect(&mut self) -> io::Result<Self::Stream>;

    fn endpoint(&self) -> String;
}

/// Plain TCP to a fixed host and port. The host is resolved on the first
/// successful lookup and the address reused for every later connect.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
    addr: Option<SocketAddr>,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let host = host.into();
        // Literal IPs need no lookup at all.
        let addr = host.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port));
        Self {
            host,
            port,
            timeout,
            addr,
        }
    }

    fn resolve(&mut self) -> io::Result<SocketAddr> {
        if let Some(addr) = self.addr {
            return Ok(addr);
        }
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"))?;
        debug!(host = %self.host, %addr, "telemetry host resolved");
        self.addr = Some(addr);
        Ok(addr)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let addr = self.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_nodelay(true)?;
        // Bound a stalled write so it cannot hold up the frame loop for long.
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Two-state sender: connect on demand, one attempt per send, write once,
/// never retry.
pub struct Telemetry<C: Connector = TcpConnector> {
    connector: C,
    stream: Option<C::Stream>,
}

impl<C: Connector> Telemetry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            stream: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn connect(&mut self) -> Result<ConnectionState, TelemetryError> {
        match self.connector.connect() {
            Ok(stream) => {
                info!(endpoint = %self.connector.endpoint(), "telemetry connected");
                self.stream = Some(stream);
                Ok(ConnectionState::Connected)
            }
            Err(source) => {
                self.stream = None;
                Err(TelemetryError::Connect {
                    endpoint: self.connector.endpoint(),
                    source,
                })
            }
        }
    }

    /// Sends `text` as raw ASCII bytes. Returns the number of bytes written.
    pub fn send(&mut self, text: &str) -> Result<usize, TelemetryError> {
        if self.stream.is_none() {
            if let Err(e) = self.connect() {
                warn!("telemetry connection failure: {e}");
                return Err(e);
            }
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        match stream.write(text.as_bytes()) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!("telemetry write failed, disconnecting: {e}");
                self.stream = None;
                Err(TelemetryError::Write(e))
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            info!("telemetry disconnected");
        }
    }
}

/// `depth:offset;` per relative location and `x:y:z;` per absolute one,
/// every value with two decimals and no other separators.
pub fn serialize_locations(locations: &[Location]) -> String {
    let mut out = String::with_capacity(locations.len() * 12);
    for location in locations {
        // Writing into a String cannot fail.
        let _ = match location {
            Location::Relative { depth, offset } => write!(out, "{depth:.2}:{offset:.2};"),
            Location::Absolute(p) => write!(out, "{:.2}:{:.2}:{:.2};", p.x, p.y, p.z),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn serializes_with_two_decimals() {
        let locations = [Location::relative(1.234, -0.5), Location::relative(2.0, 3.456)];
        assert_eq!(serialize_locations(&locations), "1.23:-0.50;2.00:3.46;");
    }

    #[test]
    fn serializes_absolute_and_empty() {
        assert_eq!(serialize_locations(&[]), "");
        assert_eq!(serialize_locations(&[Location::absolute(1.0, -2.5, 0.126)]), "1.00:-2.50:0.13;");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedConnector {
        refuse: bool,
        attempts: usize,
    }

    impl Connector for ScriptedConnector {
        type Stream = FailingWriter;

        fn connect(&mut self) -> io::Result<FailingWriter> {
            self.attempts += 1;
            if self.refuse {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            } else {
                Ok(FailingWriter)
            }
        }

        fn endpoint(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn failed_write_drops_to_disconnected() {
        let mut telemetry = Telemetry::new(ScriptedConnector::default());
        assert_eq!(telemetry.connect().unwrap(), ConnectionState::Connected);

        let err = telemetry.send("1.00:2.00;").unwrap_err();
        assert!(matches!(err, TelemetryError::Write(_)));
        assert_eq!(telemetry.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn one_connection_attempt_per_send() {
        let mut telemetry = Telemetry::new(ScriptedConnector {
            refuse: true,
            attempts: 0,
        });
        for _ in 0..3 {
            assert!(matches!(telemetry.send("x"), Err(TelemetryError::Connect { .. })));
        }
        assert_eq!(telemetry.connector.attempts, 3);
        assert_eq!(telemetry.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn sends_bytes_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut telemetry = Telemetry::new(TcpConnector::new("127.0.0.1", port, Duration::from_secs(1)));

        let line = serialize_locations(&[Location::relative(3.2, -14.0)]);
        assert_eq!(telemetry.send(&line).unwrap(), line.len());
        assert_eq!(telemetry.state(), ConnectionState::Connected);

        let (mut peer, _) = listener.accept().unwrap();
        telemetry.disconnect();
        let mut received = String::new();
        peer.read_to_string(&mut received).unwrap();
        assert_eq!(received, "3.20:-14.00;");
    }

    #[test]
    fn host_is_resolved_once_and_cached() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let literal = TcpConnector::new("127.0.0.1", addr.port(), Duration::from_secs(1));
        assert_eq!(literal.addr, Some(addr));

        let mut named = TcpConnector::new("localhost", addr.port(), Duration::from_secs(1));
        assert_eq!(named.addr, None);
        let first = named.resolve().unwrap();
        assert_eq!(named.addr, Some(first));
        // A changed host name is not looked up again once an address is cached.
        named.host = "unresolvable.invalid".to_string();
        assert_eq!(named.resolve().unwrap(), first);
    }

    #[test]
    fn refused_connection_is_reported_not_fatal() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut telemetry = Telemetry::new(TcpConnector::new("127.0.0.1", port, Duration::from_millis(200)));
        assert!(matches!(telemetry.send("1.00:1.00;"), Err(TelemetryError::Connect { .. })));
        assert_eq!(telemetry.state(), ConnectionState::Disconnected);
    }
}
