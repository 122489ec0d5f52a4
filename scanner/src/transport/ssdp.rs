use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::config::Configuration;
use crate::error::{Result, ScanError};

/// Largest datagram read per receive; longer replies are truncated
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// One reply exactly as it came off the socket
pub type RawResponse = Vec<u8>;

/// Render the M-SEARCH request for a configuration.
///
/// Six CRLF-terminated lines followed by an empty line.
pub fn build_msearch_request(config: &Configuration) -> String {
  format!(
    "M-SEARCH * HTTP/1.1\r\n\
      HOST: {}\r\n\
      MAN: \"ssdp:discover\"\r\n\
      MX: {}\r\n\
      ST: {}\r\n\
      USER-AGENT: {}\r\n\
      \r\n",
    SocketAddr::new(config.host(), config.port()),
    config.delay_response(),
    config.search_type(),
    config.user_agent()
  )
}

/// The socket operations discovery needs, so the receive loop can run
/// against a scripted socket in tests.
pub trait DatagramSocket {
  fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
  fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
  fn set_broadcast(&mut self, broadcast: bool) -> io::Result<()>;
  fn set_read_timeout(&mut self, dur: Option<Duration>) -> io::Result<()>;
}

impl DatagramSocket for UdpSocket {
  fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
    UdpSocket::send_to(self, buf, addr)
  }

  fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    UdpSocket::recv_from(self, buf)
  }

  fn set_broadcast(&mut self, broadcast: bool) -> io::Result<()> {
    UdpSocket::set_broadcast(self, broadcast)
  }

  fn set_read_timeout(&mut self, dur: Option<Duration>) -> io::Result<()> {
    UdpSocket::set_read_timeout(self, dur)
  }
}

/// Send `request` to `target` and gather every reply that arrives before
/// `timeout` has elapsed.
///
/// Running out of time is the normal way out of the loop, so no replies at
/// all is an empty `Vec`, not an error. Receive errors other than the
/// timeout are logged and skipped. Only failing to configure the socket or
/// to send the request aborts the call.
pub fn collect_responses<S: DatagramSocket>(
  socket: &mut S,
  request: &str,
  target: SocketAddr,
  timeout: Duration,
) -> Result<Vec<RawResponse>> {
  socket
    .set_broadcast(true)
    .map_err(ScanError::transport("enable broadcast"))?;

  socket
    .send_to(request.as_bytes(), target)
    .map_err(ScanError::transport("send M-SEARCH"))?;
  info!("M-SEARCH sent to {}", target);
  trace!("M-SEARCH payload:\n{}", request);

  // A timeout too large for `Instant` means the window never closes on its own
  let deadline = Instant::now().checked_add(timeout);
  let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
  let mut responses = Vec::new();

  loop {
    let remaining = match deadline {
      Some(deadline) => {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
          break;
        }
        Some(remaining)
      }
      None => None,
    };

    socket
      .set_read_timeout(remaining)
      .map_err(ScanError::transport("set receive timeout"))?;

    match socket.recv_from(&mut buffer) {
      Ok((0, from)) => {
        trace!("Ignoring empty datagram from {}", from);
      }
      Ok((size, from)) => {
        trace!("Received {} bytes from {}", size, from);
        responses.push(buffer[..size].to_vec());
      }
      Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
        break;
      }
      Err(e) => {
        debug!("Error receiving SSDP response, continuing: {}", e);
      }
    }
  }

  info!("Collected {} SSDP responses", responses.len());
  Ok(responses)
}

/// UDP side of discovery: one fresh socket per call
#[derive(Debug, Clone)]
pub struct MulticastTransport {
  target: SocketAddr,
  timeout: Duration,
}

impl MulticastTransport {
  pub fn new(config: &Configuration) -> Self {
    Self {
      target: SocketAddr::new(config.host(), config.port()),
      timeout: config.timeout(),
    }
  }

  pub fn target(&self) -> SocketAddr {
    self.target
  }

  /// Send `request` and return the replies received before the timeout.
  /// The socket is dropped on every return path.
  pub fn collect(&self, request: &str) -> Result<Vec<RawResponse>> {
    let bind_addr = match self.target.ip() {
      IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
      IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };

    let mut socket = UdpSocket::bind(bind_addr).map_err(ScanError::transport("bind UDP socket"))?;

    if self.target.is_ipv4() {
      socket
        .set_multicast_loop_v4(true)
        .map_err(ScanError::transport("enable multicast loopback"))?;
    }

    collect_responses(&mut socket, request, self.target, self.timeout)
  }
}
