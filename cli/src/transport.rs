//! Sends requests to the server, one connection per request.

#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{anyhow, bail, Context, Result};

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use rfm::config::RESPONSE_HEADER_LEN;
use rfm::Request;

/// Carries a serialized request and returns the complete response frame
pub trait Exchange {
    fn exchange(&mut self, req: &Request) -> Result<Vec<u8>>;
}

/// Blocking TCP transport.
///
/// Connecting, reading and writing each fail after `timeout`.
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last = None;
        let addrs = (host, port).to_socket_addrs()
            .with_context(|| format!("Resolving {host}"))?;
        for a in addrs {
            match TcpStream::connect_timeout(&a, self.timeout) {
                Ok(s) => return Ok(s),
                Err(e) => {
                    debug!("connect {a} failed: {e}");
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) => Err(e).with_context(|| format!("Connecting to {host}:{port}")),
            None => Err(anyhow!("No addresses for {host}")),
        }
    }
}

impl Exchange for TcpTransport {
    fn exchange(&mut self, req: &Request) -> Result<Vec<u8>> {
        let out = req.to_bytes()?;
        let (host, port) = req.socket();
        let mut stream = self.connect(host, port)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        stream.write_all(&out).context("Sending request")?;
        stream.flush()?;
        trace!("sent {} bytes", out.len());

        read_frame(&mut stream)
    }
}

/// Reads exactly one response frame from `r`
pub fn read_frame<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; RESPONSE_HEADER_LEN];
    r.read_exact(&mut buf).context("Reading response header")?;
    let total = rfm::expected_len(&buf)?;
    // grows with what arrives, not with what the header claims
    let rest = (total - RESPONSE_HEADER_LEN) as u64;
    r.by_ref().take(rest).read_to_end(&mut buf).context("Reading response")?;
    if buf.len() != total {
        bail!("Response truncated, {} of {total} bytes", buf.len());
    }
    trace!("received {total} bytes");
    Ok(buf)
}
