//! Blocking TCP client
//!
//! Used by the CLI and the network tests.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ClinicError, Result};
use crate::protocol::{read_response, write_request, Reply, Request};

/// One connection to a ClinicQ server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| ClinicError::Network(format!("connect failed: {}", e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Apply the same read and write timeout
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        self.writer.get_ref().set_write_timeout(Some(timeout))?;
        Ok(())
    }

    /// Send one request and wait for its reply
    ///
    /// Error statuses come back as the matching `ClinicError` variant.
    pub fn call(&mut self, request: &Request) -> Result<Reply> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)?.into_result()
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        match self.call(&Request::Ping)? {
            Reply::Pong => Ok(()),
            other => Err(ClinicError::Protocol(format!("unexpected reply to ping: {:?}", other))),
        }
    }
}
