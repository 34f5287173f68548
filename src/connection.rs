//! Transport connection: TCP plus an optional TLS session.
//!
//! The socket stays blocking with bounded read/write timeouts; the TLS
//! session is driven manually through rustls's non-blocking API
//! (`read_tls` / `process_new_packets` / `write_tls`), so every suspension
//! in the worker is bounded by the per-read timeout.

use std::io::{self, Read as _, Write as _};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::ClientConnection;

use crate::client::Flags;
use crate::error::HttpError;
use crate::tls;
use crate::url::ParsedUrl;

/// Per-read socket timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a single [`Connection::read`] call.
pub(crate) enum ReadEvent {
    /// Bytes were written into the caller's buffer.
    Data(usize),
    /// The peer finished sending (close-notify or EOF); the parser decides
    /// whether the response is complete.
    Closed,
}

pub(crate) struct Connection {
    stream: TcpStream,
    tls: Option<Box<ClientConnection>>,
}

impl Connection {
    /// Resolve and connect to the URL's host, then complete the TLS
    /// handshake when the scheme requires it. SNI is set to the URL host.
    pub fn connect(
        url: &ParsedUrl,
        flags: Flags,
        ca_file: Option<&Path>,
    ) -> Result<Self, HttpError> {
        let stream =
            TcpStream::connect((url.host.as_str(), url.port)).map_err(HttpError::Connect)?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .map_err(HttpError::Connect)?;
        stream
            .set_write_timeout(Some(IO_TIMEOUT))
            .map_err(HttpError::Connect)?;
        stream.set_nodelay(true).map_err(HttpError::Connect)?;

        let tls = if url.https {
            let config = tls::client_config(flags, ca_file)?;
            let name = ServerName::try_from(url.host.clone())
                .map_err(|_| HttpError::InvalidServerName(url.host.clone()))?;
            Some(Box::new(ClientConnection::new(config, name)?))
        } else {
            None
        };

        let mut conn = Connection { stream, tls };
        conn.handshake()?;
        Ok(conn)
    }

    /// Drive the TLS handshake to completion: flush pending ciphertext,
    /// feed received ciphertext, repeat until the session is established.
    /// Certificate verification failures surface here from
    /// `process_new_packets`.
    fn handshake(&mut self) -> Result<(), HttpError> {
        let Some(tls) = self.tls.as_deref_mut() else {
            return Ok(());
        };

        loop {
            while tls.wants_write() {
                tls.write_tls(&mut self.stream).map_err(HttpError::Connect)?;
            }
            if !tls.is_handshaking() {
                return Ok(());
            }

            let n = tls.read_tls(&mut self.stream).map_err(HttpError::Connect)?;
            if n == 0 {
                return Err(HttpError::ConnectionClosed);
            }
            if let Err(err) = tls.process_new_packets() {
                // Flush the pending alert so the peer learns why the
                // session died.
                let _ = tls.write_tls(&mut self.stream);
                return Err(HttpError::Tls(err));
            }
        }
    }

    /// Write the full request, plaintext or through the TLS session.
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), HttpError> {
        match self.tls.as_deref_mut() {
            Some(tls) => {
                tls.writer().write_all(data).map_err(HttpError::Write)?;
                while tls.wants_write() {
                    tls.write_tls(&mut self.stream).map_err(HttpError::Write)?;
                }
                Ok(())
            }
            None => self.stream.write_all(data).map_err(HttpError::Write),
        }
    }

    /// Read once into `buf`, blocking up to the per-read timeout.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<ReadEvent, HttpError> {
        let Some(tls) = self.tls.as_deref_mut() else {
            return match self.stream.read(buf) {
                Ok(0) => Ok(ReadEvent::Closed),
                Ok(n) => Ok(ReadEvent::Data(n)),
                Err(err) => Err(HttpError::Read(err)),
            };
        };

        loop {
            match tls.reader().read(buf) {
                // Clean end of stream: peer sent close-notify and all
                // plaintext has been drained.
                Ok(0) => return Ok(ReadEvent::Closed),
                Ok(n) => return Ok(ReadEvent::Data(n)),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    // No plaintext buffered; pull more ciphertext.
                    let n = tls.read_tls(&mut self.stream).map_err(HttpError::Read)?;
                    if n == 0 {
                        // EOF without close-notify. Accept it and let the
                        // parser decide whether the response is complete.
                        return Ok(ReadEvent::Closed);
                    }
                    if let Err(err) = tls.process_new_packets() {
                        let _ = tls.write_tls(&mut self.stream);
                        return Err(HttpError::Tls(err));
                    }
                }
                Err(err) => return Err(HttpError::Read(err)),
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Runs on every exit path, success and failure alike.
        if let Some(tls) = self.tls.as_deref_mut() {
            tls.send_close_notify();
            let _ = tls.write_tls(&mut self.stream);
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
