//! Blocking TCP transport for the truth and environment channels.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not resolve host {host}:{port}")]
    Resolve { host: String, port: u16 },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection closed by peer after {received} of {expected} bytes")]
    Closed { received: usize, expected: usize },
    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether the failure happened before a connection existed.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            TransportError::Resolve { .. } | TransportError::Connect { .. }
        )
    }
}

/// Fill `buf` completely, looping over short reads.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut received = 0;
    while received < buf.len() {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(TransportError::Closed {
                    received,
                    expected: buf.len(),
                })
            }
            Ok(n) => received += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(())
}

/// Send every byte of `buf`, looping over short writes.
pub fn write_full<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> Result<(), TransportError> {
    let mut sent = 0;
    while sent < buf.len() {
        match writer.write(&buf[sent..]) {
            Ok(0) => {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write ({}/{} bytes)", sent, buf.len()),
                )))
            }
            Ok(n) => sent += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    writer.flush()?;
    Ok(())
}

/// One duplex TCP connection to the server.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Resolve `host` and connect to the first address that accepts.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve {
                host: host.to_string(),
                port,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::Resolve {
                host: host.to_string(),
                port,
            });
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Self::from_stream(stream),
                Err(err) => {
                    debug!(target: "xs::session", %addr, error = %err, "connect.attempt_failed");
                    last_err = Some(err);
                }
            }
        }
        Err(TransportError::Connect {
            addr: format!("{}:{}", host, port),
            source: last_err
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address")),
        })
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        if let Err(err) = stream.set_nodelay(true) {
            warn!(target: "xs::session", error = %err, "Failed to set TCP_NODELAY");
        }
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; n];
        read_full(&mut self.stream, &mut buf)?;
        Ok(buf)
    }

    pub fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        read_full(&mut self.stream, buf)
    }

    pub fn write_exact(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_full(&mut self.stream, bytes)
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Second handle onto the same socket, used to split reading and writing
    /// across threads.
    pub fn try_clone(&self) -> Result<Self, TransportError> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            peer: self.peer,
        })
    }

    /// Close both directions. Blocked reads on any clone return promptly.
    pub fn shutdown(&self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            if err.kind() != io::ErrorKind::NotConnected {
                debug!(target: "xs::session", peer = %self.peer, error = %err, "shutdown.failed");
            }
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Hands out at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    struct ShortWriter {
        written: Vec<u8>,
        chunk: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_full_loops_over_partial_reads() {
        let data: Vec<u8> = (0..=200).collect();
        let mut reader = Trickle {
            data: &data,
            chunk: 7,
        };
        let mut buf = [0u8; 150];
        read_full(&mut reader, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[..150]);
    }

    #[test]
    fn read_full_reports_early_close() {
        let data = [1u8, 2, 3];
        let mut reader = Trickle {
            data: &data,
            chunk: 2,
        };
        let mut buf = [0u8; 8];
        let err = read_full(&mut reader, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Closed {
                received: 3,
                expected: 8
            }
        ));
    }

    #[test]
    fn write_full_loops_over_partial_writes() {
        let mut writer = ShortWriter {
            written: Vec::new(),
            chunk: 5,
        };
        let payload: Vec<u8> = (0..64).collect();
        write_full(&mut writer, &payload).unwrap();
        assert_eq!(writer.written, payload);
    }

    #[test]
    fn connection_round_trips_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            read_full(&mut stream, &mut buf).unwrap();
            write_full(&mut stream, &buf).unwrap();
        });

        let mut conn = Connection::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        conn.write_exact(&[9, 8, 7, 6]).unwrap();
        assert_eq!(conn.read_exact(4).unwrap(), vec![9, 8, 7, 6]);
        server.join().unwrap();
    }

    #[test]
    fn connect_to_closed_port_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Connection::connect("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(err.is_connect(), "unexpected error: {err}");
    }
}
