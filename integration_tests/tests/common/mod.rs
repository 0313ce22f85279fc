#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use truth_proto::{
    decode_truth_record, encode_environment_header, encode_pixel_sample, encode_truth_record,
    EnvironmentHeader, PixelSample, TruthRecord, TRUTH_RECORD_LEN,
};
use xs_core::{ClientConfig, Renderer, SessionError, SyncSession};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn environment_header(width: i32, height: i32, ppm: f64, num_pixels: i32) -> EnvironmentHeader {
    EnvironmentHeader {
        width,
        height,
        ppm,
        num_pixels,
    }
}

pub fn environment_bytes(header: &EnvironmentHeader, samples: &[PixelSample]) -> Vec<u8> {
    let mut bytes = encode_environment_header(header);
    for sample in samples {
        bytes.extend(encode_pixel_sample(sample));
    }
    bytes
}

/// Serve `bytes` to the first client on an ephemeral port, then close.
pub fn serve_once(bytes: Vec<u8>) -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(&bytes);
            let _ = stream.shutdown(Shutdown::Both);
        }
    });
    Ok(port)
}

/// In-process stand-in for the simulator: serves one environment download
/// and one truth connection, recording every record the client sends.
pub struct FakeStage {
    pub truth_port: u16,
    pub environment_port: u16,
    peer: Arc<Mutex<Option<TcpStream>>>,
    received: Arc<Mutex<Vec<TruthRecord>>>,
}

impl FakeStage {
    /// With `echo` set, every record the client sends is relayed back to it.
    pub fn start(header: EnvironmentHeader, samples: Vec<PixelSample>, echo: bool) -> Result<Self> {
        let environment_port = serve_once(environment_bytes(&header, &samples))?;
        let truth_listener = TcpListener::bind("127.0.0.1:0")?;
        let truth_port = truth_listener.local_addr()?.port();

        let peer: Arc<Mutex<Option<TcpStream>>> = Arc::new(Mutex::new(None));
        let received = Arc::new(Mutex::new(Vec::new()));
        let accept_peer = Arc::clone(&peer);
        let accept_received = Arc::clone(&received);
        thread::spawn(move || {
            let Ok((mut stream, _)) = truth_listener.accept() else {
                return;
            };
            let Ok(writer) = stream.try_clone() else {
                return;
            };
            *accept_peer.lock().expect("peer mutex poisoned") = Some(writer);

            let mut buf = [0u8; TRUTH_RECORD_LEN];
            while stream.read_exact(&mut buf).is_ok() {
                let Ok(record) = decode_truth_record(&buf) else {
                    break;
                };
                accept_received
                    .lock()
                    .expect("received mutex poisoned")
                    .push(record);
                if echo {
                    let mut peer = accept_peer.lock().expect("peer mutex poisoned");
                    if let Some(writer) = peer.as_mut() {
                        let _ = writer.write_all(&buf);
                    }
                }
            }
        });

        Ok(Self {
            truth_port,
            environment_port,
            peer,
            received,
        })
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            truth_port: self.truth_port,
            environment_port: self.environment_port,
            connect_timeout_ms: 1000,
            tick_interval_ms: 5,
            ..ClientConfig::default()
        }
    }

    /// Push a record to the connected client, waiting for it to connect.
    pub fn send(&self, record: &TruthRecord) -> Result<()> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(stream) = self.peer.lock().expect("peer mutex poisoned").as_mut() {
                stream.write_all(&encode_truth_record(record))?;
                return Ok(());
            }
            if Instant::now() > deadline {
                return Err(anyhow!("client never connected to the truth port"));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn received(&self) -> Vec<TruthRecord> {
        self.received.lock().expect("received mutex poisoned").clone()
    }

    pub fn wait_received(&self, count: usize) -> Result<Vec<TruthRecord>> {
        let deadline = Instant::now() + WAIT;
        loop {
            let received = self.received();
            if received.len() >= count {
                return Ok(received);
            }
            if Instant::now() > deadline {
                return Err(anyhow!(
                    "expected {} records from the client, got {}",
                    count,
                    received.len()
                ));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Drop the truth connection from the server side.
    pub fn disconnect(&self) {
        if let Some(stream) = self.peer.lock().expect("peer mutex poisoned").take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Tick until `done` holds, failing on a session error or after `WAIT`.
pub fn tick_until<R, F>(session: &mut SyncSession, renderer: &mut R, mut done: F) -> Result<()>
where
    R: Renderer,
    F: FnMut(&SyncSession) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        session.tick(renderer)?;
        if done(session) {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(anyhow!("condition not reached within {:?}", WAIT));
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Tick until the session reports an error.
pub fn tick_until_error<R: Renderer>(
    session: &mut SyncSession,
    renderer: &mut R,
) -> Result<SessionError> {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Err(err) = session.tick(renderer) {
            return Ok(err);
        }
        if Instant::now() > deadline {
            return Err(anyhow!("session kept running for {:?}", WAIT));
        }
        thread::sleep(Duration::from_millis(5));
    }
}
