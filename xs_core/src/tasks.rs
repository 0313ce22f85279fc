//! Background reader and writer threads for the truth stream.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};
use truth_proto::{decode_truth_record, encode_truth_record, TRUTH_RECORD_LEN};

use crate::queue::TruthQueue;
use crate::transport::{Connection, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Reader,
    Writer,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Reader => f.write_str("reader"),
            TaskKind::Writer => f.write_str("writer"),
        }
    }
}

/// Terminal state of a task, sent once when its loop exits.
#[derive(Debug)]
pub enum SessionEvent {
    ConnectionLost {
        task: TaskKind,
        error: TransportError,
    },
    TaskStopped {
        task: TaskKind,
        records: u64,
    },
}

impl SessionEvent {
    pub fn task(&self) -> TaskKind {
        match self {
            SessionEvent::ConnectionLost { task, .. } | SessionEvent::TaskStopped { task, .. } => {
                *task
            }
        }
    }
}

/// Pull whole records off the connection into `inbound` until the
/// connection fails, the queue closes, or `stop` is raised.
pub fn spawn_reader(
    mut connection: Connection,
    inbound: Arc<TruthQueue>,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("xs-truth-reader".to_string())
        .spawn(move || {
            let peer = connection.peer();
            let mut records = 0u64;
            let mut buf = [0u8; TRUTH_RECORD_LEN];
            let event = loop {
                if stop.load(Ordering::Acquire) {
                    break SessionEvent::TaskStopped {
                        task: TaskKind::Reader,
                        records,
                    };
                }
                if let Err(error) = connection.read_exact_into(&mut buf) {
                    if stop.load(Ordering::Acquire) {
                        break SessionEvent::TaskStopped {
                            task: TaskKind::Reader,
                            records,
                        };
                    }
                    warn!(
                        target: "xs::truth",
                        %peer,
                        error = %error,
                        records,
                        "truth.reader.connection_lost"
                    );
                    break SessionEvent::ConnectionLost {
                        task: TaskKind::Reader,
                        error,
                    };
                }
                let record = match decode_truth_record(&buf) {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(target: "xs::truth", %peer, error = %err, "truth.reader.decode_failed");
                        break SessionEvent::ConnectionLost {
                            task: TaskKind::Reader,
                            error: TransportError::Io(io::Error::new(
                                io::ErrorKind::InvalidData,
                                err,
                            )),
                        };
                    }
                };
                if record.echo_request {
                    debug!(
                        target: "xs::truth",
                        id = record.stage_id,
                        "truth.reader.self_echo"
                    );
                }
                if inbound.push(record).is_err() {
                    break SessionEvent::TaskStopped {
                        task: TaskKind::Reader,
                        records,
                    };
                }
                records += 1;
            };
            info!(target: "xs::truth", %peer, records, "truth.reader.exited");
            let _ = events.send(event);
        })
}

/// Drain `outbound` onto the connection, stamping every record as an echo
/// request. Exits once the queue is closed and flushed, or on a write error.
/// The queue is always closed on exit.
pub fn spawn_writer(
    mut connection: Connection,
    outbound: Arc<TruthQueue>,
    poll: Duration,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("xs-truth-writer".to_string())
        .spawn(move || {
            let peer = connection.peer();
            let mut records = 0u64;
            let event = 'outer: loop {
                let Some(batch) = outbound.wait_drain(poll) else {
                    break SessionEvent::TaskStopped {
                        task: TaskKind::Writer,
                        records,
                    };
                };
                for mut record in batch {
                    record.echo_request = true;
                    if let Err(error) = connection.write_exact(&encode_truth_record(&record)) {
                        if stop.load(Ordering::Acquire) {
                            debug!(target: "xs::truth", error = %error, "truth.writer.flush_abandoned");
                            break 'outer SessionEvent::TaskStopped {
                                task: TaskKind::Writer,
                                records,
                            };
                        }
                        warn!(
                            target: "xs::truth",
                            %peer,
                            error = %error,
                            records,
                            "truth.writer.connection_lost"
                        );
                        break 'outer SessionEvent::ConnectionLost {
                            task: TaskKind::Writer,
                            error,
                        };
                    }
                    records += 1;
                }
            };
            // Producers blocked on a full queue must see the loss.
            outbound.close();
            info!(target: "xs::truth", %peer, records, "truth.writer.exited");
            let _ = events.send(event);
        })
}
