//! Readiness loop
//!
//! A dedicated worker pumps the protocol connection: it drains callbacks that
//! are already queued, flushes outgoing requests and then blocks on the
//! multiplexer until the connection becomes readable or writable again.
//! Every router callback, and therefore every sink call, runs on that worker.
//!
//! Only a flush that would block is retried (by asking for write readiness);
//! every other connection failure ends the loop with
//! [`LoopExit::ConnectionLost`].

use anyhow::{anyhow, Context, Result};
use bitflags::bitflags;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::config::DispatcherConfig;

mod poll;

pub use poll::{PollMultiplexer, Waker};

bitflags! {
    /// Readiness the loop is waiting for. Errors and hangups are always reported.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

bitflags! {
    /// Readiness reported for the connection descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Readiness: u8 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const ERROR = 1 << 2;
        const HANGUP = 1 << 3;
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The outgoing buffer is full; retry once the socket is writable.
    #[error("connection would block")]
    WouldBlock,
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// `stop()` was requested
    Stopped,
    /// The connection failed; input delivery is over
    ConnectionLost(String),
}

/// The protocol client primitives the loop drives.
#[cfg_attr(test, mockall::automock)]
pub trait ProtocolConnection {
    /// Descriptor to wait on.
    fn fd(&self) -> RawFd;

    /// Dispatches callbacks that are already queued, without reading.
    fn dispatch_pending(&mut self) -> Result<usize, ConnectionError>;

    /// Writes buffered requests to the socket.
    fn flush(&mut self) -> Result<(), ConnectionError>;

    /// Reads incoming data and dispatches the resulting callbacks.
    fn read_and_dispatch(&mut self) -> Result<usize, ConnectionError>;
}

/// Readiness multiplexer holding the registration of one descriptor.
#[cfg_attr(test, mockall::automock)]
pub trait Multiplexer {
    /// Replaces the interest set of the registered descriptor.
    fn rearm(&mut self, interest: Interest) -> io::Result<()>;

    /// Blocks until readiness is reported or the loop is woken.
    ///
    /// `events` is cleared and refilled; a wake-up leaves it empty.
    fn wait(&mut self, events: &mut Vec<Readiness>) -> io::Result<()>;
}

/// Runs the loop until `active` is cleared or the connection fails.
pub fn run_loop<C, M>(conn: &mut C, mux: &mut M, active: &AtomicBool) -> LoopExit
where
    C: ProtocolConnection + ?Sized,
    M: Multiplexer + ?Sized,
{
    let mut events = Vec::new();

    loop {
        if let Err(e) = conn.dispatch_pending() {
            return lost(format!("dispatching queued events failed: {}", e));
        }

        if !active.load(Ordering::Acquire) {
            return LoopExit::Stopped;
        }

        let interest = match conn.flush() {
            Ok(()) => Interest::READ,
            Err(ConnectionError::WouldBlock) => {
                trace!("flush would block, waiting for write readiness");
                Interest::READ | Interest::WRITE
            }
            Err(e) => return lost(format!("flush failed: {}", e)),
        };
        if let Err(e) = mux.rearm(interest) {
            return lost(format!("re-arming the multiplexer failed: {}", e));
        }

        if let Err(e) = mux.wait(&mut events) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return lost(format!("waiting for readiness failed: {}", e));
        }

        if !active.load(Ordering::Acquire) {
            return LoopExit::Stopped;
        }

        for readiness in events.iter().copied() {
            if readiness.intersects(Readiness::ERROR | Readiness::HANGUP) {
                return lost(format!("connection reported {:?}", readiness));
            }

            if readiness.contains(Readiness::READABLE) {
                match conn.read_and_dispatch() {
                    Ok(_) | Err(ConnectionError::WouldBlock) => {}
                    Err(e) => return lost(format!("dispatching incoming events failed: {}", e)),
                }
            }

            if readiness.contains(Readiness::WRITABLE) {
                match conn.flush() {
                    Ok(()) => {
                        if let Err(e) = mux.rearm(Interest::READ) {
                            return lost(format!("re-arming the multiplexer failed: {}", e));
                        }
                    }
                    Err(ConnectionError::WouldBlock) => {}
                    Err(e) => return lost(format!("flush failed: {}", e)),
                }
            }
        }
    }
}

fn lost(reason: String) -> LoopExit {
    error!("💥 Wayland connection lost: {}", reason);
    LoopExit::ConnectionLost(reason)
}

/// Handle to the background worker running [`run_loop`].
pub struct Dispatcher {
    active: Arc<AtomicBool>,
    waker: Waker,
    worker: Mutex<Option<JoinHandle<LoopExit>>>,
}

impl Dispatcher {
    /// Registers the connection with a fresh poller and starts pumping it on a
    /// background worker with reduced priority.
    pub fn start<C>(mut conn: C, config: &DispatcherConfig) -> Result<Self>
    where
        C: ProtocolConnection + Send + 'static,
    {
        let mut mux = PollMultiplexer::new(conn.fd(), config.max_events)
            .context("Failed to register the connection for readiness")?;
        let waker = mux.waker();
        let active = Arc::new(AtomicBool::new(true));

        let worker_active = Arc::clone(&active);
        let nice = config.worker_nice;
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                lower_priority(nice);
                let exit = run_loop(&mut conn, &mut mux, &worker_active);
                worker_active.store(false, Ordering::Release);
                debug!("dispatcher worker finished: {:?}", exit);
                exit
            })
            .context("Failed to spawn the dispatcher worker")?;

        info!("🚀 Dispatcher started on '{}'", config.thread_name);

        Ok(Self {
            active,
            waker,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Asks the worker to finish. Safe to call repeatedly and from any thread.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!("🛑 Stopping dispatcher");
            if let Err(e) = self.waker.wake() {
                warn!("Failed to wake the dispatcher worker: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Waits for the worker to finish and reports how the loop ended.
    ///
    /// Only the first call observes the worker; later calls return `Stopped`.
    pub fn join(&self) -> Result<LoopExit> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(LoopExit::Stopped);
        };
        worker
            .join()
            .map_err(|_| anyhow!("dispatcher worker panicked"))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join() {
            error!("{}", e);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("active", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Moves the calling thread to background priority.
fn lower_priority(nice: i32) {
    // On Linux PRIO_PROCESS with who == 0 targets the calling thread only.
    let ret = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, 0, nice) };
    if ret != 0 {
        warn!(
            "Failed to lower dispatcher priority: {}",
            io::Error::last_os_error()
        );
    }
}
