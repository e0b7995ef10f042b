//! [`Multiplexer`] backed by a `polling::Poller`

use log::trace;
use polling::{Event, Events, PollMode, Poller};
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::{BorrowedFd, OwnedFd, RawFd};
use std::sync::Arc;

use super::{Interest, Multiplexer, Readiness};

const CONNECTION_KEY: usize = 0;

/// Wakes a blocked [`PollMultiplexer::wait`] from any thread.
#[derive(Debug, Clone)]
pub struct Waker {
    poller: Arc<Poller>,
}

impl Waker {
    pub fn wake(&self) -> io::Result<()> {
        self.poller.notify()
    }
}

/// Level-triggered registration of one connection descriptor.
///
/// The multiplexer watches its own duplicate of the descriptor, so the
/// registration stays valid however the connection closes its copy.
pub struct PollMultiplexer {
    poller: Arc<Poller>,
    source: OwnedFd,
    interest: Interest,
    events: Events,
}

impl PollMultiplexer {
    /// Registers `fd` for read and write readiness.
    pub fn new(fd: RawFd, max_events: usize) -> io::Result<Self> {
        // SAFETY: the caller's connection keeps `fd` open for this call.
        let source = unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()?;
        let poller = Arc::new(Poller::new()?);
        let interest = Interest::READ | Interest::WRITE;

        // SAFETY: `source` is owned here and deleted from the poller in `Drop`
        // before it is closed.
        unsafe {
            poller.add_with_mode(&source, event_for(interest), PollMode::Level)?;
        }

        let capacity = NonZeroUsize::new(max_events).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            poller,
            source,
            interest,
            events: Events::with_capacity(capacity),
        })
    }

    pub fn waker(&self) -> Waker {
        Waker {
            poller: Arc::clone(&self.poller),
        }
    }
}

impl Multiplexer for PollMultiplexer {
    fn rearm(&mut self, interest: Interest) -> io::Result<()> {
        if self.interest == interest {
            return Ok(());
        }
        trace!("re-arming connection for {:?}", interest);
        self.poller
            .modify_with_mode(&self.source, event_for(interest), PollMode::Level)?;
        self.interest = interest;
        Ok(())
    }

    fn wait(&mut self, readiness: &mut Vec<Readiness>) -> io::Result<()> {
        readiness.clear();
        self.events.clear();
        self.poller.wait(&mut self.events, None)?;
        readiness.extend(
            self.events
                .iter()
                .filter(|event| event.key == CONNECTION_KEY)
                .map(|event| readiness_from_event(&event)),
        );
        Ok(())
    }
}

impl Drop for PollMultiplexer {
    fn drop(&mut self) {
        if let Err(e) = self.poller.delete(&self.source) {
            trace!("failed to deregister connection: {}", e);
        }
    }
}

impl std::fmt::Debug for PollMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollMultiplexer")
            .field("source", &self.source)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}

fn event_for(interest: Interest) -> Event {
    let mut event = Event::none(CONNECTION_KEY);
    event.readable = interest.contains(Interest::READ);
    event.writable = interest.contains(Interest::WRITE);
    event
}

fn readiness_from_event(event: &Event) -> Readiness {
    let mut readiness = Readiness::empty();
    if event.readable {
        readiness |= Readiness::READABLE;
    }
    if event.writable {
        readiness |= Readiness::WRITABLE;
    }
    if event.is_err() == Some(true) {
        readiness |= Readiness::ERROR;
    }
    if event.is_interrupt() {
        readiness |= Readiness::HANGUP;
    }
    readiness
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_interest_maps_to_event() {
        let event = event_for(Interest::READ);
        assert!(event.readable && !event.writable);

        let event = event_for(Interest::READ | Interest::WRITE);
        assert!(event.readable && event.writable);
        assert_eq!(
            readiness_from_event(&event),
            Readiness::READABLE | Readiness::WRITABLE
        );
        assert_eq!(readiness_from_event(&Event::none(0)), Readiness::empty());
    }

    #[test]
    fn test_wait_reports_readable_socket() -> io::Result<()> {
        let (a, mut b) = UnixStream::pair()?;
        let mut poll = PollMultiplexer::new(a.as_raw_fd(), 4)?;
        poll.rearm(Interest::READ)?;

        b.write_all(b"x")?;

        let mut events = Vec::new();
        poll.wait(&mut events)?;
        assert_eq!(events.len(), 1);
        assert!(events[0].contains(Readiness::READABLE));
        Ok(())
    }

    #[test]
    fn test_waker_interrupts_wait() -> io::Result<()> {
        let (a, _b) = UnixStream::pair()?;
        let mut poll = PollMultiplexer::new(a.as_raw_fd(), 4)?;
        poll.rearm(Interest::READ)?;

        let waker = poll.waker();
        let handle = std::thread::spawn(move || waker.wake());

        let mut events = Vec::new();
        poll.wait(&mut events)?;
        assert!(events.is_empty());
        handle.join().unwrap()?;
        Ok(())
    }

    #[test]
    fn test_peer_close_is_reported() -> io::Result<()> {
        let (a, b) = UnixStream::pair()?;
        let mut poll = PollMultiplexer::new(a.as_raw_fd(), 4)?;
        poll.rearm(Interest::READ)?;
        drop(b);

        let mut events = Vec::new();
        poll.wait(&mut events)?;
        assert_eq!(events.len(), 1);
        assert!(events[0].intersects(Readiness::READABLE | Readiness::HANGUP));
        Ok(())
    }

    #[test]
    fn test_registration_survives_closing_the_connection_fd() -> io::Result<()> {
        let (a, mut b) = UnixStream::pair()?;
        let mut poll = PollMultiplexer::new(a.as_raw_fd(), 4)?;
        poll.rearm(Interest::READ)?;
        drop(a);

        b.write_all(b"x")?;
        let mut events = Vec::new();
        poll.wait(&mut events)?;
        assert_eq!(events.len(), 1);
        Ok(())
    }
}
