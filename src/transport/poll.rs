use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags};

use super::Socket;
use crate::time;
use crate::Error;

/// Readiness bitset.
///
/// The bit values are part of the external contract and match the classic
/// `poll(2)` numbering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u16);

impl Interest {
    pub const EMPTY: Interest = Interest(0);
    pub const READABLE: Interest = Interest(0x1);
    pub const WRITABLE: Interest = Interest(0x4);
    pub const ERROR: Interest = Interest(0x8);
    pub const HANGUP: Interest = Interest(0x10);

    #[inline(always)]
    pub fn bits(&self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub fn contains(&self, other: Interest) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn to_flags(self) -> PollFlags {
        let mut f = PollFlags::empty();
        if self.contains(Interest::READABLE) {
            f |= PollFlags::POLLIN;
        }
        if self.contains(Interest::WRITABLE) {
            f |= PollFlags::POLLOUT;
        }
        // POLLERR and POLLHUP are always reported by the kernel.
        f
    }

    fn from_flags(f: PollFlags) -> Interest {
        let mut i = Interest::EMPTY;
        if f.contains(PollFlags::POLLIN) {
            i |= Interest::READABLE;
        }
        if f.contains(PollFlags::POLLOUT) {
            i |= Interest::WRITABLE;
        }
        if f.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
            i |= Interest::ERROR;
        }
        if f.contains(PollFlags::POLLHUP) {
            i |= Interest::HANGUP;
        }
        i
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Interest::READABLE, "READABLE"),
            (Interest::WRITABLE, "WRITABLE"),
            (Interest::ERROR, "ERROR"),
            (Interest::HANGUP, "HANGUP"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(i, _)| self.contains(*i))
            .map(|(_, n)| *n)
            .collect();
        write!(f, "Interest({})", set.join("|"))
    }
}

/// One socket to wait on and, after [`poll`], what it is ready for.
#[derive(Debug)]
pub struct PollEntry<'a> {
    socket: &'a Socket,
    interest: Interest,
    ready: Interest,
}

impl<'a> PollEntry<'a> {
    pub fn new(socket: &'a Socket, interest: Interest) -> Self {
        PollEntry {
            socket,
            interest,
            ready: Interest::EMPTY,
        }
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Readiness reported by the last [`poll`].
    pub fn ready(&self) -> Interest {
        self.ready
    }
}

/// Wait until any entry is ready or `timeout` expires.
///
/// `None` waits forever. Returns the number of ready entries, zero on
/// timeout. Signal interruption restarts the wait with the time remaining.
pub fn poll(entries: &mut [PollEntry<'_>], timeout: Option<Duration>) -> Result<usize, Error> {
    let deadline = time::deadline(timeout);

    let ready = {
        let natives = entries
            .iter()
            .map(|e| e.socket.native())
            .collect::<Result<Vec<_>, _>>()?;

        let mut fds: Vec<PollFd> = natives
            .iter()
            .zip(entries.iter())
            .map(|(n, e)| PollFd::new(*n, e.interest.to_flags()))
            .collect();

        loop {
            let wait = to_millis(time::remaining(deadline));
            match nix::poll::poll(&mut fds, wait) {
                Ok(_) => break,
                Err(Errno::EINTR) => {
                    trace!("poll interrupted, waiting again");
                    continue;
                }
                Err(e) => return Err(std::io::Error::from(e).into()),
            }
        }

        fds.iter()
            .map(|fd| fd.revents().map(Interest::from_flags).unwrap_or_default())
            .collect::<Vec<_>>()
    };

    let mut count = 0;
    for (entry, r) in entries.iter_mut().zip(ready) {
        entry.ready = r;
        if !r.is_empty() {
            count += 1;
        }
    }

    Ok(count)
}

// Sub-millisecond waits round up so a short timeout never becomes a busy spin.
fn to_millis(d: Option<Duration>) -> libc::c_int {
    match d {
        None => -1,
        Some(d) => {
            let mut ms = d.as_millis();
            if Duration::from_millis(ms as u64) < d {
                ms += 1;
            }
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
