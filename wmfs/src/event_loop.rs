//! The readiness wait over the X connection and the command FIFO.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use log::warn;
use mio::unix::SourceFd;
use mio::Events;
use mio::Interest;
use mio::Poll;
use mio::Token;

const DISPLAY: Token = Token(0);
const CHANNEL: Token = Token(1);

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone)]
pub struct Ready {
    pub display: bool,
    pub channel: bool,
}

/// Sources are registered for a single wait and removed afterwards, so a
/// descriptor that stays readable is reported again on the next wait even
/// though mio is edge-triggered.
pub struct WaitSet {
    poll: Poll,
    events: Events,
}

impl WaitSet {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(16),
        })
    }

    /// Blocks until the display or the channel, if there is one, is
    /// readable.
    pub fn wait(&mut self, display: RawFd, channel: Option<RawFd>) -> io::Result<Ready> {
        self.wait_timeout(display, channel, None)
    }

    pub fn wait_timeout(
        &mut self,
        display: RawFd,
        channel: Option<RawFd>,
        timeout: Option<Duration>,
    ) -> io::Result<Ready> {
        let registry = self.poll.registry();
        registry.register(&mut SourceFd(&display), DISPLAY, Interest::READABLE)?;
        let channel = channel.filter(|fd| {
            match registry.register(&mut SourceFd(fd), CHANNEL, Interest::READABLE) {
                Ok(()) => true,
                Err(e) => {
                    warn!("can't wait on fifo descriptor {}: {}", fd, e);
                    false
                }
            }
        });

        let res = loop {
            match self.poll.poll(&mut self.events, timeout) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                res => break res,
            }
        };

        let registry = self.poll.registry();
        registry.deregister(&mut SourceFd(&display))?;
        if let Some(fd) = channel {
            registry.deregister(&mut SourceFd(&fd))?;
        }
        res?;

        let mut ready = Ready::default();
        for ev in &self.events {
            match ev.token() {
                DISPLAY => ready.display = true,
                CHANNEL => ready.channel = true,
                _ => {}
            }
        }
        Ok(ready)
    }
}
