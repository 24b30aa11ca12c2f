//! Core of the wmfs window manager: display bootstrap, protocol error
//! policy, window scan, the command FIFO and the event loop.

pub mod client;
pub mod command;
pub mod config;
pub mod context;
pub mod display;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod ewmh;
pub mod fifo;
pub mod keys;
pub mod scan;
pub mod screen;
pub mod theme;
pub mod wm;
pub mod xerror;

pub use command::Command;
pub use command::CommandRegistry;
pub use context::Context;
pub use error::Error;
pub use error::Result;
pub use wm::Exit;
pub use wm::Options;
pub use wm::Wm;

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Hash)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Lifecycle of one [`Wm`] instance. A restart builds a fresh instance
/// starting again from `Uninitialized`.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Scanned,
    Running,
    ShuttingDown,
    Terminated,
}
