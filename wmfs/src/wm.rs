//! Startup, main loop and teardown.

use std::path::PathBuf;

use log::debug;
use log::info;
use log::warn;

use crate::command;
use crate::command::CommandRegistry;
use crate::command::Lifecycle;
use crate::config;
use crate::config::Config;
use crate::context::Context;
use crate::display::Display;
use crate::error::Result;
use crate::event_loop::Ready;
use crate::event_loop::WaitSet;
use crate::events;
use crate::ewmh::Ewmh;
use crate::fifo::ChannelRead;
use crate::scan;
use crate::screen;
use crate::Phase;

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Options {
    /// `None` means `$DISPLAY`.
    pub display: Option<String>,
    /// `None` means [`config::default_path`].
    pub config: Option<PathBuf>,
}

/// What the caller should do once [`Wm::quit`] has torn everything down.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Exit {
    /// Start a fresh instance with the same options.
    Restart,
    Quit,
}

impl Exit {
    pub fn from_reload_flag(reload: bool) -> Self {
        if reload {
            Exit::Restart
        } else {
            Exit::Quit
        }
    }
}

/// The source served on one wake.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum Source {
    Display,
    Channel,
}

/// The display wins when both are ready; the channel gets its turn on the
/// next wake.
fn source_to_serve(ready: Ready) -> Option<Source> {
    if ready.display {
        Some(Source::Display)
    } else if ready.channel {
        Some(Source::Channel)
    } else {
        None
    }
}

/// Calls `handle_next` until it reports nothing left, it fails, or
/// `running` turns false.
fn drain<C>(
    ctx: &mut C,
    running: impl Fn(&C) -> bool,
    mut handle_next: impl FnMut(&mut C) -> Option<Result<()>>,
) -> Result<()> {
    while running(ctx) {
        match handle_next(ctx) {
            Some(res) => res?,
            None => break,
        }
    }
    Ok(())
}

/// Runs instances until one ends without asking for a reload. Every instance
/// gets the same options.
pub fn supervise(
    opts: &Options,
    mut instance: impl FnMut(&Options) -> Result<Exit>,
) -> Result<()> {
    loop {
        match instance(opts)? {
            Exit::Restart => info!("reloading"),
            Exit::Quit => return Ok(()),
        }
    }
}

pub struct Wm {
    ctx: Context,
    commands: CommandRegistry<Context>,
    waits: WaitSet,
    phase: Phase,
}

impl Wm {
    /// Connects and sets everything up. Fails if there is no display or
    /// if another window manager owns it.
    pub fn init(opts: &Options) -> Result<Self> {
        let mut display = Display::connect(opts.display.as_deref())?;
        display.configure_root();
        let mut ctx = Context::new(display);
        ctx.check_errors()?;
        info!("connected to display {}", ctx.display().name());
        command::ignore_children();

        ctx.ewmh = Some(Ewmh::init(ctx.display()));
        ctx.screens = screen::init_screens(ctx.display());
        let waits = WaitSet::new()?;
        let commands = CommandRegistry::with_builtins();

        let path = opts.config.clone().unwrap_or_else(config::default_path);
        ctx.load_config(&Config::load_or_default(&path));
        ctx.grab_keys();

        ctx.channel.open();

        ctx.display().sync(false);
        ctx.check_errors()?;
        Ok(Self {
            ctx,
            commands,
            waits,
            phase: Phase::Initialized,
        })
    }

    /// For registering commands beyond the built-in ones.
    pub fn commands_mut(&mut self) -> &mut CommandRegistry<Context> {
        &mut self.commands
    }

    /// Adopts the windows that existed before startup. Only does anything
    /// right after [`Wm::init`].
    pub fn scan(&mut self) -> Result<()> {
        if self.phase != Phase::Initialized {
            return Ok(());
        }
        scan::scan(&mut self.ctx);
        self.ctx.display().sync(false);
        self.ctx.check_errors()?;
        self.phase = Phase::Scanned;
        Ok(())
    }

    /// Returns once a command or key binding stops the window manager, or
    /// on a fatal protocol error.
    pub fn run(&mut self) -> Result<()> {
        self.phase = Phase::Running;
        while self.ctx.running() {
            // Events Xlib already holds never make the socket readable.
            let ready = if self.ctx.display().queued() {
                Ready {
                    display: true,
                    channel: false,
                }
            } else {
                self.waits.wait(
                    self.ctx.display().connection_fd(),
                    self.ctx.channel.raw_fd(),
                )?
            };
            match source_to_serve(ready) {
                Some(Source::Display) => self.drain_display()?,
                Some(Source::Channel) => self.read_channel()?,
                None => {}
            }
        }
        Ok(())
    }

    fn drain_display(&mut self) -> Result<()> {
        let commands = &self.commands;
        drain(&mut self.ctx, Context::running, |ctx| {
            if !ctx.display().pending() {
                return None;
            }
            let ev = ctx.display().next_event();
            events::handle(ctx, commands, &ev);
            Some(ctx.check_errors())
        })
    }

    fn read_channel(&mut self) -> Result<()> {
        match self.ctx.channel.read() {
            ChannelRead::Line(line) => {
                debug!("fifo: {}", line.trim_end());
                if !self.commands.dispatch(&mut self.ctx, &line) {
                    debug!("unknown command ignored");
                }
                self.ctx.display().sync(false);
                self.ctx.check_errors()
            }
            ChannelRead::Reopened | ChannelRead::Nothing => Ok(()),
        }
    }

    /// Releases everything, closing the display last, and reports whether
    /// a reload was asked for.
    pub fn quit(mut self) -> Exit {
        self.phase = Phase::ShuttingDown;
        let ctx = &mut self.ctx;
        ctx.release_screens();
        ctx.release_gc();
        ctx.release_clients();
        ctx.release_config();
        ctx.channel.close();
        ctx.stop();
        ctx.display().sync(false);
        if let Err(e) = ctx.check_errors() {
            warn!("during shutdown: {}", e);
        }

        let exit = Exit::from_reload_flag(ctx.reload_requested());
        self.phase = Phase::Terminated;
        info!("shut down, {:?}", exit);
        exit
    }
}
