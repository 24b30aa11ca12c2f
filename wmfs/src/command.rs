//! Named commands reachable from the FIFO and from key bindings.

use std::collections::HashMap;
use std::os::unix::process::CommandExt;
use std::process::Stdio;

use log::info;
use log::warn;

/// A command handler. It may change any state of `C`, including asking the
/// event loop to stop; its outcome is not reported back to the caller.
pub trait Command<C> {
    fn call(&self, ctx: &mut C, arg: Option<&str>);
}

impl<C, F> Command<C> for F
where
    F: Fn(&mut C, Option<&str>),
{
    fn call(&self, ctx: &mut C, arg: Option<&str>) {
        self(ctx, arg)
    }
}

/// The pieces of state the built-in commands touch.
pub trait Lifecycle {
    fn stop(&mut self);
    fn request_reload(&mut self);
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct CommandLine<'a> {
    pub name: &'a str,
    pub arg: Option<&'a str>,
}

/// Keeps everything before the first newline, then splits name and
/// argument at the first space. The argument is passed on verbatim.
pub fn parse_line(line: &str) -> CommandLine<'_> {
    let line = line.split('\n').next().unwrap_or_default();
    match line.split_once(' ') {
        Some((name, arg)) => CommandLine {
            name,
            arg: Some(arg),
        },
        None => CommandLine {
            name: line,
            arg: None,
        },
    }
}

pub struct CommandRegistry<C> {
    handlers: HashMap<String, Box<dyn Command<C>>>,
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, command: impl Command<C> + 'static) {
        self.handlers.insert(name.into(), Box::new(command));
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Command<C>> {
        self.handlers.get(name).map(|c| c.as_ref())
    }

    /// Runs the command named on `line`. Unknown names are ignored; returns
    /// whether a handler ran.
    pub fn dispatch(&self, ctx: &mut C, line: &str) -> bool {
        let CommandLine { name, arg } = parse_line(line);
        match self.lookup(name) {
            Some(command) => {
                command.call(ctx, arg);
                true
            }
            None => false,
        }
    }
}

impl<C: Lifecycle + 'static> CommandRegistry<C> {
    /// `quit`, `reload` and `spawn`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("quit", |ctx: &mut C, _: Option<&str>| ctx.stop());
        registry.register("reload", |ctx: &mut C, _: Option<&str>| {
            ctx.stop();
            ctx.request_reload();
        });
        registry.register("spawn", |_: &mut C, arg: Option<&str>| {
            if let Some(cmd) = arg {
                spawn(cmd);
            }
        });
        registry
    }
}

/// Runs `cmd` through `sh -c` in its own process group. The window manager
/// ignores SIGCHLD so children are reaped by the kernel; the child gets the
/// default disposition back.
pub fn spawn(cmd: &str) {
    let mut command = std::process::Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .process_group(0);
    unsafe {
        command.pre_exec(|| {
            libc::signal(libc::SIGCHLD, libc::SIG_DFL);
            Ok(())
        });
    }
    let res = command.spawn();
    match res {
        Ok(child) => info!("spawned '{}' as pid {}", cmd, child.id()),
        Err(e) => warn!("can't spawn '{}': {}", cmd, e),
    }
}

/// Lets the kernel reap spawned children.
pub fn ignore_children() {
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }
}
