//! X protocol error handling.
//!
//! Xlib reports errors through a process-wide callback that carries no user
//! data. The callback classifies each error with [`classify`] against a
//! snapshot of the root window and the managed windows, kept current by the
//! context, and queues only what still needs attention.

use std::collections::HashSet;
use std::os::raw::c_int;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use x11::xlib::BadAccess;
use x11::xlib::BadWindow;
use x11::xlib::Display as XDisplay;
use x11::xlib::Window;
use x11::xlib::XErrorEvent;
use x11::xlib::XSetErrorHandler;

use crate::display::Display;

// From <X11/Xproto.h>
pub const X_GRAB_BUTTON: u8 = 28;
pub const X_SET_INPUT_FOCUS: u8 = 42;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProtocolError {
    pub error_code: u8,
    pub request_code: u8,
    pub minor_code: u8,
    pub resource: Window,
}

impl From<&XErrorEvent> for ProtocolError {
    fn from(ev: &XErrorEvent) -> Self {
        Self {
            error_code: ev.error_code,
            request_code: ev.request_code,
            minor_code: ev.minor_code,
            resource: ev.resourceid,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// Another window manager owns the display.
    Fatal,
    /// A race against a window that is already gone.
    Ignorable,
    Logged,
}

pub fn classify(err: &ProtocolError, root: Window, tracked: &HashSet<Window>) -> ErrorClass {
    if err.error_code == BadAccess as u8 && err.resource == root {
        return ErrorClass::Fatal;
    }
    if tracked.contains(&err.resource)
        && (err.error_code == BadWindow as u8
            || err.request_code == X_SET_INPUT_FOCUS
            || err.request_code == X_GRAB_BUTTON)
    {
        return ErrorClass::Ignorable;
    }
    ErrorClass::Logged
}

#[derive(Debug, Default)]
struct Tracked {
    root: Window,
    windows: HashSet<Window>,
}

static TRACKED: Lazy<Mutex<Tracked>> = Lazy::new(Default::default);
static PENDING: Lazy<Mutex<Vec<(ProtocolError, ErrorClass)>>> = Lazy::new(Default::default);

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

unsafe extern "C" fn record_error(_display: *mut XDisplay, ev: *mut XErrorEvent) -> c_int {
    if let Some(ev) = ev.as_ref() {
        let err = ProtocolError::from(ev);
        let class = {
            let tracked = lock(&TRACKED);
            classify(&err, tracked.root, &tracked.windows)
        };
        if class != ErrorClass::Ignorable {
            lock(&PENDING).push((err, class));
        }
    }
    0
}

unsafe extern "C" fn ignore_error(_display: *mut XDisplay, _ev: *mut XErrorEvent) -> c_int {
    0
}

/// Installs the recording handler for a connection whose root is `root`,
/// forgetting anything left over from a previous connection.
pub fn install(root: Window) {
    reset();
    lock(&TRACKED).root = root;
    unsafe {
        XSetErrorHandler(Some(record_error));
    }
}

/// Drops the tracked windows and every queued error.
pub fn reset() {
    *lock(&TRACKED) = Tracked::default();
    lock(&PENDING).clear();
}

pub fn track(window: Window) {
    lock(&TRACKED).windows.insert(window);
}

pub fn untrack(window: Window) {
    lock(&TRACKED).windows.remove(&window);
}

pub fn untrack_all() {
    lock(&TRACKED).windows.clear();
}

/// Errors recorded since the last call, oldest first. Ignorable ones are
/// never queued.
pub fn take_pending() -> Vec<(ProtocolError, ErrorClass)> {
    std::mem::take(&mut *lock(&PENDING))
}

/// Runs `f` with every protocol error swallowed. Requests already queued
/// before the call are flushed to the recording handler first.
pub fn with_errors_suppressed<T>(display: &Display, f: impl FnOnce() -> T) -> T {
    display.sync(false);
    let previous = unsafe { XSetErrorHandler(Some(ignore_error)) };
    let out = f();
    display.sync(false);
    unsafe {
        XSetErrorHandler(previous);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::null_mut;

    const ROOT: Window = 0x1e0;

    // The tracked set and the queue are process-wide.
    static STATE_LOCK: Mutex<()> = Mutex::new(());

    fn err(error_code: u8, request_code: u8, resource: Window) -> ProtocolError {
        ProtocolError {
            error_code,
            request_code,
            minor_code: 0,
            resource,
        }
    }

    fn tracking(windows: &[Window]) -> HashSet<Window> {
        windows.iter().copied().collect()
    }

    fn x_error_event(error_code: u8, request_code: u8, resource: Window) -> XErrorEvent {
        let mut ev: XErrorEvent = unsafe { std::mem::zeroed() };
        ev.error_code = error_code;
        ev.request_code = request_code;
        ev.resourceid = resource;
        ev
    }

    fn deliver(error_code: u8, request_code: u8, resource: Window) {
        let mut ev = x_error_event(error_code, request_code, resource);
        assert_eq!(unsafe { record_error(null_mut(), &mut ev) }, 0);
    }

    fn fresh_state(root: Window) -> std::sync::MutexGuard<'static, ()> {
        let guard = lock(&STATE_LOCK);
        reset();
        lock(&TRACKED).root = root;
        guard
    }

    #[test]
    fn bad_access_on_root_is_fatal() {
        let tracked = tracking(&[]);
        assert_eq!(
            classify(&err(BadAccess as u8, 2, ROOT), ROOT, &tracked),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn bad_access_elsewhere_is_not_fatal() {
        let tracked = tracking(&[0x400001]);
        assert_eq!(
            classify(&err(BadAccess as u8, 2, 0x400001), ROOT, &tracked),
            ErrorClass::Logged
        );
        assert_eq!(
            classify(&err(BadAccess as u8, 2, 0x500000), ROOT, &tracked),
            ErrorClass::Logged
        );
    }

    #[test]
    fn races_on_tracked_clients_are_ignored() {
        let tracked = tracking(&[0x400001]);
        let w = 0x400001;
        assert_eq!(
            classify(&err(BadWindow as u8, 12, w), ROOT, &tracked),
            ErrorClass::Ignorable
        );
        // BadMatch (8) from SetInputFocus and BadAccess from GrabButton
        assert_eq!(
            classify(&err(8, X_SET_INPUT_FOCUS, w), ROOT, &tracked),
            ErrorClass::Ignorable
        );
        assert_eq!(
            classify(&err(BadAccess as u8, X_GRAB_BUTTON, w), ROOT, &tracked),
            ErrorClass::Ignorable
        );
    }

    #[test]
    fn any_mismatch_is_logged() {
        let tracked = tracking(&[0x400001]);
        // Untracked window, otherwise ignorable.
        assert_eq!(
            classify(&err(BadWindow as u8, 12, 0x400002), ROOT, &tracked),
            ErrorClass::Logged
        );
        // Tracked window, but neither BadWindow nor focus/grab request.
        assert_eq!(
            classify(&err(8, 12, 0x400001), ROOT, &tracked),
            ErrorClass::Logged
        );
    }

    #[test]
    fn handler_queues_logged_errors_with_their_class() {
        let _guard = fresh_state(ROOT);
        deliver(BadWindow as u8, X_SET_INPUT_FOCUS, 0xabc);
        deliver(BadAccess as u8, 2, ROOT);
        assert_eq!(
            take_pending(),
            vec![
                (err(BadWindow as u8, X_SET_INPUT_FOCUS, 0xabc), ErrorClass::Logged),
                (err(BadAccess as u8, 2, ROOT), ErrorClass::Fatal),
            ]
        );
        assert!(take_pending().is_empty());
    }

    #[test]
    fn race_stays_ignored_after_client_is_forgotten() {
        let _guard = fresh_state(ROOT);
        track(0x400001);
        deliver(BadWindow as u8, 12, 0x400001);
        // The DestroyNotify read alongside the error is handled afterwards.
        untrack(0x400001);
        assert!(take_pending().is_empty());

        // Once forgotten, the same error is no longer a known race.
        deliver(BadWindow as u8, 12, 0x400001);
        assert_eq!(take_pending().len(), 1);
    }

    #[test]
    fn reset_forgets_previous_connection() {
        let _guard = fresh_state(ROOT);
        track(0x400001);
        deliver(8, 12, 0x400001);
        reset();
        assert!(take_pending().is_empty());
        assert!(lock(&TRACKED).windows.is_empty());
        assert_eq!(lock(&TRACKED).root, 0);
    }

    #[test]
    fn untrack_all_clears_snapshot() {
        let _guard = fresh_state(ROOT);
        track(1);
        track(2);
        untrack_all();
        deliver(BadWindow as u8, 12, 1);
        assert_eq!(take_pending().len(), 1);
    }

    #[test]
    fn dummy_handler_records_nothing() {
        let _guard = fresh_state(ROOT);
        let mut ev = x_error_event(BadAccess as u8, 2, ROOT);
        assert_eq!(unsafe { ignore_error(null_mut(), &mut ev) }, 0);
        assert!(take_pending().is_empty());
    }
}
