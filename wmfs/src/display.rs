use std::ffi::CStr;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_long;
use std::os::raw::c_uchar;
use std::os::raw::c_uint;
use std::os::raw::c_ulong;
use std::os::unix::io::RawFd;
use std::ptr::null;
use std::ptr::null_mut;

use log::debug;
use x11::keysym::XK_Num_Lock;
use x11::xlib::AnyKey;
use x11::xlib::AnyModifier;
use x11::xlib::Atom;
use x11::xlib::ButtonPressMask;
use x11::xlib::ButtonReleaseMask;
use x11::xlib::CWCursor;
use x11::xlib::CWEventMask;
use x11::xlib::Cursor;
use x11::xlib::GCFunction;
use x11::xlib::GCLineWidth;
use x11::xlib::GCSubwindowMode;
use x11::xlib::GXinvert;
use x11::xlib::GrabModeAsync;
use x11::xlib::IncludeInferiors;
use x11::xlib::KeyCode;
use x11::xlib::KeyPressMask;
use x11::xlib::KeyReleaseMask;
use x11::xlib::KeySym;
use x11::xlib::PointerMotionMask;
use x11::xlib::PropModeReplace;
use x11::xlib::PropertyChangeMask;
use x11::xlib::StructureNotifyMask;
use x11::xlib::SubstructureNotifyMask;
use x11::xlib::SubstructureRedirectMask;
use x11::xlib::Window;
use x11::xlib::XChangeProperty;
use x11::xlib::XChangeWindowAttributes;
use x11::xlib::XCloseDisplay;
use x11::xlib::XConfigureWindow;
use x11::xlib::XConnectionNumber;
use x11::xlib::XCreateFontCursor;
use x11::xlib::XCreateGC;
use x11::xlib::XCreateSimpleWindow;
use x11::xlib::XDefaultScreen;
use x11::xlib::XDeleteProperty;
use x11::xlib::XDestroyWindow;
use x11::xlib::XDisplayHeight;
use x11::xlib::XDisplayString;
use x11::xlib::XDisplayWidth;
use x11::xlib::XEvent;
use x11::xlib::XFree;
use x11::xlib::XFreeCursor;
use x11::xlib::XFreeGC;
use x11::xlib::XFreeModifiermap;
use x11::xlib::XGCValues;
use x11::xlib::XGetErrorText;
use x11::xlib::XGetModifierMapping;
use x11::xlib::XGetWindowAttributes;
use x11::xlib::XGrabKey;
use x11::xlib::XInternAtom;
use x11::xlib::XKeycodeToKeysym;
use x11::xlib::XKeysymToKeycode;
use x11::xlib::XMapWindow;
use x11::xlib::XMappingEvent;
use x11::xlib::XNextEvent;
use x11::xlib::XOpenDisplay;
use x11::xlib::XPending;
use x11::xlib::XQLength;
use x11::xlib::XQueryTree;
use x11::xlib::XRefreshKeyboardMapping;
use x11::xlib::XRootWindow;
use x11::xlib::XSelectInput;
use x11::xlib::XSetWindowAttributes;
use x11::xlib::XSync;
use x11::xlib::XUngrabKey;
use x11::xlib::XWindowAttributes;
use x11::xlib::XWindowChanges;
use x11::xlib::GC;

use crate::error::Error;
use crate::error::Result;
use crate::xerror;
use crate::Geometry;

// From <X11/cursorfont.h>
const XC_LEFT_PTR: c_uint = 68;

pub const ROOT_EVENT_MASK: c_long = KeyPressMask
    | KeyReleaseMask
    | ButtonPressMask
    | ButtonReleaseMask
    | PointerMotionMask
    | PropertyChangeMask
    | SubstructureRedirectMask
    | SubstructureNotifyMask
    | StructureNotifyMask;

/// The connection to the X server, plus the root window and the drawing
/// context owned by the window manager.
#[derive(Debug)]
pub struct Display {
    dpy: *mut x11::xlib::Display,
    screen: c_int,
    root: Window,
    rgc: GC,
    cursor: Cursor,
}

impl Display {
    /// `None` connects to `$DISPLAY`.
    pub fn connect(name: Option<&str>) -> Result<Self> {
        let shown = name
            .map(str::to_owned)
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_default();
        let c_name = match name {
            Some(n) => Some(CString::new(n).map_err(|_| Error::NoDisplay(shown.clone()))?),
            None => None,
        };
        let dpy = unsafe { XOpenDisplay(c_name.as_ref().map(|c| c.as_ptr()).unwrap_or(null())) };
        if dpy.is_null() {
            return Err(Error::NoDisplay(shown));
        }
        Ok(Self {
            dpy,
            screen: 0,
            root: 0,
            rgc: null_mut(),
            cursor: 0,
        })
    }

    /// Installs the protocol error handler and takes over the root window.
    /// An already running window manager shows up as a BadAccess error on
    /// the root, recorded by the handler during the final sync.
    pub fn configure_root(&mut self) {
        unsafe {
            self.screen = XDefaultScreen(self.dpy);
            self.root = XRootWindow(self.dpy, self.screen);
            xerror::install(self.root);

            self.cursor = XCreateFontCursor(self.dpy, XC_LEFT_PTR);
            let mut at: XSetWindowAttributes = std::mem::zeroed();
            at.event_mask = ROOT_EVENT_MASK;
            at.cursor = self.cursor;
            XChangeWindowAttributes(
                self.dpy,
                self.root,
                (CWEventMask | CWCursor) as c_ulong,
                &mut at,
            );

            let mut xgc: XGCValues = std::mem::zeroed();
            xgc.function = GXinvert;
            xgc.subwindow_mode = IncludeInferiors;
            xgc.line_width = 1;
            self.rgc = XCreateGC(
                self.dpy,
                self.root,
                (GCFunction | GCSubwindowMode | GCLineWidth) as c_ulong,
                &mut xgc,
            );

            // Font sets follow the user's locale.
            libc::setlocale(libc::LC_CTYPE, b"\0".as_ptr() as *const c_char);
        }
        self.sync(false);
    }

    pub fn raw(&self) -> *mut x11::xlib::Display {
        self.dpy
    }

    pub fn root(&self) -> Window {
        self.root
    }

    /// The display string the connection was opened with, e.g. `:0.0`.
    pub fn name(&self) -> String {
        unsafe {
            let s = XDisplayString(self.dpy);
            if s.is_null() {
                return String::new();
            }
            CStr::from_ptr(s).to_string_lossy().into_owned()
        }
    }

    pub fn screen_geometry(&self) -> Geometry {
        unsafe {
            Geometry {
                x: 0,
                y: 0,
                width: XDisplayWidth(self.dpy, self.screen),
                height: XDisplayHeight(self.dpy, self.screen),
            }
        }
    }

    pub fn connection_fd(&self) -> RawFd {
        unsafe { XConnectionNumber(self.dpy) as RawFd }
    }

    /// Events already read into Xlib's queue; performs no I/O.
    pub fn queued(&self) -> bool {
        unsafe { XQLength(self.dpy) > 0 }
    }

    pub fn pending(&self) -> bool {
        unsafe { XPending(self.dpy) > 0 }
    }

    pub fn next_event(&self) -> XEvent {
        let mut e = MaybeUninit::<XEvent>::uninit();
        unsafe {
            XNextEvent(self.dpy, e.as_mut_ptr());
            e.assume_init()
        }
    }

    pub fn sync(&self, discard: bool) {
        unsafe {
            XSync(self.dpy, discard as c_int);
        }
    }

    pub fn error_text(&self, code: u8) -> String {
        let mut buf = [0 as c_char; 128];
        unsafe {
            XGetErrorText(self.dpy, code as c_int, buf.as_mut_ptr(), buf.len() as c_int);
            CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
        }
    }

    pub fn intern_atom(&self, name: &CStr) -> Atom {
        unsafe { XInternAtom(self.dpy, name.as_ptr(), 0) }
    }

    /// Children of `window`, bottom of the stack first.
    pub fn query_tree(&self, window: Window) -> Vec<Window> {
        let mut root_return: Window = 0;
        let mut parent_return: Window = 0;
        let mut children: *mut Window = null_mut();
        let mut n: c_uint = 0;
        unsafe {
            if XQueryTree(
                self.dpy,
                window,
                &mut root_return,
                &mut parent_return,
                &mut children,
                &mut n,
            ) == 0
            {
                return Vec::new();
            }
            let out = if children.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(children, n as usize).to_vec()
            };
            if !children.is_null() {
                XFree(children as *mut _);
            }
            out
        }
    }

    pub fn window_attributes(&self, window: Window) -> Option<XWindowAttributes> {
        let mut wa = MaybeUninit::<XWindowAttributes>::uninit();
        unsafe {
            if XGetWindowAttributes(self.dpy, window, wa.as_mut_ptr()) == 0 {
                None
            } else {
                Some(wa.assume_init())
            }
        }
    }

    pub fn select_input(&self, window: Window, mask: c_long) {
        unsafe {
            XSelectInput(self.dpy, window, mask);
        }
    }

    pub fn keysym_to_keycode(&self, keysym: KeySym) -> KeyCode {
        unsafe { XKeysymToKeycode(self.dpy, keysym) }
    }

    pub fn keycode_to_keysym(&self, keycode: KeyCode) -> KeySym {
        unsafe { XKeycodeToKeysym(self.dpy, keycode, 0) }
    }

    /// Modifier bit the Num Lock key is bound to, or 0.
    pub fn numlock_mask(&self) -> c_uint {
        unsafe {
            let numlock = XKeysymToKeycode(self.dpy, XK_Num_Lock as KeySym);
            let mm = XGetModifierMapping(self.dpy);
            if mm.is_null() {
                return 0;
            }
            let per_modifier = (*mm).max_keypermod.max(0) as usize;
            let mask = if (*mm).modifiermap.is_null() {
                0
            } else {
                let map = std::slice::from_raw_parts((*mm).modifiermap, 8 * per_modifier);
                numlock_mask(map, per_modifier, numlock)
            };
            XFreeModifiermap(mm);
            debug!("numlock mask is {:#x}", mask);
            mask
        }
    }

    pub fn ungrab_all_keys(&self) {
        unsafe {
            XUngrabKey(self.dpy, AnyKey as c_int, AnyModifier as c_uint, self.root);
        }
    }

    pub fn grab_key(&self, keycode: KeyCode, modifiers: c_uint) {
        unsafe {
            XGrabKey(
                self.dpy,
                keycode as c_int,
                modifiers,
                self.root,
                1,
                GrabModeAsync,
                GrabModeAsync,
            );
        }
    }

    /// An unmapped 1x1 child of the root, never shown.
    pub fn create_hidden_window(&self) -> Window {
        unsafe { XCreateSimpleWindow(self.dpy, self.root, -1, -1, 1, 1, 0, 0, 0) }
    }

    pub fn destroy_window(&self, window: Window) {
        unsafe {
            XDestroyWindow(self.dpy, window);
        }
    }

    pub fn map_window(&self, window: Window) {
        unsafe {
            XMapWindow(self.dpy, window);
        }
    }

    pub fn configure_window(&self, window: Window, value_mask: c_uint, changes: &mut XWindowChanges) {
        unsafe {
            XConfigureWindow(self.dpy, window, value_mask, changes);
        }
    }

    pub fn refresh_keyboard_mapping(&self, ev: &mut XMappingEvent) {
        unsafe {
            XRefreshKeyboardMapping(ev);
        }
    }

    /// Replaces `property` with a list of 32-bit items (atoms or windows).
    pub fn set_property_32(&self, window: Window, property: Atom, type_: Atom, data: &[c_ulong]) {
        unsafe {
            XChangeProperty(
                self.dpy,
                window,
                property,
                type_,
                32,
                PropModeReplace,
                data.as_ptr() as *const c_uchar,
                data.len() as c_int,
            );
        }
    }

    pub fn set_property_8(&self, window: Window, property: Atom, type_: Atom, data: &[u8]) {
        unsafe {
            XChangeProperty(
                self.dpy,
                window,
                property,
                type_,
                8,
                PropModeReplace,
                data.as_ptr(),
                data.len() as c_int,
            );
        }
    }

    pub fn delete_property(&self, window: Window, property: Atom) {
        unsafe {
            XDeleteProperty(self.dpy, window, property);
        }
    }

    /// Frees the window manager's own drawing context and cursor.
    pub fn release_gc(&mut self) {
        unsafe {
            if !self.rgc.is_null() {
                XFreeGC(self.dpy, self.rgc);
                self.rgc = null_mut();
            }
            if self.cursor != 0 {
                XFreeCursor(self.dpy, self.cursor);
                self.cursor = 0;
            }
        }
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        self.release_gc();
        unsafe {
            XCloseDisplay(self.dpy);
        }
        xerror::reset();
    }
}

/// Searches the 8 modifier rows of a modifier map for `numlock`. Each row
/// holds `per_modifier` keycodes; the last row containing it wins.
pub fn numlock_mask(modmap: &[KeyCode], per_modifier: usize, numlock: KeyCode) -> c_uint {
    if numlock == 0 || per_modifier == 0 {
        return 0;
    }
    modmap
        .chunks(per_modifier)
        .take(8)
        .enumerate()
        .filter(|(_, row)| row.contains(&numlock))
        .last()
        .map(|(i, _)| 1 << i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // shift, lock, control, mod1..mod5 with 2 keycodes each
    const MODMAP: [KeyCode; 16] = [
        50, 62, // shift
        66, 0, // lock
        37, 105, // control
        64, 108, // mod1
        77, 0, // mod2: Num_Lock
        0, 0, // mod3
        133, 134, // mod4
        92, 0, // mod5
    ];

    #[test]
    fn finds_numlock_row() {
        assert_eq!(numlock_mask(&MODMAP, 2, 77), 1 << 4);
    }

    #[test]
    fn stable_for_unchanged_mapping() {
        let first = numlock_mask(&MODMAP, 2, 77);
        let second = numlock_mask(&MODMAP, 2, 77);
        assert_eq!(first, second);
    }

    #[test]
    fn missing_key_gives_zero() {
        assert_eq!(numlock_mask(&MODMAP, 2, 200), 0);
    }

    #[test]
    fn unmapped_numlock_does_not_match_empty_slots() {
        // Keycode 0 means Num_Lock has no key; empty slots are also 0.
        assert_eq!(numlock_mask(&MODMAP, 2, 0), 0);
    }

    #[test]
    fn root_mask_covers_required_events() {
        for mask in [
            KeyPressMask,
            ButtonPressMask,
            PointerMotionMask,
            PropertyChangeMask,
            SubstructureRedirectMask,
            SubstructureNotifyMask,
            StructureNotifyMask,
        ] {
            assert_eq!(ROOT_EVENT_MASK & mask, mask);
        }
    }
}
