//! Minimal EWMH support: a supporting-WM check window and the client list.

use std::ffi::CStr;
use std::os::raw::c_ulong;

use log::debug;
use x11::xlib::Atom;
use x11::xlib::Window;
use x11::xlib::XA_ATOM;
use x11::xlib::XA_WINDOW;

use crate::display::Display;

const WM_NAME: &str = "wmfs";

#[derive(Debug, Copy, Clone)]
pub struct Atoms {
    pub supported: Atom,
    pub supporting_wm_check: Atom,
    pub wm_name: Atom,
    pub client_list: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    fn intern(display: &Display) -> Self {
        let atom = |name: &[u8]| {
            display.intern_atom(CStr::from_bytes_with_nul(name).unwrap_or_default())
        };
        Self {
            supported: atom(b"_NET_SUPPORTED\0"),
            supporting_wm_check: atom(b"_NET_SUPPORTING_WM_CHECK\0"),
            wm_name: atom(b"_NET_WM_NAME\0"),
            client_list: atom(b"_NET_CLIENT_LIST\0"),
            utf8_string: atom(b"UTF8_STRING\0"),
        }
    }

    fn supported(&self) -> [Atom; 4] {
        [
            self.supported,
            self.supporting_wm_check,
            self.wm_name,
            self.client_list,
        ]
    }
}

#[derive(Debug)]
pub struct Ewmh {
    pub atoms: Atoms,
    check: Window,
}

impl Ewmh {
    pub fn init(display: &Display) -> Self {
        let atoms = Atoms::intern(display);
        let root = display.root();
        let check = display.create_hidden_window();
        for w in [root, check] {
            display.set_property_32(
                w,
                atoms.supporting_wm_check,
                XA_WINDOW,
                &[check as c_ulong],
            );
        }
        display.set_property_8(
            check,
            atoms.wm_name,
            atoms.utf8_string,
            WM_NAME.as_bytes(),
        );
        display.set_property_32(root, atoms.supported, XA_ATOM, &atoms.supported());
        display.set_property_32(root, atoms.client_list, XA_WINDOW, &[]);
        debug!("ewmh check window {:#x}", check);
        Self { atoms, check }
    }

    pub fn update_client_list(&self, display: &Display, windows: &[Window]) {
        display.set_property_32(
            display.root(),
            self.atoms.client_list,
            XA_WINDOW,
            windows,
        );
    }

    /// Removes everything [`Ewmh::init`] put on the root.
    pub fn release(self, display: &Display) {
        let root = display.root();
        for prop in [
            self.atoms.supported,
            self.atoms.supporting_wm_check,
            self.atoms.client_list,
        ] {
            display.delete_property(root, prop);
        }
        display.destroy_window(self.check);
    }
}
