use std::ffi::CString;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::ptr::null_mut;

use log::warn;
use x11::xlib::XCreateFontSet;
use x11::xlib::XFontSet;
use x11::xlib::XFontStruct;
use x11::xlib::XFontsOfFontSet;
use x11::xlib::XFreeFontSet;
use x11::xlib::XFreeStringList;

use crate::display::Display;

const FALLBACK_FONT: &str = "fixed";

#[derive(Debug)]
pub struct FontSet {
    dpy: *mut x11::xlib::Display,
    set: XFontSet,
    pub ascent: i32,
    pub descent: i32,
    pub width: i32,
}

impl FontSet {
    /// Loads `pattern`, or the always-present `fixed` font if it can't be
    /// loaded.
    pub fn load(display: &Display, pattern: &str) -> Option<Self> {
        Self::try_load(display, pattern).or_else(|| {
            warn!("Can't load font '{}'", pattern);
            Self::try_load(display, FALLBACK_FONT)
        })
    }

    fn try_load(display: &Display, pattern: &str) -> Option<Self> {
        let pattern = CString::new(pattern).ok()?;
        let dpy = display.raw();
        let mut missing: *mut *mut c_char = null_mut();
        let mut n_missing: c_int = 0;
        let mut def_string: *mut c_char = null_mut();
        unsafe {
            let set = XCreateFontSet(
                dpy,
                pattern.as_ptr(),
                &mut missing,
                &mut n_missing,
                &mut def_string,
            );
            if !missing.is_null() {
                XFreeStringList(missing);
            }
            if set.is_null() {
                return None;
            }
            let mut fonts: *mut *mut XFontStruct = null_mut();
            let mut names: *mut *mut c_char = null_mut();
            let n = XFontsOfFontSet(set, &mut fonts, &mut names);
            let (ascent, descent, width) = if n > 0 && !fonts.is_null() && !(*fonts).is_null() {
                let bounds = (**fonts).max_bounds;
                (
                    bounds.ascent as i32,
                    bounds.descent as i32,
                    bounds.width as i32,
                )
            } else {
                (0, 0, 0)
            };
            Some(Self {
                dpy,
                set,
                ascent,
                descent,
                width,
            })
        }
    }
}

impl Drop for FontSet {
    fn drop(&mut self) {
        unsafe {
            XFreeFontSet(self.dpy, self.set);
        }
    }
}

/// Must be dropped before the [`Display`] it was loaded from.
#[derive(Debug)]
pub struct Theme {
    pub name: String,
    pub font: FontSet,
}
