use std::ffi::CStr;
use std::ffi::CString;
use std::os::raw::c_uint;

use x11::xlib::ControlMask;
use x11::xlib::KeySym;
use x11::xlib::LockMask;
use x11::xlib::Mod1Mask;
use x11::xlib::Mod2Mask;
use x11::xlib::Mod3Mask;
use x11::xlib::Mod4Mask;
use x11::xlib::Mod5Mask;
use x11::xlib::ShiftMask;
use x11::xlib::XKeysymToString;
use x11::xlib::XStringToKeysym;

#[derive(Hash, Eq, PartialEq, Copy, Clone, Debug)]
pub struct KeyCombo {
    pub key_sym: KeySym,
    pub shift: bool,
    pub lock: bool,
    pub control: bool,
    pub mod1: bool,
    pub mod2: bool,
    pub mod3: bool,
    pub mod4: bool,
    pub mod5: bool,
}

impl KeyCombo {
    pub fn x_modifiers(&self) -> c_uint {
        self.shift.then(|| ShiftMask).unwrap_or(0)
            | self.lock.then(|| LockMask).unwrap_or(0)
            | self.control.then(|| ControlMask).unwrap_or(0)
            | self.mod1.then(|| Mod1Mask).unwrap_or(0)
            | self.mod2.then(|| Mod2Mask).unwrap_or(0)
            | self.mod3.then(|| Mod3Mask).unwrap_or(0)
            | self.mod4.then(|| Mod4Mask).unwrap_or(0)
            | self.mod5.then(|| Mod5Mask).unwrap_or(0)
    }

    pub fn from_x(key_sym: KeySym, state: c_uint) -> Self {
        Self {
            key_sym,
            shift: (state & ShiftMask) != 0,
            lock: (state & LockMask) != 0,
            control: (state & ControlMask) != 0,
            mod1: (state & Mod1Mask) != 0,
            mod2: (state & Mod2Mask) != 0,
            mod3: (state & Mod3Mask) != 0,
            mod4: (state & Mod4Mask) != 0,
            mod5: (state & Mod5Mask) != 0,
        }
    }

    /// Parses `mod4+shift+Return`. The part that is not a modifier name
    /// is resolved through `lookup`.
    pub fn parse_with(s: &str, lookup: impl Fn(&str) -> Option<KeySym>) -> Option<Self> {
        let mut combo = Self::from_x(0, 0);
        let mut ks = None;
        for part in s.split('+') {
            match part.trim() {
                "shift" => combo.shift = true,
                "lock" => combo.lock = true,
                "control" | "ctrl" => combo.control = true,
                "mod1" | "alt" => combo.mod1 = true,
                "mod2" => combo.mod2 = true,
                "mod3" => combo.mod3 = true,
                "mod4" | "super" => combo.mod4 = true,
                "mod5" => combo.mod5 = true,
                "" => return None,
                part => {
                    if ks.is_some() {
                        return None;
                    }
                    ks = Some(lookup(part)?);
                }
            }
        }
        combo.key_sym = ks?;
        Some(combo)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_with(s, keysym_from_name)
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (set, name) in [
            (self.shift, "shift"),
            (self.lock, "lock"),
            (self.control, "control"),
            (self.mod1, "mod1"),
            (self.mod2, "mod2"),
            (self.mod3, "mod3"),
            (self.mod4, "mod4"),
            (self.mod5, "mod5"),
        ] {
            if set {
                write!(f, "{}+", name)?;
            }
        }
        let name = unsafe { XKeysymToString(self.key_sym) };
        if name.is_null() {
            write!(f, "{:#x}", self.key_sym)
        } else {
            write!(f, "{}", unsafe { CStr::from_ptr(name) }.to_string_lossy())
        }
    }
}

fn keysym_from_name(name: &str) -> Option<KeySym> {
    let name = CString::new(name).ok()?;
    match unsafe { XStringToKeysym(name.as_ptr()) } {
        0 => None,
        sym => Some(sym),
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KeyBinding {
    pub combo: KeyCombo,
    /// A full command line, in the same syntax the FIFO accepts.
    pub command: String,
}

/// The modifier sets a binding is grabbed under, so it fires whatever the
/// state of Caps Lock and Num Lock.
pub fn grab_variants(modifiers: c_uint, numlock: c_uint) -> [c_uint; 4] {
    [
        modifiers,
        modifiers | LockMask,
        modifiers | numlock,
        modifiers | LockMask | numlock,
    ]
}

/// Drops lock bits and anything that is not a modifier from a key event
/// state.
pub fn clean_state(state: c_uint, numlock: c_uint) -> c_uint {
    state
        & !(numlock | LockMask)
        & (ShiftMask | ControlMask | Mod1Mask | Mod2Mask | Mod3Mask | Mod4Mask | Mod5Mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11::xlib::Button1Mask;

    const XK_RETURN: KeySym = 0xff0d;
    const XK_R: KeySym = 0x72;

    fn fake_lookup(name: &str) -> Option<KeySym> {
        match name {
            "Return" => Some(XK_RETURN),
            "r" => Some(XK_R),
            _ => None,
        }
    }

    #[test]
    fn parses_modifiers_and_key() {
        let combo = KeyCombo::parse_with("mod4+control+r", fake_lookup).unwrap();
        assert_eq!(combo.key_sym, XK_R);
        assert!(combo.mod4 && combo.control);
        assert!(!combo.shift && !combo.mod1);
        assert_eq!(combo.x_modifiers(), Mod4Mask | ControlMask);
    }

    #[test]
    fn aliases() {
        let a = KeyCombo::parse_with("super+alt+Return", fake_lookup).unwrap();
        let b = KeyCombo::parse_with("mod4+mod1+Return", fake_lookup).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_combos() {
        assert_eq!(KeyCombo::parse_with("mod4+Nope", fake_lookup), None);
        assert_eq!(KeyCombo::parse_with("mod4+shift", fake_lookup), None);
        assert_eq!(KeyCombo::parse_with("r+Return", fake_lookup), None);
        assert_eq!(KeyCombo::parse_with("mod4++r", fake_lookup), None);
    }

    #[test]
    fn from_x_round_trips_modifiers() {
        let state = ShiftMask | Mod1Mask;
        assert_eq!(KeyCombo::from_x(XK_R, state).x_modifiers(), state);
    }

    #[test]
    fn four_grab_variants() {
        let v = grab_variants(Mod4Mask, Mod2Mask);
        assert_eq!(
            v,
            [
                Mod4Mask,
                Mod4Mask | LockMask,
                Mod4Mask | Mod2Mask,
                Mod4Mask | LockMask | Mod2Mask,
            ]
        );
    }

    #[test]
    fn clean_state_strips_locks_and_buttons() {
        let state = Mod4Mask | LockMask | Mod2Mask | Button1Mask;
        assert_eq!(clean_state(state, Mod2Mask), Mod4Mask);
        // Without a numlock modifier, Mod2 is a regular modifier.
        assert_eq!(clean_state(Mod2Mask | LockMask, 0), Mod2Mask);
    }
}
