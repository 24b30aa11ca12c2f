use std::os::raw::c_uint;

use log::info;
use log::warn;
use x11::xlib::KeyCode;
use x11::xlib::NoEventMask;
use x11::xlib::PropertyChangeMask;
use x11::xlib::StructureNotifyMask;
use x11::xlib::Window;

use crate::client::Client;
use crate::client::ClientSet;
use crate::command::Lifecycle;
use crate::config::Config;
use crate::display::Display;
use crate::error::Error;
use crate::error::Result;
use crate::ewmh::Ewmh;
use crate::fifo::CommandChannel;
use crate::keys::clean_state;
use crate::keys::grab_variants;
use crate::keys::KeyBinding;
use crate::keys::KeyCombo;
use crate::screen::Screen;
use crate::theme::FontSet;
use crate::theme::Theme;
use crate::xerror;
use crate::xerror::ErrorClass;
use crate::Geometry;

/// State shared by every part of the window manager. There is one per
/// [`crate::Wm`]; everything else borrows it.
pub struct Context {
    running: bool,
    reload: bool,
    lock_mask: c_uint,
    pub(crate) channel: CommandChannel,
    pub(crate) screens: Vec<Screen>,
    pub(crate) ewmh: Option<Ewmh>,
    clients: ClientSet,
    keybinds: Vec<KeyBinding>,
    themes: Vec<Theme>,
    // Declared last: fonts and windows above go before the connection.
    display: Display,
}

impl Context {
    pub fn new(display: Display) -> Self {
        let channel = CommandChannel::for_display(&display.name());
        Self {
            running: true,
            reload: false,
            lock_mask: 0,
            channel,
            screens: Vec::new(),
            ewmh: None,
            clients: ClientSet::new(),
            keybinds: Vec::new(),
            themes: Vec::new(),
            display,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn reload_requested(&self) -> bool {
        self.reload
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    /// Starts managing `window`. Returns false if it already was.
    pub fn manage(&mut self, window: Window, geometry: Geometry) -> bool {
        if self.clients.contains(window) {
            return false;
        }
        xerror::track(window);
        self.display
            .select_input(window, PropertyChangeMask | StructureNotifyMask);
        self.clients.insert(Client::new(window, geometry));
        info!("managing window {:#x}", window);
        self.update_client_list();
        true
    }

    pub fn unmanage(&mut self, window: Window) -> Option<Client> {
        let client = self.clients.remove(window)?;
        xerror::untrack(window);
        info!("unmanaged window {:#x}", window);
        self.update_client_list();
        Some(client)
    }

    fn update_client_list(&self) {
        if let Some(ewmh) = &self.ewmh {
            ewmh.update_client_list(&self.display, &self.clients.windows());
        }
    }

    /// Replaces the key bindings and themes with those of `config`.
    /// Bindings that don't parse are skipped.
    pub fn load_config(&mut self, config: &Config) {
        self.keybinds = config
            .keybinds
            .iter()
            .filter_map(|kb| match KeyCombo::parse(&kb.key) {
                Some(combo) => Some(KeyBinding {
                    combo,
                    command: kb.cmd.clone(),
                }),
                None => {
                    warn!("ignoring binding with bad key '{}'", kb.key);
                    None
                }
            })
            .collect();
        self.themes = config
            .themes
            .iter()
            .filter_map(|t| {
                let font = FontSet::load(&self.display, &t.font);
                if font.is_none() {
                    warn!("theme '{}' has no usable font", t.name);
                }
                font.map(|font| Theme {
                    name: t.name.clone(),
                    font,
                })
            })
            .collect();
        info!(
            "{} key bindings, {} themes",
            self.keybinds.len(),
            self.themes.len()
        );
    }

    /// Recomputes the Num Lock mask and grabs every binding under each lock
    /// combination.
    pub fn grab_keys(&mut self) {
        self.lock_mask = self.display.numlock_mask();
        self.display.ungrab_all_keys();
        for kb in &self.keybinds {
            let keycode = self.display.keysym_to_keycode(kb.combo.key_sym);
            if keycode == 0 {
                warn!("no keycode for {}", kb.combo);
                continue;
            }
            for mods in grab_variants(kb.combo.x_modifiers(), self.lock_mask) {
                self.display.grab_key(keycode, mods);
            }
        }
    }

    /// The binding a key press triggers, ignoring lock keys.
    pub fn binding_for(&self, keycode: KeyCode, state: c_uint) -> Option<&KeyBinding> {
        let key_sym = self.display.keycode_to_keysym(keycode);
        let combo = KeyCombo::from_x(key_sym, clean_state(state, self.lock_mask));
        self.keybinds.iter().find(|kb| kb.combo == combo)
    }

    /// Reports the protocol errors recorded since the last call.
    pub fn check_errors(&self) -> Result<()> {
        for (err, class) in xerror::take_pending() {
            match class {
                ErrorClass::Fatal => return Err(Error::OtherWindowManager),
                ErrorClass::Ignorable => {}
                ErrorClass::Logged => warn!(
                    "X error: {} (code {}), request {}.{}, resource {:#x}",
                    self.display.error_text(err.error_code),
                    err.error_code,
                    err.request_code,
                    err.minor_code,
                    err.resource
                ),
            }
        }
        Ok(())
    }

    pub(crate) fn release_screens(&mut self) {
        self.screens.clear();
        if let Some(ewmh) = self.ewmh.take() {
            ewmh.release(&self.display);
        }
    }

    pub(crate) fn release_gc(&mut self) {
        self.display.release_gc();
    }

    /// Stops listening to every client. The windows themselves stay.
    pub(crate) fn release_clients(&mut self) {
        let clients = self.clients.take_all();
        xerror::untrack_all();
        let display = &self.display;
        xerror::with_errors_suppressed(display, || {
            for c in &clients {
                display.select_input(c.window, NoEventMask);
            }
        });
        info!("released {} clients", clients.len());
    }

    pub(crate) fn release_config(&mut self) {
        self.themes.clear();
        self.keybinds.clear();
    }
}

impl Lifecycle for Context {
    fn stop(&mut self) {
        self.running = false;
    }

    fn request_reload(&mut self) {
        self.reload = true;
    }
}
