use x11::xlib::Window;

use crate::Geometry;

/// One adopted top-level window.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Client {
    pub window: Window,
    pub geometry: Geometry,
}

impl Client {
    pub fn new(window: Window, geometry: Geometry) -> Self {
        Self { window, geometry }
    }
}

/// Managed clients in adoption order. Only transient lookups by window id
/// leave this collection.
#[derive(Debug, Default)]
pub struct ClientSet {
    clients: Vec<Client>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, window: Window) -> bool {
        self.clients.iter().any(|c| c.window == window)
    }

    /// Returns false if the window was already tracked.
    pub fn insert(&mut self, client: Client) -> bool {
        if self.contains(client.window) {
            return false;
        }
        self.clients.push(client);
        true
    }

    pub fn remove(&mut self, window: Window) -> Option<Client> {
        let idx = self.clients.iter().position(|c| c.window == window)?;
        Some(self.clients.remove(idx))
    }

    /// Empties the set, handing back every client in adoption order.
    pub fn take_all(&mut self) -> Vec<Client> {
        std::mem::take(&mut self.clients)
    }

    pub fn windows(&self) -> Vec<Window> {
        self.clients.iter().map(|c| c.window).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
