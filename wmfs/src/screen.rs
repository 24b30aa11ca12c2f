use log::info;

use crate::display::Display;
use crate::Geometry;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Screen {
    pub id: usize,
    pub geometry: Geometry,
}

/// One screen covering the whole default X screen. Multi-head layouts are
/// not detected.
pub fn init_screens(display: &Display) -> Vec<Screen> {
    let screen = Screen {
        id: 0,
        geometry: display.screen_geometry(),
    };
    info!(
        "screen {}: {}x{}",
        screen.id, screen.geometry.width, screen.geometry.height
    );
    vec![screen]
}
