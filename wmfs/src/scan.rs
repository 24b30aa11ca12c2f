use log::debug;
use log::info;
use x11::xlib::IsViewable;
use x11::xlib::Window;
use x11::xlib::XWindowAttributes;

use crate::context::Context;
use crate::Geometry;

/// What the scan needs to know about an existing top-level window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Candidate {
    pub window: Window,
    pub override_redirect: bool,
    pub viewable: bool,
    pub geometry: Geometry,
}

impl Candidate {
    pub fn from_attributes(window: Window, wa: &XWindowAttributes) -> Self {
        Self {
            window,
            override_redirect: wa.override_redirect != 0,
            viewable: wa.map_state == IsViewable,
            geometry: Geometry {
                x: wa.x,
                y: wa.y,
                width: wa.width,
                height: wa.height,
            },
        }
    }

    pub fn eligible(&self) -> bool {
        !self.override_redirect && self.viewable
    }
}

/// `stack` is bottom to top, as the server reports it. Adoption starts with
/// the topmost window.
pub fn adoption_order(stack: Vec<Candidate>) -> impl Iterator<Item = Candidate> {
    stack.into_iter().rev().filter(Candidate::eligible)
}

/// Adopts every viewable, non-override-redirect child of the root. Returns
/// the number of windows adopted.
pub fn scan(ctx: &mut Context) -> usize {
    let stack: Vec<Candidate> = {
        let display = ctx.display();
        display
            .query_tree(display.root())
            .into_iter()
            .filter_map(|w| {
                let wa = display.window_attributes(w);
                if wa.is_none() {
                    debug!("window {:#x} vanished during scan", w);
                }
                wa.map(|wa| Candidate::from_attributes(w, &wa))
            })
            .collect()
    };
    let total = stack.len();
    let mut adopted = 0;
    for c in adoption_order(stack) {
        if ctx.manage(c.window, c.geometry) {
            adopted += 1;
        }
    }
    info!("scan: adopted {} of {} existing windows", adopted, total);
    adopted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(window: Window, override_redirect: bool, viewable: bool) -> Candidate {
        Candidate {
            window,
            override_redirect,
            viewable,
            geometry: Geometry::default(),
        }
    }

    fn order(stack: Vec<Candidate>) -> Vec<Window> {
        adoption_order(stack).map(|c| c.window).collect()
    }

    #[test]
    fn topmost_first() {
        let stack = vec![
            window(1, false, true),
            window(2, false, true),
            window(3, false, true),
        ];
        assert_eq!(order(stack), vec![3, 2, 1]);
    }

    #[test]
    fn skips_override_redirect_and_unviewable() {
        let stack = vec![
            window(1, false, true),
            window(2, true, true),
            window(3, false, false),
            window(4, true, false),
            window(5, false, true),
        ];
        assert_eq!(order(stack), vec![5, 1]);
    }

    #[test]
    fn empty_tree() {
        assert!(order(Vec::new()).is_empty());
    }

    #[test]
    fn reads_attributes() {
        let mut wa: XWindowAttributes = unsafe { std::mem::zeroed() };
        wa.x = 10;
        wa.y = 20;
        wa.width = 300;
        wa.height = 200;
        wa.map_state = IsViewable;
        let c = Candidate::from_attributes(0x600001, &wa);
        assert!(c.eligible());
        assert_eq!(
            c.geometry,
            Geometry {
                x: 10,
                y: 20,
                width: 300,
                height: 200
            }
        );

        wa.override_redirect = 1;
        assert!(!Candidate::from_attributes(0x600001, &wa).eligible());
    }
}
