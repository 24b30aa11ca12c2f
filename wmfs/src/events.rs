//! Dispatch of X events to the context.

use std::os::raw::c_uint;

use log::debug;
use log::trace;
use x11::xlib::ConfigureRequest;
use x11::xlib::DestroyNotify;
use x11::xlib::KeyCode;
use x11::xlib::KeyPress;
use x11::xlib::MapRequest;
use x11::xlib::MappingKeyboard;
use x11::xlib::MappingModifier;
use x11::xlib::MappingNotify;
use x11::xlib::UnmapNotify;
use x11::xlib::XConfigureRequestEvent;
use x11::xlib::XEvent;
use x11::xlib::XKeyEvent;
use x11::xlib::XWindowChanges;

use crate::command::CommandRegistry;
use crate::context::Context;
use crate::Geometry;

pub fn handle(ctx: &mut Context, commands: &CommandRegistry<Context>, ev: &XEvent) {
    let type_ = ev.get_type();
    trace!("event type {}", type_);
    match type_ {
        KeyPress => {
            let XKeyEvent { keycode, state, .. } = unsafe { ev.key };
            let command = ctx
                .binding_for(keycode as KeyCode, state)
                .map(|kb| kb.command.clone());
            match command {
                Some(line) => {
                    debug!("key binding: {}", line);
                    commands.dispatch(ctx, &line);
                }
                None => debug!("no binding for keycode {} state {:#x}", keycode, state),
            }
        }
        MapRequest => {
            let window = unsafe { ev.map_request.window };
            let wa = match ctx.display().window_attributes(window) {
                Some(wa) => wa,
                None => return,
            };
            if wa.override_redirect != 0 {
                return;
            }
            if !ctx.clients().contains(window) {
                let geometry = Geometry {
                    x: wa.x,
                    y: wa.y,
                    width: wa.width,
                    height: wa.height,
                };
                ctx.manage(window, geometry);
            }
            ctx.display().map_window(window);
        }
        ConfigureRequest => {
            let XConfigureRequestEvent {
                window,
                x,
                y,
                width,
                height,
                border_width,
                above,
                detail,
                value_mask,
                ..
            } = unsafe { ev.configure_request };
            let mut changes = XWindowChanges {
                x,
                y,
                width,
                height,
                border_width,
                sibling: above,
                stack_mode: detail,
            };
            ctx.display()
                .configure_window(window, value_mask as c_uint, &mut changes);
        }
        UnmapNotify => {
            ctx.unmanage(unsafe { ev.unmap.window });
        }
        DestroyNotify => {
            ctx.unmanage(unsafe { ev.destroy_window.window });
        }
        MappingNotify => {
            let mut mapping = unsafe { ev.mapping };
            ctx.display().refresh_keyboard_mapping(&mut mapping);
            if mapping.request == MappingKeyboard || mapping.request == MappingModifier {
                ctx.grab_keys();
            }
        }
        _ => {}
    }
}
