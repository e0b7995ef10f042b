//! Keyboard router

use log::{debug, trace};

use super::{DeviceId, DeviceProxy, KeyboardEvent, KeymapFormat, OwnedDevice};
use crate::display::DisplayHandle;
use crate::seat::SeatView;

/// Routes `wl_keyboard` callbacks of one seat.
#[derive(Debug)]
pub struct KeyboardRouter {
    device: OwnedDevice,
}

impl KeyboardRouter {
    pub fn new(proxy: Box<dyn DeviceProxy>) -> Self {
        Self {
            device: OwnedDevice::new(proxy),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn handle_event(
        &mut self,
        seat: SeatView<'_>,
        display: &DisplayHandle,
        event: KeyboardEvent,
    ) {
        match event {
            KeyboardEvent::Keymap { format, fd, size } => {
                if format != KeymapFormat::XkbV1 {
                    debug!("ignoring keymap in unsupported format {:?}", format);
                    // Dropping the descriptor closes it.
                    drop(fd);
                    return;
                }
                display.sink().initialize_keymap(fd, size);
            }
            KeyboardEvent::Enter { serial, surface } => {
                display.sink().set_serial(serial);
                let window = surface
                    .and_then(|surface| display.accepting_window_for_surface(surface, seat.name));
                seat.focus.set_keyboard_focus(window);
                match window {
                    Some(window) => display.sink().keyboard_enter(window),
                    None => debug!("keyboard enter on seat '{}' resolved no window", seat.name),
                }
            }
            KeyboardEvent::Leave { serial, surface } => {
                display.sink().set_serial(serial);
                let window = surface
                    .and_then(|surface| display.windows().window_for_surface(surface))
                    .map(|window| window.handle())
                    .or(seat.focus.keyboard_focus());
                seat.focus.set_keyboard_focus(None);
                if let Some(window) = window {
                    display.sink().keyboard_leave(window);
                }
            }
            KeyboardEvent::Key {
                serial, key, state, ..
            } => {
                let Some(focused) = seat.focus.keyboard_focus() else {
                    debug!("key {} on seat '{}' dropped: no focused window", key, seat.name);
                    return;
                };
                if display.accepting_window(focused, seat.name).is_none() {
                    trace!("window {:?} rejects seat '{}'", focused, seat.name);
                    return;
                }
                display.sink().set_serial(serial);
                display.sink().key_notify(state, key, self.device.id());
            }
            KeyboardEvent::Modifiers {
                depressed,
                latched,
                locked,
                group,
                ..
            } => {
                trace!(
                    "modifiers depressed={:#x} latched={:#x} locked={:#x} group={}",
                    depressed,
                    latched,
                    locked,
                    group
                );
            }
        }
    }
}
