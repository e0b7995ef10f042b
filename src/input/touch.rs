//! Touch router

use log::{debug, trace};

use super::{DeviceId, DeviceProxy, OwnedDevice, TouchEvent, TouchType};
use crate::display::DisplayHandle;
use crate::seat::{GrabToken, SeatView};

/// Routes `wl_touch` callbacks of one seat.
///
/// Touch-point ids reported to the host are offset by a per-instance base so
/// that a re-created touch device never reuses the ids of its predecessor.
#[derive(Debug)]
pub struct TouchRouter {
    device: OwnedDevice,
    base_id: u32,
    position: (f64, f64),
}

impl TouchRouter {
    pub fn new(proxy: Box<dyn DeviceProxy>, base_id: u32) -> Self {
        Self {
            device: OwnedDevice::new(proxy),
            base_id,
            position: (0.0, 0.0),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn base_id(&self) -> u32 {
        self.base_id
    }

    pub fn translate_id(&self, id: i32) -> u32 {
        self.base_id.wrapping_add(id as u32)
    }

    pub fn handle_event(
        &mut self,
        seat: SeatView<'_>,
        display: &DisplayHandle,
        event: TouchEvent,
    ) {
        let sink = display.sink();
        match event {
            TouchEvent::Down {
                serial,
                time,
                surface,
                id,
                x,
                y,
            } => {
                sink.set_serial(serial);

                // Without a pointer nothing else sets focus, so take it from
                // the touched surface.
                if !seat.has_pointer {
                    let Some(surface) = surface else {
                        seat.focus.set_pointer_focus(None);
                        return;
                    };
                    let window = display.accepting_window_for_surface(surface, seat.name);
                    let Some(window) = window else {
                        debug!("touch down on seat '{}' resolved no window", seat.name);
                        return;
                    };
                    seat.focus.set_pointer_focus(Some(window));
                } else {
                    let accepted = seat
                        .focus
                        .pointer_focus()
                        .and_then(|focus| display.accepting_window(focus, seat.name));
                    if accepted.is_none() {
                        debug!("touch down on seat '{}' without accepting focus", seat.name);
                        return;
                    }
                }

                if let Some(focus) = seat.focus.pointer_focus() {
                    seat.focus.begin_grab(focus, GrabToken::Touch(id));
                }

                self.position = (x.to_f64(), y.to_f64());
                sink.touch_notify(
                    TouchType::Pressed,
                    self.position.0,
                    self.position.1,
                    self.translate_id(id),
                    time,
                    self.device.id(),
                );
            }
            TouchEvent::Up { serial, time, id } => {
                sink.set_serial(serial);
                sink.touch_notify(
                    TouchType::Released,
                    self.position.0,
                    self.position.1,
                    self.translate_id(id),
                    time,
                    self.device.id(),
                );
                seat.focus.end_grab(GrabToken::Touch(id));
            }
            TouchEvent::Motion { time, id, x, y } => {
                self.position = (x.to_f64(), y.to_f64());
                if seat.focus.grab_excludes_focus() {
                    trace!("touch motion suppressed by grab on seat '{}'", seat.name);
                    return;
                }
                sink.touch_notify(
                    TouchType::Moved,
                    self.position.0,
                    self.position.1,
                    self.translate_id(id),
                    time,
                    self.device.id(),
                );
            }
            TouchEvent::Frame => {}
            TouchEvent::Cancel => {
                let token = seat.focus.grab().map_or(0, |grab| grab.token.raw());
                sink.touch_notify(
                    TouchType::Cancelled,
                    self.position.0,
                    self.position.1,
                    token,
                    0,
                    self.device.id(),
                );
                seat.focus.clear_grab();
            }
        }
    }
}
