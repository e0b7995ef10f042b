//! Pointer router
//!
//! Tracks the last known pointer position, establishes implicit grabs on
//! button press and translates wheel axis events into fixed scroll steps.

use log::{debug, trace};

use super::{Axis, ButtonFlags, ButtonState, DeviceId, DeviceProxy, OwnedDevice, PointerEvent};
use crate::display::DisplayHandle;
use crate::seat::{GrabToken, SeatView};

/// Cursor bookkeeping for the host's cursor image handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointerCursor {
    enter_serial: Option<u32>,
}

impl PointerCursor {
    /// Serial of the enter event the cursor image must be set against.
    pub fn enter_serial(&self) -> Option<u32> {
        self.enter_serial
    }
}

/// Routes `wl_pointer` callbacks of one seat.
#[derive(Debug)]
pub struct PointerRouter {
    device: OwnedDevice,
    cursor: PointerCursor,
    position: (f64, f64),
    scroll_step: i32,
}

impl PointerRouter {
    pub fn new(proxy: Box<dyn DeviceProxy>, scroll_step: i32) -> Self {
        Self {
            device: OwnedDevice::new(proxy),
            cursor: PointerCursor::default(),
            position: (0.0, 0.0),
            scroll_step,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn cursor(&self) -> &PointerCursor {
        &self.cursor
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn handle_event(
        &mut self,
        seat: SeatView<'_>,
        display: &DisplayHandle,
        event: PointerEvent,
    ) {
        let sink = display.sink();
        match event {
            PointerEvent::Enter {
                serial,
                surface,
                x,
                y,
            } => {
                let Some(surface) = surface else {
                    seat.focus.set_pointer_focus(None);
                    return;
                };
                let Some(window) = display.accepting_window_for_surface(surface, seat.name) else {
                    debug!("pointer enter on seat '{}' resolved no window", seat.name);
                    seat.focus.set_pointer_focus(None);
                    return;
                };
                sink.set_serial(serial);
                self.cursor.enter_serial = Some(serial);
                self.position = (x.to_f64(), y.to_f64());
                seat.focus.set_pointer_focus(Some(window));
                sink.pointer_enter(window, self.position.0, self.position.1);
            }
            PointerEvent::Leave { serial, .. } => {
                sink.set_serial(serial);
                sink.pointer_leave(seat.focus.pointer_focus(), self.position.0, self.position.1);
                seat.focus.set_pointer_focus(None);
                self.cursor.enter_serial = None;
            }
            PointerEvent::Motion { x, y, .. } => {
                self.position = (x.to_f64(), y.to_f64());
                if seat.focus.grab_excludes_focus() {
                    trace!("motion suppressed by grab on seat '{}'", seat.name);
                    return;
                }
                sink.motion_notify(self.position.0, self.position.1, self.device.id());
            }
            PointerEvent::Button {
                serial,
                button,
                state,
                ..
            } => {
                sink.set_serial(serial);
                if state == ButtonState::Pressed {
                    if let Some(focus) = seat.focus.pointer_focus() {
                        seat.focus.begin_grab(focus, GrabToken::Button(button));
                    }
                }

                if let Some(grab) = seat.focus.grab() {
                    sink.button_notify(
                        grab.window,
                        state,
                        ButtonFlags::from_button_code(button),
                        self.position.0,
                        self.position.1,
                        self.device.id(),
                    );
                }

                if state == ButtonState::Released {
                    seat.focus.end_grab(GrabToken::Button(button));
                }
            }
            PointerEvent::Axis { axis, value, .. } => {
                let offset = scroll_offset(value.0, self.scroll_step);
                let (dx, dy) = match axis {
                    Axis::HorizontalScroll => (offset, 0),
                    Axis::VerticalScroll => (0, offset),
                };
                sink.axis_notify(self.position.0, self.position.1, dx, dy, self.device.id());
            }
        }
    }
}

/// Natural-scroll inversion: positive raw motion scrolls by `-step`, anything
/// else (zero included) by `step`.
pub fn scroll_offset(raw: i32, step: i32) -> i32 {
    if raw > 0 {
        -step
    } else {
        step
    }
}
