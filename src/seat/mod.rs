//! Seat registry
//!
//! Keeps one [`Seat`] per announced `wl_seat`, creates and drops the device
//! routers as capabilities come and go, and forwards device callbacks to the
//! right router together with the seat's focus/grab state.
//!
//! The registry is owned by the dispatcher worker; nothing here locks.

use log::{debug, info, warn};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::InputConfig;
use crate::display::DisplayHandle;
use crate::input::{
    Capabilities, DeviceId, DeviceKind, DeviceProxy, KeyboardEvent, KeyboardRouter, PointerEvent,
    PointerRouter, TouchEvent, TouchRouter,
};

mod focus;

pub use focus::{FocusGrabState, Grab, GrabToken};

/// Opaque seat identifier (the `wl_seat` global name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId(pub u32);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeatError {
    #[error("unknown seat {0:?}")]
    UnknownSeat(SeatId),
}

/// Creates protocol device objects for a seat.
pub trait DeviceFactory {
    fn create_device(&mut self, seat: SeatId, kind: DeviceKind) -> Box<dyn DeviceProxy>;
}

/// What a router may see and change of its seat while handling one callback.
#[derive(Debug)]
pub struct SeatView<'a> {
    pub name: &'a str,
    pub has_pointer: bool,
    pub focus: &'a mut FocusGrabState,
}

/// Hands out touch-point base offsets, one per touch device instance.
#[derive(Debug, Clone)]
pub struct TouchIdAllocator {
    next: u32,
    stride: u32,
}

impl TouchIdAllocator {
    pub fn new(stride: u32) -> Self {
        Self { next: 0, stride }
    }

    pub fn allocate(&mut self) -> u32 {
        let base = self.next;
        self.next = self.next.wrapping_add(self.stride);
        base
    }
}

/// A logical input seat and the devices it currently exposes.
#[derive(Debug)]
pub struct Seat {
    id: SeatId,
    name: String,
    capabilities: Capabilities,
    device_ids: Vec<DeviceId>,
    keyboard: Option<KeyboardRouter>,
    pointer: Option<PointerRouter>,
    touch: Option<TouchRouter>,
    focus: FocusGrabState,
}

impl Seat {
    fn new(id: SeatId, name: String) -> Self {
        Self {
            id,
            name,
            capabilities: Capabilities::empty(),
            device_ids: Vec::new(),
            keyboard: None,
            pointer: None,
            touch: None,
            focus: FocusGrabState::new(),
        }
    }

    pub fn id(&self) -> SeatId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn device_ids(&self) -> &[DeviceId] {
        &self.device_ids
    }

    pub fn contains_device(&self, device_id: DeviceId) -> bool {
        self.device_ids.iter().any(|id| *id == device_id)
    }

    pub fn focus(&self) -> &FocusGrabState {
        &self.focus
    }

    pub fn keyboard(&self) -> Option<&KeyboardRouter> {
        self.keyboard.as_ref()
    }

    pub fn pointer(&self) -> Option<&PointerRouter> {
        self.pointer.as_ref()
    }

    pub fn touch(&self) -> Option<&TouchRouter> {
        self.touch.as_ref()
    }

    fn add_device(&mut self, device_id: DeviceId) {
        if !self.contains_device(device_id) {
            self.device_ids.push(device_id);
        }
    }

    fn remove_device(&mut self, device_id: DeviceId) {
        self.device_ids.retain(|id| *id != device_id);
    }
}

/// All seats known to the connection.
#[derive(Debug)]
pub struct SeatRegistry {
    seats: HashMap<SeatId, Seat>,
    touch_ids: TouchIdAllocator,
    scroll_step: i32,
}

impl SeatRegistry {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            seats: HashMap::new(),
            touch_ids: TouchIdAllocator::new(config.touch_id_stride),
            scroll_step: config.scroll_step,
        }
    }

    /// Registers a seat. Registering a known id only refreshes its name.
    pub fn register_seat(&mut self, id: SeatId, name: impl Into<String>) {
        let name = name.into();
        match self.seats.get_mut(&id) {
            Some(seat) => {
                warn!("seat {:?} registered twice, keeping its devices", id);
                seat.name = name;
            }
            None => {
                info!("🪑 Registered seat {:?} '{}'", id, name);
                self.seats.insert(id, Seat::new(id, name));
            }
        }
    }

    pub fn set_seat_name(&mut self, id: SeatId, name: impl Into<String>) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&id).ok_or(SeatError::UnknownSeat(id))?;
        seat.name = name.into();
        debug!("seat {:?} is named '{}'", id, seat.name);
        Ok(())
    }

    /// Creates routers for newly granted capabilities and drops the routers
    /// of withdrawn ones. A capability that is already satisfied is left
    /// untouched.
    pub fn update_capabilities(
        &mut self,
        id: SeatId,
        capabilities: Capabilities,
        factory: &mut dyn DeviceFactory,
    ) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&id).ok_or(SeatError::UnknownSeat(id))?;
        seat.capabilities = capabilities;

        if capabilities.contains(Capabilities::KEYBOARD) {
            if seat.keyboard.is_none() {
                let router = KeyboardRouter::new(factory.create_device(id, DeviceKind::Keyboard));
                info!("⌨️ Seat '{}' gained keyboard {}", seat.name, router.device_id().0);
                seat.add_device(router.device_id());
                seat.keyboard = Some(router);
            }
        } else if let Some(router) = seat.keyboard.take() {
            info!("Seat '{}' lost keyboard {}", seat.name, router.device_id().0);
            seat.remove_device(router.device_id());
            seat.focus.set_keyboard_focus(None);
        }

        if capabilities.contains(Capabilities::POINTER) {
            if seat.pointer.is_none() {
                let router = PointerRouter::new(
                    factory.create_device(id, DeviceKind::Pointer),
                    self.scroll_step,
                );
                info!("🐁 Seat '{}' gained pointer {}", seat.name, router.device_id().0);
                seat.add_device(router.device_id());
                seat.pointer = Some(router);
            }
        } else if let Some(router) = seat.pointer.take() {
            info!("Seat '{}' lost pointer {}", seat.name, router.device_id().0);
            seat.remove_device(router.device_id());
            seat.focus.set_pointer_focus(None);
            if matches!(seat.focus.grab(), Some(Grab { token: GrabToken::Button(_), .. })) {
                seat.focus.clear_grab();
            }
        }

        if capabilities.contains(Capabilities::TOUCH) {
            if seat.touch.is_none() {
                let base_id = self.touch_ids.allocate();
                let proxy = factory.create_device(id, DeviceKind::Touch);
                let router = TouchRouter::new(proxy, base_id);
                info!(
                    "👆 Seat '{}' gained touch {} (touch ids from {})",
                    seat.name,
                    router.device_id().0,
                    base_id
                );
                seat.add_device(router.device_id());
                seat.touch = Some(router);
            }
        } else if let Some(router) = seat.touch.take() {
            info!("Seat '{}' lost touch {}", seat.name, router.device_id().0);
            seat.remove_device(router.device_id());
            if matches!(seat.focus.grab(), Some(Grab { token: GrabToken::Touch(_), .. })) {
                seat.focus.clear_grab();
            }
        }

        Ok(())
    }

    /// Unknown seats contain no devices.
    pub fn contains_device(&self, id: SeatId, device_id: DeviceId) -> bool {
        self.seats
            .get(&id)
            .is_some_and(|seat| seat.contains_device(device_id))
    }

    /// Removes a seat, releasing all of its devices.
    pub fn remove_seat(&mut self, id: SeatId) -> Result<(), SeatError> {
        let seat = self.seats.remove(&id).ok_or(SeatError::UnknownSeat(id))?;
        info!("Removed seat {:?} '{}'", id, seat.name);
        Ok(())
    }

    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn dispatch_keyboard(
        &mut self,
        id: SeatId,
        display: &DisplayHandle,
        event: KeyboardEvent,
    ) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&id).ok_or(SeatError::UnknownSeat(id))?;
        let has_pointer = seat.pointer.is_some();
        match seat.keyboard.as_mut() {
            Some(router) => router.handle_event(
                SeatView {
                    name: &seat.name,
                    has_pointer,
                    focus: &mut seat.focus,
                },
                display,
                event,
            ),
            None => debug!("keyboard event on seat '{}' without a keyboard", seat.name),
        }
        Ok(())
    }

    pub fn dispatch_pointer(
        &mut self,
        id: SeatId,
        display: &DisplayHandle,
        event: PointerEvent,
    ) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&id).ok_or(SeatError::UnknownSeat(id))?;
        match seat.pointer.as_mut() {
            Some(router) => router.handle_event(
                SeatView {
                    name: &seat.name,
                    has_pointer: true,
                    focus: &mut seat.focus,
                },
                display,
                event,
            ),
            None => debug!("pointer event on seat '{}' without a pointer", seat.name),
        }
        Ok(())
    }

    pub fn dispatch_touch(
        &mut self,
        id: SeatId,
        display: &DisplayHandle,
        event: TouchEvent,
    ) -> Result<(), SeatError> {
        let seat = self.seats.get_mut(&id).ok_or(SeatError::UnknownSeat(id))?;
        let has_pointer = seat.pointer.is_some();
        match seat.touch.as_mut() {
            Some(router) => router.handle_event(
                SeatView {
                    name: &seat.name,
                    has_pointer,
                    focus: &mut seat.focus,
                },
                display,
                event,
            ),
            None => debug!("touch event on seat '{}' without a touch device", seat.name),
        }
        Ok(())
    }
}

impl Default for SeatRegistry {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}
