//! wayland-client adapter
//!
//! Binds every `wl_seat` global, turns `wl_keyboard`, `wl_pointer` and
//! `wl_touch` events into the protocol-neutral events of [`crate::input`] and
//! feeds them to the [`SeatRegistry`]. [`WaylandConnection`] exposes the
//! client primitives the readiness loop needs.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use wayland_backend::client::WaylandError;
use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{
    wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_surface, wl_touch,
};
use wayland_client::{Connection, DispatchError, EventQueue, Proxy, QueueHandle, WEnum};

use crate::config::InputConfig;
use crate::dispatcher::{ConnectionError, ProtocolConnection};
use crate::display::DisplayHandle;
use crate::input::{
    Axis, ButtonState, Capabilities, DeviceId, DeviceKind, DeviceProxy, Fixed, KeyState,
    KeyboardEvent, KeymapFormat, PointerEvent, SurfaceId, TouchEvent,
};
use crate::seat::{DeviceFactory, SeatId, SeatRegistry};

const SEAT_INTERFACE: &str = "wl_seat";
const MAX_SEAT_VERSION: u32 = 7;

/// Dispatch state living on the event queue.
#[derive(Debug)]
pub struct WaylandInput {
    registry: SeatRegistry,
    display: DisplayHandle,
    seats: HashMap<SeatId, wl_seat::WlSeat>,
}

impl WaylandInput {
    pub fn new(display: DisplayHandle, config: &InputConfig) -> Self {
        Self {
            registry: SeatRegistry::new(config),
            display,
            seats: HashMap::new(),
        }
    }

    pub fn seats(&self) -> &SeatRegistry {
        &self.registry
    }

    fn bind_seat(
        &mut self,
        registry: &wl_registry::WlRegistry,
        name: u32,
        version: u32,
        qh: &QueueHandle<Self>,
    ) {
        let id = SeatId(name);
        let seat: wl_seat::WlSeat = registry.bind(name, version.min(MAX_SEAT_VERSION), qh, id);
        // Replaced by the seat's name event.
        self.registry.register_seat(id, format!("seat{}", name));
        self.seats.insert(id, seat);
    }

    fn remove_seat(&mut self, id: SeatId) {
        let Some(seat) = self.seats.remove(&id) else {
            return;
        };
        if let Err(e) = self.registry.remove_seat(id) {
            warn!("{}", e);
        }
        if seat.version() >= 5 {
            seat.release();
        }
    }
}

/// Device proxies handed to the seat registry.
enum WaylandDevice {
    Keyboard(wl_keyboard::WlKeyboard),
    Pointer(wl_pointer::WlPointer),
    Touch(wl_touch::WlTouch),
}

impl DeviceProxy for WaylandDevice {
    fn id(&self) -> DeviceId {
        let id = match self {
            WaylandDevice::Keyboard(keyboard) => keyboard.id(),
            WaylandDevice::Pointer(pointer) => pointer.id(),
            WaylandDevice::Touch(touch) => touch.id(),
        };
        DeviceId(id.protocol_id())
    }

    fn release(&mut self) {
        // `release` requests exist from wl_seat version 3 on.
        match self {
            WaylandDevice::Keyboard(keyboard) if keyboard.version() >= 3 => keyboard.release(),
            WaylandDevice::Pointer(pointer) if pointer.version() >= 3 => pointer.release(),
            WaylandDevice::Touch(touch) if touch.version() >= 3 => touch.release(),
            _ => {}
        }
    }
}

struct SeatDeviceFactory<'a> {
    seat: &'a wl_seat::WlSeat,
    qh: &'a QueueHandle<WaylandInput>,
}

impl DeviceFactory for SeatDeviceFactory<'_> {
    fn create_device(&mut self, id: SeatId, kind: DeviceKind) -> Box<dyn DeviceProxy> {
        let device = match kind {
            DeviceKind::Keyboard => WaylandDevice::Keyboard(self.seat.get_keyboard(self.qh, id)),
            DeviceKind::Pointer => WaylandDevice::Pointer(self.seat.get_pointer(self.qh, id)),
            DeviceKind::Touch => WaylandDevice::Touch(self.seat.get_touch(self.qh, id)),
        };
        Box::new(device)
    }
}

fn surface_id(surface: &wl_surface::WlSurface) -> Option<SurfaceId> {
    surface
        .is_alive()
        .then(|| SurfaceId(surface.id().protocol_id()))
}

impl wayland_client::Dispatch<wl_registry::WlRegistry, GlobalListContents> for WaylandInput {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } if interface == SEAT_INTERFACE => state.bind_seat(registry, name, version, qh),
            wl_registry::Event::GlobalRemove { name } => state.remove_seat(SeatId(name)),
            _ => {}
        }
    }
}

impl wayland_client::Dispatch<wl_seat::WlSeat, SeatId> for WaylandInput {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        id: &SeatId,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let bits = match capabilities {
                    WEnum::Value(capabilities) => capabilities.bits(),
                    WEnum::Unknown(raw) => raw,
                };
                let mut factory = SeatDeviceFactory { seat, qh };
                if let Err(e) = state.registry.update_capabilities(
                    *id,
                    Capabilities::from_bits_truncate(bits),
                    &mut factory,
                ) {
                    warn!("{}", e);
                }
            }
            wl_seat::Event::Name { name } => {
                if let Err(e) = state.registry.set_seat_name(*id, name) {
                    warn!("{}", e);
                }
            }
            _ => {}
        }
    }
}

impl wayland_client::Dispatch<wl_keyboard::WlKeyboard, SeatId> for WaylandInput {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        id: &SeatId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_keyboard::Event::Keymap { format, fd, size } => KeyboardEvent::Keymap {
                format: match format {
                    WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) => KeymapFormat::XkbV1,
                    WEnum::Value(wl_keyboard::KeymapFormat::NoKeymap) => KeymapFormat::NoKeymap,
                    WEnum::Value(other) => KeymapFormat::Unknown(u32::from(other)),
                    WEnum::Unknown(raw) => KeymapFormat::Unknown(raw),
                },
                fd,
                size,
            },
            wl_keyboard::Event::Enter { serial, surface, .. } => KeyboardEvent::Enter {
                serial,
                surface: surface_id(&surface),
            },
            wl_keyboard::Event::Leave { serial, surface } => KeyboardEvent::Leave {
                serial,
                surface: surface_id(&surface),
            },
            wl_keyboard::Event::Key {
                serial,
                time,
                key,
                state: key_state,
            } => KeyboardEvent::Key {
                serial,
                time,
                key,
                state: match key_state {
                    WEnum::Value(wl_keyboard::KeyState::Released) => KeyState::Released,
                    _ => KeyState::Pressed,
                },
            },
            wl_keyboard::Event::Modifiers {
                serial,
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
            } => KeyboardEvent::Modifiers {
                serial,
                depressed: mods_depressed,
                latched: mods_latched,
                locked: mods_locked,
                group,
            },
            _ => return,
        };
        if let Err(e) = state.registry.dispatch_keyboard(*id, &state.display, event) {
            warn!("{}", e);
        }
    }
}

impl wayland_client::Dispatch<wl_pointer::WlPointer, SeatId> for WaylandInput {
    fn event(
        state: &mut Self,
        _: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        id: &SeatId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => PointerEvent::Enter {
                serial,
                surface: surface_id(&surface),
                x: Fixed::from_f64(surface_x),
                y: Fixed::from_f64(surface_y),
            },
            wl_pointer::Event::Leave { serial, surface } => PointerEvent::Leave {
                serial,
                surface: surface_id(&surface),
            },
            wl_pointer::Event::Motion {
                time,
                surface_x,
                surface_y,
            } => PointerEvent::Motion {
                time,
                x: Fixed::from_f64(surface_x),
                y: Fixed::from_f64(surface_y),
            },
            wl_pointer::Event::Button {
                serial,
                time,
                button,
                state: button_state,
            } => PointerEvent::Button {
                serial,
                time,
                button,
                state: match button_state {
                    WEnum::Value(wl_pointer::ButtonState::Released) => ButtonState::Released,
                    _ => ButtonState::Pressed,
                },
            },
            wl_pointer::Event::Axis { time, axis, value } => {
                let axis = match axis {
                    WEnum::Value(wl_pointer::Axis::VerticalScroll) => Axis::VerticalScroll,
                    WEnum::Value(wl_pointer::Axis::HorizontalScroll) => Axis::HorizontalScroll,
                    _ => {
                        debug!("ignoring unknown pointer axis {:?}", axis);
                        return;
                    }
                };
                PointerEvent::Axis {
                    time,
                    axis,
                    value: Fixed::from_f64(value),
                }
            }
            _ => return,
        };
        if let Err(e) = state.registry.dispatch_pointer(*id, &state.display, event) {
            warn!("{}", e);
        }
    }
}

impl wayland_client::Dispatch<wl_touch::WlTouch, SeatId> for WaylandInput {
    fn event(
        state: &mut Self,
        _: &wl_touch::WlTouch,
        event: wl_touch::Event,
        id: &SeatId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_touch::Event::Down {
                serial,
                time,
                surface,
                id: point,
                x,
                y,
            } => TouchEvent::Down {
                serial,
                time,
                surface: surface_id(&surface),
                id: point,
                x: Fixed::from_f64(x),
                y: Fixed::from_f64(y),
            },
            wl_touch::Event::Up {
                serial,
                time,
                id: point,
            } => TouchEvent::Up {
                serial,
                time,
                id: point,
            },
            wl_touch::Event::Motion {
                time,
                id: point,
                x,
                y,
            } => TouchEvent::Motion {
                time,
                id: point,
                x: Fixed::from_f64(x),
                y: Fixed::from_f64(y),
            },
            wl_touch::Event::Frame => TouchEvent::Frame,
            wl_touch::Event::Cancel => TouchEvent::Cancel,
            _ => return,
        };
        if let Err(e) = state.registry.dispatch_touch(*id, &state.display, event) {
            warn!("{}", e);
        }
    }
}

impl From<WaylandError> for ConnectionError {
    fn from(err: WaylandError) -> Self {
        match err {
            WaylandError::Io(e) if e.kind() == io::ErrorKind::WouldBlock => {
                ConnectionError::WouldBlock
            }
            WaylandError::Io(e) => ConnectionError::Io(e),
            WaylandError::Protocol(e) => ConnectionError::Protocol(e.to_string()),
        }
    }
}

impl From<DispatchError> for ConnectionError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Backend(e) => e.into(),
            other => ConnectionError::Protocol(other.to_string()),
        }
    }
}

/// A wayland-client connection together with the input event queue.
pub struct WaylandConnection {
    conn: Connection,
    queue: EventQueue<WaylandInput>,
    state: WaylandInput,
}

impl WaylandConnection {
    /// Connects to `$WAYLAND_DISPLAY`.
    pub fn connect(display: DisplayHandle, config: &InputConfig) -> Result<Self> {
        let conn =
            Connection::connect_to_env().context("Failed to connect to the Wayland display")?;
        Self::from_connection(conn, display, config)
    }

    /// Uses an existing connection, e.g. one shared with the host's surfaces.
    pub fn from_connection(
        conn: Connection,
        display: DisplayHandle,
        config: &InputConfig,
    ) -> Result<Self> {
        let (globals, mut queue) = registry_queue_init::<WaylandInput>(&conn)
            .context("Failed to initialize the registry")?;
        let qh = queue.handle();
        let mut state = WaylandInput::new(display, config);

        let seats: Vec<(u32, u32)> = globals.contents().with_list(|list| {
            list.iter()
                .filter(|global| global.interface == SEAT_INTERFACE)
                .map(|global| (global.name, global.version))
                .collect()
        });
        for (name, version) in seats {
            state.bind_seat(globals.registry(), name, version, &qh);
        }

        // Collect capabilities and names before the worker takes over.
        queue
            .roundtrip(&mut state)
            .context("Failed to receive seat capabilities")?;
        info!("🔗 Connected to Wayland display with {} seat(s)", state.registry.len());

        Ok(Self { conn, queue, state })
    }

    pub fn state(&self) -> &WaylandInput {
        &self.state
    }
}

impl ProtocolConnection for WaylandConnection {
    fn fd(&self) -> RawFd {
        self.conn.backend().poll_fd().as_raw_fd()
    }

    fn dispatch_pending(&mut self) -> Result<usize, ConnectionError> {
        Ok(self.queue.dispatch_pending(&mut self.state)?)
    }

    fn flush(&mut self) -> Result<(), ConnectionError> {
        Ok(self.conn.flush()?)
    }

    fn read_and_dispatch(&mut self) -> Result<usize, ConnectionError> {
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.dispatch_pending()
    }
}

impl std::fmt::Debug for WaylandConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaylandConnection")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
