//! Protocol-neutral input types and per-device routers
//!
//! The wayland adapter translates protocol callbacks into the event enums
//! defined here; the routers in [`keyboard`], [`pointer`] and [`touch`]
//! turn them into normalized events on the host's dispatch sink.

use bitflags::bitflags;
use log::debug;
use std::os::fd::OwnedFd;

pub mod keyboard;
pub mod pointer;
pub mod touch;

pub use keyboard::KeyboardRouter;
pub use pointer::{PointerCursor, PointerRouter};
pub use touch::TouchRouter;

/// Linux evdev button codes understood by the pointer router.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Device identifier, taken from the protocol object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Protocol object id of a surface, used to look up its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Protocol-native 24.8 signed fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fixed(pub i32);

impl Fixed {
    pub fn from_f64(value: f64) -> Self {
        Self((value * 256.0).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 256.0
    }
}

bitflags! {
    /// Seat capability bits, same layout as `wl_seat.capability`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

bitflags! {
    /// Mouse button flags carried by button events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonFlags: u32 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
    }
}

impl ButtonFlags {
    /// Maps an evdev button code; unknown codes carry no flag.
    pub fn from_button_code(code: u32) -> Self {
        match code {
            BTN_LEFT => Self::LEFT,
            BTN_RIGHT => Self::RIGHT,
            BTN_MIDDLE => Self::MIDDLE,
            _ => Self::empty(),
        }
    }
}

/// The kind of a seat device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    Touch,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Keyboard, DeviceKind::Pointer, DeviceKind::Touch];

    pub fn capability(self) -> Capabilities {
        match self {
            DeviceKind::Keyboard => Capabilities::KEYBOARD,
            DeviceKind::Pointer => Capabilities::POINTER,
            DeviceKind::Touch => Capabilities::TOUCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchType {
    Pressed,
    Released,
    Moved,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    VerticalScroll,
    HorizontalScroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapFormat {
    NoKeymap,
    XkbV1,
    Unknown(u32),
}

/// Keyboard protocol callbacks.
#[derive(Debug)]
pub enum KeyboardEvent {
    /// Keymap handed over as a shared memory descriptor
    Keymap {
        format: KeymapFormat,
        fd: OwnedFd,
        size: u32,
    },
    /// Keyboard focus entered a surface
    Enter {
        serial: u32,
        surface: Option<SurfaceId>,
    },
    /// Keyboard focus left a surface
    Leave {
        serial: u32,
        surface: Option<SurfaceId>,
    },
    /// Key press/release
    Key {
        serial: u32,
        time: u32,
        key: u32,
        state: KeyState,
    },
    /// Modifier and group state
    Modifiers {
        serial: u32,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
}

/// Pointer protocol callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    /// Pointer entered a surface; `None` when the surface is already gone
    Enter {
        serial: u32,
        surface: Option<SurfaceId>,
        x: Fixed,
        y: Fixed,
    },
    Leave {
        serial: u32,
        surface: Option<SurfaceId>,
    },
    Motion {
        time: u32,
        x: Fixed,
        y: Fixed,
    },
    Button {
        serial: u32,
        time: u32,
        button: u32,
        state: ButtonState,
    },
    Axis {
        time: u32,
        axis: Axis,
        value: Fixed,
    },
}

/// Touch protocol callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Down {
        serial: u32,
        time: u32,
        surface: Option<SurfaceId>,
        id: i32,
        x: Fixed,
        y: Fixed,
    },
    Up {
        serial: u32,
        time: u32,
        id: i32,
    },
    Motion {
        time: u32,
        id: i32,
        x: Fixed,
        y: Fixed,
    },
    Frame,
    Cancel,
}

/// Ownership of a protocol device object.
///
/// Dropping the router that holds the proxy releases the protocol object.
pub trait DeviceProxy: Send {
    fn id(&self) -> DeviceId;

    /// Releases the protocol object. Called at most once.
    fn release(&mut self);
}

/// Exclusive owner of a device proxy, released on drop.
pub struct OwnedDevice {
    proxy: Box<dyn DeviceProxy>,
    id: DeviceId,
}

impl OwnedDevice {
    pub fn new(proxy: Box<dyn DeviceProxy>) -> Self {
        let id = proxy.id();
        Self { proxy, id }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }
}

impl Drop for OwnedDevice {
    fn drop(&mut self) {
        debug!("releasing input device {}", self.id.0);
        self.proxy.release();
    }
}

impl std::fmt::Debug for OwnedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedDevice").field("id", &self.id).finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support;
