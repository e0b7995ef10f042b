//! Host-facing collaborators
//!
//! The routers never talk to the application directly. Normalized events
//! leave through a [`DispatchSink`], and windows are looked up through a
//! [`WindowResolver`]. Both are bundled into a [`DisplayHandle`] that is
//! created once by the host and passed explicitly to every router callback.

use std::fmt;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use crate::input::{ButtonFlags, ButtonState, DeviceId, KeyState, SurfaceId, TouchType};

/// Opaque identifier of an application window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u32);

/// Receiver of normalized input events.
///
/// Calls happen synchronously on the dispatcher worker and must not block.
#[cfg_attr(test, mockall::automock)]
pub trait DispatchSink: Send + Sync {
    fn key_notify(&self, state: KeyState, keycode: u32, device_id: DeviceId);
    fn keyboard_enter(&self, window: WindowHandle);
    fn keyboard_leave(&self, window: WindowHandle);
    fn motion_notify(&self, x: f64, y: f64, device_id: DeviceId);
    fn button_notify(
        &self,
        window: WindowHandle,
        state: ButtonState,
        flags: ButtonFlags,
        x: f64,
        y: f64,
        device_id: DeviceId,
    );
    fn axis_notify(&self, x: f64, y: f64, dx: i32, dy: i32, device_id: DeviceId);
    fn pointer_enter(&self, window: WindowHandle, x: f64, y: f64);
    fn pointer_leave(&self, window: Option<WindowHandle>, x: f64, y: f64);
    fn touch_notify(
        &self,
        kind: TouchType,
        x: f64,
        y: f64,
        touch_id: u32,
        time: u32,
        device_id: DeviceId,
    );
    /// Hands over an XKB v1 keymap. See [`crate::keymap::load_keymap`].
    fn initialize_keymap(&self, keymap: OwnedFd, size: u32);
    fn set_serial(&self, serial: u32);
}

/// A window as seen by input routing.
pub trait Window: Send + Sync {
    fn handle(&self) -> WindowHandle;

    /// Whether the window's shell surface takes input from the named seat.
    fn can_accept_seat_events(&self, seat_name: &str) -> bool;
}

/// Maps protocol surfaces and window handles to windows.
#[cfg_attr(test, mockall::automock)]
pub trait WindowResolver: Send + Sync {
    fn window_for_handle(&self, handle: WindowHandle) -> Option<Arc<dyn Window>>;
    fn window_for_surface(&self, surface: SurfaceId) -> Option<Arc<dyn Window>>;
}

/// Shared handle to the host collaborators.
///
/// Cloning is cheap; every router callback receives a reference instead of
/// reaching for a process-wide singleton.
#[derive(Clone)]
pub struct DisplayHandle {
    sink: Arc<dyn DispatchSink>,
    windows: Arc<dyn WindowResolver>,
}

impl DisplayHandle {
    pub fn new(sink: Arc<dyn DispatchSink>, windows: Arc<dyn WindowResolver>) -> Self {
        Self { sink, windows }
    }

    pub fn sink(&self) -> &dyn DispatchSink {
        self.sink.as_ref()
    }

    pub fn windows(&self) -> &dyn WindowResolver {
        self.windows.as_ref()
    }

    /// Resolves a surface to a window that accepts events from `seat_name`.
    ///
    /// A rejecting window is reported as `None`, never as an error.
    pub fn accepting_window_for_surface(
        &self,
        surface: SurfaceId,
        seat_name: &str,
    ) -> Option<WindowHandle> {
        self.windows
            .window_for_surface(surface)
            .filter(|window| window.can_accept_seat_events(seat_name))
            .map(|window| window.handle())
    }

    /// Same as [`Self::accepting_window_for_surface`] but starting from a handle.
    pub fn accepting_window(&self, handle: WindowHandle, seat_name: &str) -> Option<WindowHandle> {
        self.windows
            .window_for_handle(handle)
            .filter(|window| window.can_accept_seat_events(seat_name))
            .map(|window| window.handle())
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    struct SeatWindow {
        handle: WindowHandle,
        seat: &'static str,
    }

    impl Window for SeatWindow {
        fn handle(&self) -> WindowHandle {
            self.handle
        }

        fn can_accept_seat_events(&self, seat_name: &str) -> bool {
            seat_name == self.seat
        }
    }

    fn display(windows: MockWindowResolver) -> DisplayHandle {
        DisplayHandle::new(Arc::new(MockDispatchSink::new()), Arc::new(windows))
    }

    #[test]
    fn test_surface_resolves_to_accepting_window() {
        let mut windows = MockWindowResolver::new();
        windows
            .expect_window_for_surface()
            .with(eq(SurfaceId(7)))
            .times(2)
            .returning(|_| {
                Some(Arc::new(SeatWindow {
                    handle: WindowHandle(3),
                    seat: "seat0",
                }) as Arc<dyn Window>)
            });
        let display = display(windows);

        assert_eq!(
            display.accepting_window_for_surface(SurfaceId(7), "seat0"),
            Some(WindowHandle(3))
        );
        assert_eq!(display.accepting_window_for_surface(SurfaceId(7), "seat1"), None);
    }

    #[test]
    fn test_unknown_handle_has_no_accepting_window() {
        let mut windows = MockWindowResolver::new();
        windows
            .expect_window_for_handle()
            .with(eq(WindowHandle(4)))
            .times(1)
            .returning(|_| None);
        windows.expect_window_for_surface().never();

        assert_eq!(display(windows).accepting_window(WindowHandle(4), "seat0"), None);
    }
}
