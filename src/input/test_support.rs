//! Fakes shared by the router and seat unit tests

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    ButtonFlags, ButtonState, DeviceId, DeviceKind, DeviceProxy, KeyState, SurfaceId, TouchType,
};
use crate::display::{DispatchSink, DisplayHandle, Window, WindowHandle, WindowResolver};
use crate::seat::{DeviceFactory, SeatId};

/// Everything a sink can observe, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Key(KeyState, u32, DeviceId),
    KeyboardEnter(WindowHandle),
    KeyboardLeave(WindowHandle),
    Motion(f64, f64, DeviceId),
    Button(WindowHandle, ButtonState, ButtonFlags, f64, f64, DeviceId),
    Axis(f64, f64, i32, i32, DeviceId),
    PointerEnter(WindowHandle, f64, f64),
    PointerLeave(Option<WindowHandle>, f64, f64),
    Touch(TouchType, f64, f64, u32, u32, DeviceId),
    Keymap(u32),
    Serial(u32),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    /// Recorded events without the serial bookkeeping.
    pub fn notifications(&self) -> Vec<Recorded> {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, Recorded::Serial(_)))
            .cloned()
            .collect()
    }

    pub fn last_serial(&self) -> Option<u32> {
        self.events.lock().iter().rev().find_map(|event| match event {
            Recorded::Serial(serial) => Some(*serial),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: Recorded) {
        self.events.lock().push(event);
    }
}

impl DispatchSink for RecordingSink {
    fn key_notify(&self, state: KeyState, keycode: u32, device_id: DeviceId) {
        self.push(Recorded::Key(state, keycode, device_id));
    }

    fn keyboard_enter(&self, window: WindowHandle) {
        self.push(Recorded::KeyboardEnter(window));
    }

    fn keyboard_leave(&self, window: WindowHandle) {
        self.push(Recorded::KeyboardLeave(window));
    }

    fn motion_notify(&self, x: f64, y: f64, device_id: DeviceId) {
        self.push(Recorded::Motion(x, y, device_id));
    }

    fn button_notify(
        &self,
        window: WindowHandle,
        state: ButtonState,
        flags: ButtonFlags,
        x: f64,
        y: f64,
        device_id: DeviceId,
    ) {
        self.push(Recorded::Button(window, state, flags, x, y, device_id));
    }

    fn axis_notify(&self, x: f64, y: f64, dx: i32, dy: i32, device_id: DeviceId) {
        self.push(Recorded::Axis(x, y, dx, dy, device_id));
    }

    fn pointer_enter(&self, window: WindowHandle, x: f64, y: f64) {
        self.push(Recorded::PointerEnter(window, x, y));
    }

    fn pointer_leave(&self, window: Option<WindowHandle>, x: f64, y: f64) {
        self.push(Recorded::PointerLeave(window, x, y));
    }

    fn touch_notify(
        &self,
        kind: TouchType,
        x: f64,
        y: f64,
        touch_id: u32,
        time: u32,
        device_id: DeviceId,
    ) {
        self.push(Recorded::Touch(kind, x, y, touch_id, time, device_id));
    }

    fn initialize_keymap(&self, _keymap: OwnedFd, size: u32) {
        self.push(Recorded::Keymap(size));
    }

    fn set_serial(&self, serial: u32) {
        self.push(Recorded::Serial(serial));
    }
}

struct FakeWindow {
    handle: WindowHandle,
    rejected_seats: Arc<Mutex<HashSet<String>>>,
}

impl Window for FakeWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn can_accept_seat_events(&self, seat_name: &str) -> bool {
        !self.rejected_seats.lock().contains(seat_name)
    }
}

/// Windows keyed by handle; surface `n` maps to window `n` unless remapped.
#[derive(Default)]
pub struct FakeWindows {
    windows: Mutex<HashMap<WindowHandle, Arc<Mutex<HashSet<String>>>>>,
    surfaces: Mutex<HashMap<SurfaceId, WindowHandle>>,
}

impl FakeWindows {
    pub fn with_windows(handles: &[u32]) -> Self {
        let windows = Self::default();
        for handle in handles {
            windows.add_window(WindowHandle(*handle));
        }
        windows
    }

    pub fn add_window(&self, handle: WindowHandle) {
        self.windows.lock().entry(handle).or_default();
    }

    pub fn map_surface(&self, surface: SurfaceId, handle: WindowHandle) {
        self.surfaces.lock().insert(surface, handle);
    }

    pub fn reject_seat(&self, handle: WindowHandle, seat_name: &str) {
        if let Some(rejected) = self.windows.lock().get(&handle) {
            rejected.lock().insert(seat_name.to_string());
        }
    }

    fn window(&self, handle: WindowHandle) -> Option<Arc<dyn Window>> {
        let rejected_seats = Arc::clone(self.windows.lock().get(&handle)?);
        Some(Arc::new(FakeWindow {
            handle,
            rejected_seats,
        }))
    }
}

impl WindowResolver for FakeWindows {
    fn window_for_handle(&self, handle: WindowHandle) -> Option<Arc<dyn Window>> {
        self.window(handle)
    }

    fn window_for_surface(&self, surface: SurfaceId) -> Option<Arc<dyn Window>> {
        let handle = self
            .surfaces
            .lock()
            .get(&surface)
            .copied()
            .unwrap_or(WindowHandle(surface.0));
        self.window(handle)
    }
}

/// A display wired to a recording sink and the given windows.
pub fn recording_display(handles: &[u32]) -> (DisplayHandle, Arc<RecordingSink>, Arc<FakeWindows>) {
    let sink = Arc::new(RecordingSink::default());
    let windows = Arc::new(FakeWindows::with_windows(handles));
    let display = DisplayHandle::new(sink.clone(), windows.clone());
    (display, sink, windows)
}

pub struct FakeProxy {
    id: DeviceId,
    released: Arc<AtomicBool>,
}

impl FakeProxy {
    pub fn new(id: u32) -> (Box<dyn DeviceProxy>, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let proxy = Self {
            id: DeviceId(id),
            released: Arc::clone(&released),
        };
        (Box::new(proxy), released)
    }
}

impl DeviceProxy for FakeProxy {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn release(&mut self) {
        assert!(
            !self.released.swap(true, Ordering::SeqCst),
            "device {} released twice",
            self.id.0
        );
    }
}

/// Hands out fake devices with increasing ids starting at 10.
#[derive(Default)]
pub struct FakeFactory {
    next_id: AtomicU32,
    created: AtomicUsize,
    released: Mutex<HashMap<DeviceId, Arc<AtomicBool>>>,
    kinds: Mutex<Vec<(SeatId, DeviceKind)>>,
}

impl FakeFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn created_kinds(&self) -> Vec<(SeatId, DeviceKind)> {
        self.kinds.lock().clone()
    }

    pub fn is_released(&self, id: DeviceId) -> bool {
        self.released
            .lock()
            .get(&id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl DeviceFactory for FakeFactory {
    fn create_device(&mut self, seat: SeatId, kind: DeviceKind) -> Box<dyn DeviceProxy> {
        let id = 10 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().push((seat, kind));
        let (proxy, released) = FakeProxy::new(id);
        self.released.lock().insert(DeviceId(id), released);
        proxy
    }
}
