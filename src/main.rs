//! # Wayroute - Wayland input monitor
//!
//! Connects to the running compositor, binds every seat and logs the
//! normalized input events the routers produce. Every surface is treated as
//! its own window, optionally accepting input from a single seat only.

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use xkbcommon::xkb;

use wayroute::display::{Window, WindowResolver};
use wayroute::input::{ButtonFlags, ButtonState, DeviceId, KeyState, SurfaceId, TouchType};
use wayroute::keymap::load_keymap;
use wayroute::{
    DispatchSink, Dispatcher, DisplayHandle, LoopExit, WaylandConnection, WayrouteConfig,
    WindowHandle,
};

#[derive(Parser)]
#[command(name = "wayroute")]
#[command(about = "Logs Wayland seat input as normalized events")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wayroute/wayroute.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Only accept input from the seat with this name
    #[arg(long)]
    seat_filter: Option<String>,
}

/// Logs every normalized event.
struct LoggingSink;

impl DispatchSink for LoggingSink {
    fn key_notify(&self, state: KeyState, keycode: u32, device_id: DeviceId) {
        info!("⌨️ key {} {:?} (device {})", keycode, state, device_id.0);
    }

    fn keyboard_enter(&self, window: WindowHandle) {
        info!("⌨️ keyboard entered window {}", window.0);
    }

    fn keyboard_leave(&self, window: WindowHandle) {
        info!("⌨️ keyboard left window {}", window.0);
    }

    fn motion_notify(&self, x: f64, y: f64, device_id: DeviceId) {
        debug!("motion ({:.1}, {:.1}) (device {})", x, y, device_id.0);
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
        info!(
            "🐁 button {:?} {:?} on window {} at ({:.1}, {:.1}) (device {})",
            flags, state, window.0, x, y, device_id.0
        );
    }

    fn axis_notify(&self, x: f64, y: f64, dx: i32, dy: i32, device_id: DeviceId) {
        info!(
            "🐁 scroll ({}, {}) at ({:.1}, {:.1}) (device {})",
            dx, dy, x, y, device_id.0
        );
    }

    fn pointer_enter(&self, window: WindowHandle, x: f64, y: f64) {
        info!("🐁 pointer entered window {} at ({:.1}, {:.1})", window.0, x, y);
    }

    fn pointer_leave(&self, window: Option<WindowHandle>, x: f64, y: f64) {
        info!("🐁 pointer left {:?} at ({:.1}, {:.1})", window, x, y);
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
        info!(
            "👆 touch {} {:?} at ({:.1}, {:.1}) t={} (device {})",
            touch_id, kind, x, y, time, device_id.0
        );
    }

    fn initialize_keymap(&self, keymap: OwnedFd, size: u32) {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        match load_keymap(&context, keymap, size) {
            Ok(keymap) => info!("✅ Keymap loaded with {} layout(s)", keymap.num_layouts()),
            Err(e) => warn!("Failed to load keymap: {}", e),
        }
    }

    fn set_serial(&self, serial: u32) {
        debug!("serial {}", serial);
    }
}

struct SurfaceWindow {
    handle: WindowHandle,
    seat_filter: Option<Arc<str>>,
}

impl Window for SurfaceWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn can_accept_seat_events(&self, seat_name: &str) -> bool {
        self.seat_filter
            .as_deref()
            .map_or(true, |filter| filter == seat_name)
    }
}

/// One window per surface, keyed by the surface's protocol id.
struct SurfaceWindows {
    seat_filter: Option<Arc<str>>,
}

impl SurfaceWindows {
    fn window(&self, handle: WindowHandle) -> Arc<dyn Window> {
        Arc::new(SurfaceWindow {
            handle,
            seat_filter: self.seat_filter.clone(),
        })
    }
}

impl WindowResolver for SurfaceWindows {
    fn window_for_handle(&self, handle: WindowHandle) -> Option<Arc<dyn Window>> {
        Some(self.window(handle))
    }

    fn window_for_surface(&self, surface: SurfaceId) -> Option<Arc<dyn Window>> {
        Some(self.window(WindowHandle(surface.0)))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting Wayroute input monitor");
    info!("📄 Version: {}", wayroute::VERSION);

    // Load configuration
    let config = match WayrouteConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            info!("📝 Using default configuration");
            WayrouteConfig::default()
        }
    };

    if let Some(seat) = &cli.seat_filter {
        info!("🪑 Accepting input from seat '{}' only", seat);
    }

    let display = DisplayHandle::new(
        Arc::new(LoggingSink),
        Arc::new(SurfaceWindows {
            seat_filter: cli.seat_filter.as_deref().map(Arc::from),
        }),
    );
    let connection = WaylandConnection::connect(display, &config.input)?;
    let dispatcher = Arc::new(Dispatcher::start(connection, &config.dispatcher)?);

    let handler = Arc::clone(&dispatcher);
    ctrlc::set_handler(move || handler.stop())?;

    match dispatcher.join()? {
        LoopExit::Stopped => {
            info!("👋 Wayroute shutting down");
            Ok(())
        }
        LoopExit::ConnectionLost(reason) => {
            Err(anyhow::anyhow!("Wayland connection lost: {}", reason))
        }
    }
}
