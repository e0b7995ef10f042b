//! # Wayroute
//!
//! Input event dispatch for Wayland clients: a background readiness loop
//! pumps the connection, a seat registry tracks per-seat keyboard, pointer
//! and touch devices, and the routers turn protocol callbacks into
//! normalized events for the host application.
//!
//! ## Architecture
//!
//! - `dispatcher`: Readiness loop and its worker thread
//! - `seat`: Seat registry, device lifecycle and focus/grab state
//! - `input`: Protocol-neutral events and the keyboard, pointer and touch routers
//! - `display`: Host collaborators (dispatch sink, window resolver)
//! - `wayland`: wayland-client adapter binding `wl_seat` globals
//! - `keymap`: XKB keymap loading from the shared descriptor
//! - `surface_id`: Numeric surface id allocation
//! - `config`: Configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wayroute::{Dispatcher, DisplayHandle, WaylandConnection, WayrouteConfig};
//! # use wayroute::display::{DispatchSink, WindowResolver};
//! # fn host() -> (Arc<dyn DispatchSink>, Arc<dyn WindowResolver>) { unimplemented!() }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = WayrouteConfig::default();
//!     let (sink, windows) = host();
//!     let display = DisplayHandle::new(sink, windows);
//!     let connection = WaylandConnection::connect(display, &config.input)?;
//!     let dispatcher = Dispatcher::start(connection, &config.dispatcher)?;
//!     dispatcher.join()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod display;
pub mod input;
pub mod keymap;
pub mod seat;
pub mod surface_id;
pub mod wayland;

// Re-export main types for easy access
pub use config::WayrouteConfig;
pub use dispatcher::{Dispatcher, LoopExit};
pub use display::{DispatchSink, DisplayHandle, WindowHandle};
pub use seat::{SeatId, SeatRegistry};
pub use surface_id::SurfaceIdAllocator;
pub use wayland::WaylandConnection;

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for Wayroute
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
