//! Numeric surface id allocation for shells that address surfaces by number

use log::{debug, warn};

use crate::config::SurfaceConfig;

/// Hands out increasing surface ids after a configured base.
///
/// When the override variable holds a number it is used instead, and later
/// ids continue from it.
#[derive(Debug, Clone)]
pub struct SurfaceIdAllocator {
    last: u32,
    env_override: String,
}

impl SurfaceIdAllocator {
    pub fn new(config: &SurfaceConfig) -> Self {
        Self {
            last: config.id_base,
            env_override: config.id_env_override.clone(),
        }
    }

    pub fn last_id(&self) -> u32 {
        self.last
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.env_id().unwrap_or_else(|| self.last.wrapping_add(1));
        self.last = id;
        debug!("allocated surface id {}", id);
        id
    }

    fn env_id(&self) -> Option<u32> {
        if self.env_override.is_empty() {
            return None;
        }
        let value = std::env::var(&self.env_override).ok()?;
        match value.trim().parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring {}={:?}: not a surface id", self.env_override, value);
                None
            }
        }
    }
}

impl Default for SurfaceIdAllocator {
    fn default() -> Self {
        Self::new(&SurfaceConfig::default())
    }
}
