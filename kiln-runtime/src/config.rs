//! Runtime configuration

use crate::error::{RuntimeError, RuntimeResult};
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Logic ticks per second
    pub tick_rate: u32,

    /// Rendered frames per second, `None` to render as fast as the backend
    /// accepts frames
    pub frame_rate: Option<u32>,

    /// Tick activated scenes concurrently on the rayon pool
    pub parallel_scene_updates: bool,

    /// CPU core to pin the logic thread to
    pub logic_core: Option<usize>,

    /// CPU core to pin the render thread to
    pub render_core: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            frame_rate: Some(60),
            parallel_scene_updates: false,
            logic_core: None,
            render_core: None,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.tick_rate == 0 {
            return Err(RuntimeError::InvalidConfig(
                "tick_rate must be greater than zero".to_string(),
            ));
        }
        if self.frame_rate == Some(0) {
            return Err(RuntimeError::InvalidConfig(
                "frame_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Time budget of one logic tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Time budget of one frame, `None` when unpaced
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_rate.map(|rate| Duration::from_secs(1) / rate.max(1))
    }
}
