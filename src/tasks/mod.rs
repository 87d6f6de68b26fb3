//! Background Tasks Module
//!
//! # Tasks
//! - Checkpoint: per-cache flush owner that debounces snapshot writes
//! - Expiry sweep: optional periodic removal of expired entries

mod checkpoint;
mod sweep;

pub use checkpoint::{debounce_window, spawn_checkpoint_task, CheckpointCommand};
pub use sweep::spawn_sweep_task;
