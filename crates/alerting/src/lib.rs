//! Alerting System
//!
//! Provides report cooldown gating per (camera, weapon category), category
//! normalization, and the single-slot active alert.

mod category;
mod cooldown;
mod slot;
mod window;

pub use category::{display_name, normalize_category};
pub use cooldown::{CooldownConfig, CooldownGate, CooldownKey};
pub use slot::{ActiveAlert, AlertSlot};
pub use window::WindowCache;
