//! Headset jack detection for Arizona class audio codecs.
//!
//! Classifies 3.5 mm accessories (headset, headphone, nothing), measures
//! headphone impedance, identifies microphones across polarity variants
//! and reports button presses.  The detection core is pure logic behind
//! port traits; [`adapters`] holds the I2C, GPIO and simulated hardware.
//!
//! ```text
//!  events (IRQ mailbox) ─▶ dispatch ─▶ fsm (state table) ─▶ measure
//!                             │             │
//!                           work          app::ports ◀── adapters
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod chip;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod fsm;
pub mod measure;
pub mod regs;
pub mod work;

pub use app::events::{HeadsetState, JackEvent};
pub use app::service::JackDetector;
pub use chip::ChipVariant;
pub use config::JackConfig;
pub use error::{Error, Result};
pub use events::IrqLine;
