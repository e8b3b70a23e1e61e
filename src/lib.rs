//! Memory and swap usage widget for line-protocol dashboards.
//!
//! Each run samples `/proc` (plus `free` and `ps`), appends the usage
//! percentages to a small rolling history on disk and prints `title:`,
//! `row:`, table and `action:` directives for the host to draw.

pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod protocol;
pub mod render;
pub mod sampler;
pub mod snapshot;
pub mod widget;

pub use config::Config;
pub use error::{Error, Result};
pub use widget::Widget;
