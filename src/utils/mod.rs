//! Common utilities and helpers

pub mod logging;
pub mod size;
pub mod time;

pub use size::{format_file_size, is_file_too_large};
pub use time::{format_time, parse_time};
