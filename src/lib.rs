#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod capture;
pub mod config;
pub mod digest;
pub mod fragment;
pub mod share;
pub mod timefmt;
pub mod ui;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
