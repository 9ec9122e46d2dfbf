//! Core domain + application logic for the kashikari debt-tracking bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the health
//! endpoint live behind ports (traits) implemented in adapter crates.

pub mod accrual;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod scheduler;
pub mod utils;

pub use errors::{Error, Result};
