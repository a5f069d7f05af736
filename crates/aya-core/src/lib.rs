//! Core dispatch + abuse-control logic for the AyaTech bot.
//!
//! This crate is transport-agnostic. The chat network lives behind the
//! `MessagingPort` trait and command handlers are supplied by a `PluginSource`.

pub mod audit;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod plugins;
pub mod registry;
pub mod replies;
pub mod security;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{Error, Result};
