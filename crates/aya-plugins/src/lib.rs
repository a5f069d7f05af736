//! Commands bundled with the AyaTech bot.
//!
//! Each command exposes its default `CommandSpec`. [`catalog`] maps the
//! handler keys used by plugin manifests to these implementations.

use std::sync::Arc;

use aya_core::{plugins::HandlerCatalog, registry::CommandSpec};

pub mod add;
pub mod block;
pub mod menu;
pub mod ping;

/// Handler keys available to manifests under the plugins directory.
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with("ping", Arc::new(ping::Ping))
        .with("menu", Arc::new(menu::Menu))
        .with("add", Arc::new(add::AddMember))
        .with("block", Arc::new(block::Block))
        .with("unblock", Arc::new(block::Unblock))
}

/// The bundled commands with their default settings, used when no plugins
/// directory is present.
pub fn builtin_specs() -> Vec<CommandSpec> {
    vec![
        ping::spec(),
        menu::spec(),
        add::spec(),
        block::block_spec(),
        block::unblock_spec(),
    ]
}
