//! Pokedex catalog browser.
//!
//! The catalog layer (`cache`, `filter`, `window`) is usable on its own; the
//! remaining modules wire it into a tui-dispatch terminal app.

pub mod action;
pub mod api;
pub mod cache;
pub mod config;
pub mod effect;
pub mod entity;
pub mod error;
pub mod filter;
pub mod logging;
pub mod membership;
pub mod reducer;
pub mod state;
pub mod store;
pub mod tasks;
pub mod ui;
pub mod window;
