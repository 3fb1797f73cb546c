//! Data-driven content for the Autochess engine.
//!
//! Reads engine config, board layout and unit definitions from RON, JSON or
//! TOML files and turns them into a ready-to-run [`Engine`](autochess_core::engine::Engine).

pub mod loader;
pub mod schema;

pub use loader::{load_game_data, DataLoadError, GameData};
