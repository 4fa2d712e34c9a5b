//! EmStencil: email templates with `${field}` placeholders, stored in SQLite,
//! filled in through a terminal UI or the command line and copied to the
//! clipboard.
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod ui;

pub use cli::Cli;
pub use db::TemplateStore;
pub use error::{ImportError, StoreError, TemplateError};
pub use models::{Tag, Template};
