//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI and the command line. Tags stay light-weight data holders; templates
//! own the placeholder bookkeeping so the other layers only have to ask for
//! the rendered text.

mod tag;
mod template;

pub use tag::Tag;
pub use template::{CaseStyle, Field, Template, TemplateState};
