//! Ratatui front-end: a tag filter, the matching templates and a preview of
//! the selected one, with modal forms for field entry, import, deletion and
//! the run log.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
