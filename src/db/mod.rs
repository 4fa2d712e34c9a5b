//! Persistence module split across logical submodules. The free functions
//! take a plain `&Connection` so they work the same on a transaction; the
//! [`TemplateStore`] handle is the public face over them.

mod connection;
mod store;
mod tags;
mod templates;

pub use connection::TemplateStore;
pub(crate) use tags::{insert_tag_row, insert_template_tag_row};
pub(crate) use templates::{clear_all, insert_template_row};
