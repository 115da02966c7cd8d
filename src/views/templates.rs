//! HTML page rendering with [`handlebars`].
//!
//! Templates are compiled into the binary and registered once at startup.
//! Handlebars escapes every `{{value}}`, so item text is safe to interpolate.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

pub const TODO_LIST: &str = "todo_list";
pub const CREATE_TODO: &str = "create_todo";
pub const UPDATE_TODO: &str = "update_todo";
pub const SERVER_ERROR: &str = "server_error";

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../../templates/header.hbs")),
    ("footer", include_str!("../../templates/footer.hbs")),
];

const PAGES: &[(&str, &str)] = &[
    (TODO_LIST, include_str!("../../templates/todo_list.hbs")),
    (CREATE_TODO, include_str!("../../templates/create_todo.hbs")),
    (UPDATE_TODO, include_str!("../../templates/update_todo.hbs")),
    (SERVER_ERROR, include_str!("../../templates/server_error.hbs")),
];

/// The registry of page templates.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Compiles every page and partial.
    ///
    /// # Errors
    ///
    /// A [`TemplateError`] if any template fails to parse.
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        for (name, source) in PARTIALS {
            registry.register_partial(name, *source)?;
        }
        for (name, source) in PAGES {
            registry.register_template_string(name, *source)?;
        }
        Ok(Self { registry })
    }

    /// Renders page `name` with `data`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, RenderError> {
        self.registry.render(name, data)
    }
}
