use std::path::PathBuf;

use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::import::ImportOptions;
use crate::logging::read_log;
use crate::models::Template;

/// Style shared by every form line: yellow while focused, grey while empty.
fn field_style(is_active: bool, is_empty: bool) -> Style {
    if is_active {
        Style::default().fg(Color::Yellow)
    } else if is_empty {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    }
}

/// One input line per placeholder of the template being filled in.
#[derive(Clone)]
pub(crate) struct FieldForm {
    pub(crate) template_index: usize,
    pub(crate) title: String,
    pub(crate) entries: Vec<(String, String)>,
    pub(crate) active: usize,
}

impl FieldForm {
    /// Seed the form with whatever the template already holds so reopening
    /// it keeps earlier input.
    pub(crate) fn from_template(template_index: usize, template: &Template) -> Self {
        let entries = template
            .fields()
            .iter()
            .map(|field| {
                (
                    field.name().to_string(),
                    field.value().unwrap_or_default().to_string(),
                )
            })
            .collect();
        Self {
            template_index,
            title: template.title().to_string(),
            entries,
            active: 0,
        }
    }

    pub(crate) fn next_field(&mut self) {
        if !self.entries.is_empty() {
            self.active = (self.active + 1) % self.entries.len();
        }
    }

    pub(crate) fn previous_field(&mut self) {
        if !self.entries.is_empty() {
            self.active = (self.active + self.entries.len() - 1) % self.entries.len();
        }
    }

    /// Append a character to the focused value. Control characters are
    /// refused.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.entries.get_mut(self.active) {
            Some((_, value)) => {
                value.push(ch);
                true
            }
            None => false,
        }
    }

    pub(crate) fn backspace(&mut self) {
        if let Some((_, value)) = self.entries.get_mut(self.active) {
            value.pop();
        }
    }

    /// Name/value pairs in the shape `Template::set_fields` expects.
    pub(crate) fn values(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }

    /// Width of the label column so the values line up.
    pub(crate) fn label_width(&self) -> usize {
        self.entries
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .clamp(5, 40)
    }

    pub(crate) fn build_line(&self, index: usize) -> Line<'static> {
        let Some((name, value)) = self.entries.get(index) else {
            return Line::from("");
        };
        let display = if value.is_empty() {
            "<required>".to_string()
        } else {
            value.clone()
        };
        let width = self.label_width();

        Line::from(vec![
            Span::raw(format!("{name:<width$} : ")),
            Span::styled(display, field_style(index == self.active, value.is_empty())),
        ])
    }

    /// Cursor column offset inside the form for the focused line.
    pub(crate) fn cursor_offset(&self) -> usize {
        let value_len = self
            .entries
            .get(self.active)
            .map(|(_, value)| value.chars().count())
            .unwrap_or(0);
        self.label_width() + " : ".len() + value_len
    }
}

/// Inputs of the import prompt.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum ImportField {
    #[default]
    Path,
    Header,
    Replace,
}

#[derive(Clone)]
pub(crate) struct ImportForm {
    pub(crate) path: String,
    pub(crate) has_header: bool,
    pub(crate) replace: bool,
    pub(crate) active: ImportField,
    pub(crate) error: Option<String>,
}

impl Default for ImportForm {
    fn default() -> Self {
        Self {
            path: String::new(),
            has_header: true,
            replace: false,
            active: ImportField::Path,
            error: None,
        }
    }
}

impl ImportForm {
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            ImportField::Path => ImportField::Header,
            ImportField::Header => ImportField::Replace,
            ImportField::Replace => ImportField::Path,
        };
    }

    /// Typed characters go to the path; a space on a checkbox flips it.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        match self.active {
            ImportField::Path => {
                if ch.is_control() {
                    return false;
                }
                self.path.push(ch);
                true
            }
            ImportField::Header if ch == ' ' => {
                self.has_header = !self.has_header;
                true
            }
            ImportField::Replace if ch == ' ' => {
                self.replace = !self.replace;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn backspace(&mut self) {
        if self.active == ImportField::Path {
            self.path.pop();
        }
    }

    /// Validate the inputs and return the file plus options for the
    /// importer.
    pub(crate) fn parse_inputs(&self) -> Result<(PathBuf, ImportOptions)> {
        let path = self.path.trim();
        if path.is_empty() {
            return Err(anyhow!("Spreadsheet path is required."));
        }
        Ok((
            PathBuf::from(path),
            ImportOptions {
                sheet: None,
                has_header: self.has_header,
                replace: self.replace,
            },
        ))
    }

    pub(crate) fn build_lines(&self) -> Vec<Line<'static>> {
        let path_display = if self.path.is_empty() {
            "<required>".to_string()
        } else {
            self.path.clone()
        };
        let checkbox = |checked: bool| if checked { "[x]" } else { "[ ]" };

        vec![
            Line::from(vec![
                Span::raw("File: "),
                Span::styled(
                    path_display,
                    field_style(self.active == ImportField::Path, self.path.is_empty()),
                ),
            ]),
            Line::from(vec![
                Span::raw("First row is a heading: "),
                Span::styled(
                    checkbox(self.has_header),
                    field_style(self.active == ImportField::Header, false),
                ),
            ]),
            Line::from(vec![
                Span::raw("Replace existing templates: "),
                Span::styled(
                    checkbox(self.replace),
                    field_style(self.active == ImportField::Replace, false),
                ),
            ]),
        ]
    }

    pub(crate) fn path_len(&self) -> usize {
        self.path.chars().count()
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmTemplateDelete {
    pub(crate) template_index: usize,
    pub(crate) title: String,
}

/// Scrollable copy of the run log.
pub(crate) struct LogView {
    pub(crate) text: String,
    pub(crate) scroll: u16,
}

impl LogView {
    pub(crate) fn load(path: &std::path::Path) -> Self {
        Self {
            text: read_log(path),
            scroll: 0,
        }
    }

    pub(crate) fn scroll_by(&mut self, offset: i32) {
        let lines = self.text.lines().count().min(u16::MAX as usize) as i32;
        let max = (lines - 1).max(0);
        self.scroll = (self.scroll as i32 + offset).clamp(0, max) as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_form_round_trips_template_values() {
        let mut template = Template::new("Reply", "${Name} ${topic}");
        assert!(template.set_fields([("Name", "bob"), ("topic", "")]).is_err());

        let mut form = FieldForm::from_template(3, &template);
        assert_eq!(form.template_index, 3);
        assert_eq!(
            form.values(),
            vec![
                ("Name".to_string(), "Bob".to_string()),
                ("topic".to_string(), String::new())
            ]
        );

        form.next_field();
        for ch in "late payment".chars() {
            form.push_char(ch);
        }
        form.backspace();
        assert_eq!(form.entries[1].1, "late paymen");
        form.next_field();
        assert_eq!(form.active, 0);
        form.previous_field();
        assert_eq!(form.active, 1);
    }

    #[test]
    fn test_import_form_requires_path() {
        let mut form = ImportForm::default();
        assert!(form.parse_inputs().is_err());

        for ch in " ~/templates.xlsx ".chars() {
            form.push_char(ch);
        }
        form.toggle_field();
        form.push_char(' ');
        form.toggle_field();
        form.push_char(' ');
        form.push_char('x');

        let (path, options) = form.parse_inputs().unwrap();
        assert_eq!(path, PathBuf::from("~/templates.xlsx"));
        assert!(!options.has_header);
        assert!(options.replace);
    }

    #[test]
    fn test_log_view_scroll_is_clamped() {
        let mut view = LogView {
            text: "a\nb\nc".to_string(),
            scroll: 0,
        };
        view.scroll_by(-3);
        assert_eq!(view.scroll, 0);
        view.scroll_by(10);
        assert_eq!(view.scroll, 2);
    }
}
