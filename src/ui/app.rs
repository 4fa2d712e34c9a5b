use std::mem;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arboard::Clipboard;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{error, info};

use crate::db::TemplateStore;
use crate::import::import_spreadsheet;
use crate::models::{Tag, Template};

use super::forms::{ConfirmTemplateDelete, FieldForm, ImportField, ImportForm, LogView};
use super::helpers::{centered_rect, move_index, surface_error};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width of the tag filter column.
const TAG_PANE_WIDTH: u16 = 22;
/// Synthetic first entry of the tag filter that shows every template.
const ALL_TAGS: &str = "all";

/// Which list receives the arrow keys.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Pane {
    Tags,
    Templates,
}

/// Modal state layered above the main screen.
enum Mode {
    Normal,
    EnteringFields(FieldForm),
    Importing(ImportForm),
    ConfirmDelete(ConfirmTemplateDelete),
    ViewingLog(LogView),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI. Every handler only
/// moves selections around and calls into the store or the template; the
/// rules about fields and tags live there.
pub struct App {
    store: TemplateStore,
    log_file: PathBuf,
    tags: Vec<Tag>,
    selected_tag: usize,
    templates: Vec<Template>,
    selected_template: usize,
    focus: Pane,
    mode: Mode,
    status: Option<StatusMessage>,
    clipboard: Option<Clipboard>,
}

impl App {
    pub fn new(store: TemplateStore, log_file: PathBuf) -> Result<Self> {
        let mut app = Self {
            store,
            log_file,
            tags: Vec::new(),
            selected_tag: 0,
            templates: Vec::new(),
            selected_template: 0,
            focus: Pane::Templates,
            mode: Mode::Normal,
            status: None,
            clipboard: None,
        };
        app.reload()?;
        info!("Loaded {} templates from database.", app.templates.len());
        info!("Loaded {} metadata tags.", app.tags.len().saturating_sub(1));
        Ok(app)
    }

    /// Hand the store back so the caller can close it on exit.
    pub fn into_store(self) -> TemplateStore {
        self.store
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => match self.handle_normal_key(code, &mut exit) {
                Ok(mode) => mode,
                Err(err) => {
                    error!("Key handling failed: {err:#}");
                    self.set_status(surface_error(&err), StatusKind::Error);
                    Mode::Normal
                }
            },
            Mode::EnteringFields(form) => self.handle_field_entry(code, form),
            Mode::Importing(form) => self.handle_import(code, form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
            Mode::ViewingLog(view) => self.handle_log_view(code, view),
        };

        Ok(exit)
    }

    /// `Ctrl+C` copies instead of killing the program, matching the desktop
    /// shortcut.
    pub(crate) fn handle_ctrl_c(&mut self) {
        if matches!(self.mode, Mode::Normal) {
            self.copy_selected();
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
                self.focus = match self.focus {
                    Pane::Tags => Pane::Templates,
                    Pane::Templates => Pane::Tags,
                };
            }
            KeyCode::Up => self.move_selection(-1)?,
            KeyCode::Down => self.move_selection(1)?,
            KeyCode::PageUp => self.move_selection(-5)?,
            KeyCode::PageDown => self.move_selection(5)?,
            KeyCode::Home => self.move_selection(isize::MIN / 2)?,
            KeyCode::End => self.move_selection(isize::MAX / 2)?,
            KeyCode::Enter => {
                if self.focus == Pane::Tags {
                    self.focus = Pane::Templates;
                    return Ok(Mode::Normal);
                }
                let Some(template) = self.current_template() else {
                    self.set_status("No template selected.", StatusKind::Error);
                    return Ok(Mode::Normal);
                };
                if template.number_of_fields() == 0 {
                    self.set_status("Template has no fields defined.", StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                let form = FieldForm::from_template(self.selected_template, template);
                self.clear_status();
                return Ok(Mode::EnteringFields(form));
            }
            KeyCode::Char('c') | KeyCode::Char('C') => self.copy_selected(),
            KeyCode::Char('r') | KeyCode::Char('R') | KeyCode::F(5) => self.reset_templates(),
            KeyCode::Char('i') | KeyCode::Char('I') => {
                self.clear_status();
                return Ok(Mode::Importing(ImportForm::default()));
            }
            KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(template) = self.current_template() {
                    let confirm = ConfirmTemplateDelete {
                        template_index: self.selected_template,
                        title: template.title().to_string(),
                    };
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("No template selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                return Ok(Mode::ViewingLog(LogView::load(&self.log_file)));
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_field_entry(&mut self, code: KeyCode, mut form: FieldForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Field entry cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                self.submit_fields(&form);
                return Mode::Normal;
            }
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Mode::EnteringFields(form)
    }

    fn submit_fields(&mut self, form: &FieldForm) {
        let result = match self.templates.get_mut(form.template_index) {
            Some(template) => template.set_fields(form.values()),
            None => return,
        };
        match result {
            Ok(()) => self.set_status("Fields updated. Press c to copy.", StatusKind::Info),
            Err(err) => self.set_status(err.to_string(), StatusKind::Error),
        }
    }

    fn handle_import(&mut self, code: KeyCode, mut form: ImportForm) -> Mode {
        match code {
            KeyCode::Esc => {
                info!("Template import cancelled...");
                self.set_status("Import cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.run_import(&form) {
                Ok(()) => return Mode::Normal,
                Err(err) => form.error = Some(surface_error(&err)),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::Importing(form)
    }

    fn run_import(&mut self, form: &ImportForm) -> Result<()> {
        let (path, options) = form.parse_inputs()?;
        let summary = import_spreadsheet(&mut self.store, &path, &options)?;
        info!("Template import completed...");
        self.reload()?;

        if summary.succeeded() {
            self.set_status(
                format!(
                    "Imported {} templates and {} tags.",
                    summary.templates, summary.tags
                ),
                StatusKind::Info,
            );
        } else {
            self.set_status("No templates found in that spreadsheet.", StatusKind::Error);
        }
        Ok(())
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmTemplateDelete) -> Mode {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                match self.delete_template(confirm.template_index) {
                    Ok(()) => self.set_status(
                        format!("Deleted \"{}\".", confirm.title),
                        StatusKind::Info,
                    ),
                    Err(err) => {
                        error!("Failed to delete template: {err:#}");
                        self.set_status(surface_error(&err), StatusKind::Error);
                    }
                }
                Mode::Normal
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Delete cancelled.", StatusKind::Info);
                Mode::Normal
            }
            _ => Mode::ConfirmDelete(confirm),
        }
    }

    fn delete_template(&mut self, index: usize) -> Result<()> {
        if let Some(template) = self.templates.get_mut(index) {
            self.store.delete_template(template)?;
        }
        self.reload()
    }

    fn handle_log_view(&mut self, code: KeyCode, mut view: LogView) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('l') | KeyCode::Char('L') => {
                return Mode::Normal;
            }
            KeyCode::Up => view.scroll_by(-1),
            KeyCode::Down => view.scroll_by(1),
            KeyCode::PageUp => view.scroll_by(-10),
            KeyCode::PageDown => view.scroll_by(10),
            KeyCode::Home => view.scroll = 0,
            KeyCode::End => view.scroll_by(i32::MAX / 2),
            _ => {}
        }
        Mode::ViewingLog(view)
    }

    fn move_selection(&mut self, offset: isize) -> Result<()> {
        match self.focus {
            Pane::Tags => {
                let next = move_index(self.selected_tag, self.tags.len(), offset);
                if next != self.selected_tag {
                    self.selected_tag = next;
                    self.selected_template = 0;
                    self.load_templates()?;
                }
            }
            Pane::Templates => {
                self.selected_template =
                    move_index(self.selected_template, self.templates.len(), offset);
            }
        }
        Ok(())
    }

    fn current_template(&self) -> Option<&Template> {
        self.templates.get(self.selected_template)
    }

    fn copy_selected(&mut self) {
        let rendered = match self.current_template() {
            None => Err(("No template selected.", StatusKind::Error)),
            Some(template) if !template.fields_set() => Err((
                "You must enter values for all fields in the template.",
                StatusKind::Info,
            )),
            Some(template) => Ok(template.rendered_text()),
        };
        let text = match rendered {
            Ok(text) => text,
            Err((message, kind)) => {
                self.set_status(message, kind);
                return;
            }
        };

        let result = text
            .map_err(anyhow::Error::from)
            .and_then(|text| self.write_clipboard(text));
        match result {
            Ok(()) => self.set_status("Copied to clipboard.", StatusKind::Info),
            Err(err) => {
                error!("Clipboard copy failed: {err:#}");
                self.set_status(surface_error(&err), StatusKind::Error);
            }
        }
    }

    fn write_clipboard(&mut self, text: String) -> Result<()> {
        let clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new().context("failed to access the clipboard")?,
        };
        self.clipboard
            .insert(clipboard)
            .set_text(text)
            .context("failed to copy to the clipboard")
    }

    /// Forget every value typed into the listed templates.
    fn reset_templates(&mut self) {
        for template in &mut self.templates {
            template.clear_fields();
        }
        self.set_status("Templates reset.", StatusKind::Info);
    }

    /// Refetch tags and templates, keeping the tag filter if it still exists.
    fn reload(&mut self) -> Result<()> {
        let current_tag = self
            .tags
            .get(self.selected_tag)
            .map(|tag| tag.text().to_string());

        let mut tags = vec![Tag::new(ALL_TAGS)];
        tags.extend(self.store.fetch_all_tags()?);
        self.selected_tag = current_tag
            .and_then(|text| {
                tags.iter()
                    .enumerate()
                    .skip(1)
                    .find(|(_, tag)| tag.text() == text)
                    .map(|(idx, _)| idx)
            })
            .unwrap_or(0);
        self.tags = tags;

        self.load_templates()
    }

    fn load_templates(&mut self) -> Result<()> {
        let mut templates = if self.selected_tag == 0 {
            self.store.fetch_all_templates()?
        } else {
            self.store
                .fetch_templates_for_tag(self.tags[self.selected_tag].text())?
        };
        for template in &mut templates {
            self.store.fetch_metadata_for_template(template)?;
        }
        self.templates = templates;
        self.selected_template = move_index(self.selected_template, self.templates.len(), 0);
        Ok(())
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(TAG_PANE_WIDTH),
                Constraint::Percentage(30),
                Constraint::Min(10),
            ])
            .split(content_area);

        self.draw_tags(frame, columns[0]);
        self.draw_templates(frame, columns[1]);
        self.draw_text(frame, columns[2]);

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::EnteringFields(form) => self.draw_field_form(frame, area, form),
            Mode::Importing(form) => self.draw_import_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::ViewingLog(view) => self.draw_log(frame, area, view),
            Mode::Normal => {}
        }
    }

    fn pane_block(&self, title: &'static str, pane: Pane) -> Block<'static> {
        let block = Block::default().borders(Borders::ALL).title(title);
        if self.focus == pane && matches!(self.mode, Mode::Normal) {
            block.border_style(Style::default().fg(Color::Yellow))
        } else {
            block
        }
    }

    fn draw_tags(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .tags
            .iter()
            .map(|tag| ListItem::new(tag.to_string()))
            .collect();
        let list = List::new(items)
            .block(self.pane_block("Tags", Pane::Tags))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        state.select(Some(self.selected_tag));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_templates(&self, frame: &mut Frame, area: Rect) {
        let block = self.pane_block("Templates", Pane::Templates);
        if self.templates.is_empty() {
            let message = Paragraph::new("--Empty List--")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = self
            .templates
            .iter()
            .map(|template| {
                let marker = if template.fields_set() && template.number_of_fields() > 0 {
                    Span::styled("* ", Style::default().fg(Color::Green))
                } else {
                    Span::raw("  ")
                };
                ListItem::new(Line::from(vec![marker, Span::raw(template.to_string())]))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        state.select(Some(self.selected_template));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_text(&self, frame: &mut Frame, area: Rect) {
        let Some(template) = self.current_template() else {
            let message = Paragraph::new("No templates loaded. Press 'i' to import a spreadsheet.")
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, area);
            return;
        };

        let tags = template
            .tags()
            .iter()
            .map(Tag::text)
            .collect::<Vec<_>>()
            .join(", ");
        let title = if tags.is_empty() {
            template.title().to_string()
        } else {
            format!("{} [{}]", template.title(), tags)
        };
        let paragraph = Paragraph::new(template.preview())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&'static str, &'static str)] = match &self.mode {
            Mode::EnteringFields(_) => &[
                ("[Tab/↑↓]", " Next Field   "),
                ("[Enter]", " Submit   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::Importing(_) => &[
                ("[Tab]", " Next   "),
                ("[Space]", " Toggle   "),
                ("[Enter]", " Import   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::ConfirmDelete(_) => &[("[y]", " Delete   "), ("[n]", " Keep")],
            Mode::ViewingLog(_) => &[("[↑↓/PgUp/PgDn]", " Scroll   "), ("[Esc]", " Close")],
            Mode::Normal => &[
                ("[Tab]", " Switch   "),
                ("[↑↓]", " Select   "),
                ("[Enter]", " Fill In   "),
                ("[c]", " Copy   "),
                ("[r]", " Reset   "),
                ("[i]", " Import   "),
                ("[-]", " Delete   "),
                ("[l]", " Log   "),
                ("[q]", " Quit"),
            ],
        };

        Line::from(
            keys.iter()
                .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::raw(*label)])
                .collect::<Vec<_>>(),
        )
    }

    fn draw_field_form(&self, frame: &mut Frame, area: Rect, form: &FieldForm) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Fields for {}", form.title))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.entries.len())
            .map(|index| form.build_line(index))
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to submit • Tab to switch • Esc to cancel",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines);
        frame.render_widget(paragraph, inner);

        let cursor_x = inner.x + form.cursor_offset() as u16;
        let cursor_y = inner.y + form.active as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_import_form(&self, frame: &mut Frame, area: Rect, form: &ImportForm) {
        let popup_area = centered_rect(70, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Import Templates")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.build_lines();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Columns: title, body, comma separated tags (.xlsx, .xls, .ods)",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        if form.active == ImportField::Path {
            let prefix = "File: ".len() as u16;
            frame.set_cursor_position((inner.x + prefix + form.path_len() as u16, inner.y));
        }
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmTemplateDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let lines = vec![
            Line::from(vec![
                Span::raw("Delete template "),
                Span::styled(
                    confirm.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw("?"),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "Tags used by no other template are removed too.",
                Style::default().fg(Color::Gray),
            )),
            Line::from(Span::styled(
                "y to delete • n to keep",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("Confirm Delete").borders(Borders::ALL));
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_log(&self, frame: &mut Frame, area: Rect, view: &LogView) {
        let popup_area = centered_rect(90, 90, area);
        frame.render_widget(Clear, popup_area);

        let paragraph = Paragraph::new(view.text.as_str())
            .wrap(Wrap { trim: false })
            .scroll((view.scroll, 0))
            .block(
                Block::default()
                    .title("Application Run Log")
                    .borders(Borders::ALL),
            );
        frame.render_widget(paragraph, popup_area);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}
