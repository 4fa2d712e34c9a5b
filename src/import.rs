//! Batch import of templates from a spreadsheet. Column A holds the title,
//! column B the body and column C a comma separated tag list; the first row
//! is usually a heading and gets skipped. The whole batch is written in one
//! transaction: template rows first, then one row per distinct tag, then the
//! links between them.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::{debug, info};

use crate::db::{
    clear_all, insert_tag_row, insert_template_row, insert_template_tag_row, TemplateStore,
};
use crate::error::ImportError;
use crate::models::Tag;

const TITLE_COLUMN: u32 = 0;
const BODY_COLUMN: u32 = 1;
const TAGS_COLUMN: u32 = 2;

/// Knobs for one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Worksheet to read. `None` reads the first one.
    pub sheet: Option<String>,
    /// Skip the first row as column headings.
    pub has_header: bool,
    /// Empty the store before importing instead of adding to it.
    pub replace: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            has_header: true,
            replace: false,
        }
    }
}

/// One spreadsheet row, cleaned up and ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub title: String,
    pub body: String,
    pub tags: Vec<Tag>,
}

impl ImportRow {
    /// Trim title and body and normalize the tag list.
    pub fn new(title: &str, body: &str, tags: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            body: body.trim().to_string(),
            tags: Tag::parse_list(tags),
        }
    }
}

/// Counts reported back after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub templates: usize,
    pub tags: usize,
    pub links: usize,
}

impl ImportSummary {
    /// An import only counts as successful if it produced a template.
    pub fn succeeded(&self) -> bool {
        self.templates > 0
    }
}

fn invalid_source(path: &Path, reason: impl Into<String>) -> ImportError {
    ImportError::InvalidImportSource {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read and clean the rows of a `.xlsx`, `.xls` or `.ods` workbook.
pub fn read_rows(path: &Path, options: &ImportOptions) -> Result<Vec<ImportRow>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| invalid_source(path, err.to_string()))?;

    let range = match &options.sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .map_err(|err| invalid_source(path, format!("sheet {name}: {err}")))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| invalid_source(path, "workbook has no worksheets"))?
            .map_err(|err| invalid_source(path, err.to_string()))?,
    };

    Ok(rows_from_range(&range, options.has_header))
}

/// Text of one cell, addressed by absolute column. The range may not start
/// at column A if the leading columns are blank.
fn cell_text(row: &[Data], start_column: u32, column: u32) -> String {
    let Some(offset) = column.checked_sub(start_column) else {
        return String::new();
    };
    match row.get(offset as usize) {
        Some(Data::String(text)) => text.clone(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn rows_from_range(range: &Range<Data>, has_header: bool) -> Vec<ImportRow> {
    let start_column = range.start().map(|(_, column)| column).unwrap_or(0);
    let skip = usize::from(has_header);
    if has_header {
        debug!("Skipping column headings from spreadsheet...");
    }

    range
        .rows()
        .skip(skip)
        .map(|row| {
            ImportRow::new(
                &cell_text(row, start_column, TITLE_COLUMN),
                &cell_text(row, start_column, BODY_COLUMN),
                &cell_text(row, start_column, TAGS_COLUMN),
            )
        })
        .filter(|row| !(row.title.is_empty() && row.body.is_empty()))
        .collect()
}

/// Write `rows` to the store in one transaction. Only `options.replace` is
/// consulted here; the other options apply to reading the workbook.
pub fn import_rows(
    store: &mut TemplateStore,
    rows: &[ImportRow],
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let tx = store.transaction()?;
    if options.replace {
        clear_all(&tx)?;
        info!("Database tables cleared...");
    }

    let mut template_ids = Vec::with_capacity(rows.len());
    for row in rows {
        template_ids.push(insert_template_row(&tx, &row.title, &row.body)?);
    }
    info!("{} templates loaded from spreadsheet.", template_ids.len());

    let distinct: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.tags.iter().map(Tag::text))
        .collect();
    info!("{} unique metadata tags in spreadsheet.", distinct.len());

    let mut tag_ids: HashMap<&str, i64> = HashMap::with_capacity(distinct.len());
    for &tag in &distinct {
        tag_ids.insert(tag, insert_tag_row(&tx, tag)?);
    }

    let mut links = 0;
    for (row, template_id) in rows.iter().zip(&template_ids) {
        for tag in &row.tags {
            if let Some(&tag_id) = tag_ids.get(tag.text()) {
                links += insert_template_tag_row(&tx, *template_id, tag_id)?;
            }
        }
    }

    tx.commit().context("failed to commit imported templates")?;

    Ok(ImportSummary {
        templates: template_ids.len(),
        tags: distinct.len(),
        links,
    })
}

/// Read a workbook and import it.
pub fn import_spreadsheet(
    store: &mut TemplateStore,
    path: &Path,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    info!("Selected file: {}", path.display());
    let rows = read_rows(path, options)?;
    let summary = import_rows(store, &rows, options)?;
    info!("Number of templates added: {}", summary.templates);
    info!("Number of tags added: {}", summary.tags);
    Ok(summary)
}
