use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::models::Template;

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template::from_row(row.get(0)?, row.get(1)?, row.get(2)?))
}

/// All templates in insertion order, without tags.
pub(crate) fn fetch_all_templates(conn: &Connection) -> Result<Vec<Template>> {
    let mut stmt = conn
        .prepare("SELECT uid, title, content FROM templates ORDER BY uid")
        .context("failed to prepare template query")?;

    let templates = stmt
        .query_map([], template_from_row)
        .context("failed to load templates")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect templates")?;

    Ok(templates)
}

/// Templates carrying a given tag, joined through the association view.
pub(crate) fn fetch_templates_for_tag(conn: &Connection, tag: &str) -> Result<Vec<Template>> {
    let mut stmt = conn
        .prepare(
            "SELECT tmpRowID, title, content
             FROM vw_Templates_Tags
             WHERE tag = ?1
             ORDER BY tmpRowID",
        )
        .context("failed to prepare tag templates query")?;

    let templates = stmt
        .query_map([tag], template_from_row)
        .context("failed to iterate tag templates")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect tag templates")?;

    Ok(templates)
}

pub(crate) fn fetch_template(conn: &Connection, id: i64) -> Result<Option<Template>> {
    conn.query_row(
        "SELECT uid, title, content FROM templates WHERE uid = ?1",
        params![id],
        template_from_row,
    )
    .optional()
    .context("failed to load template")
}

/// Insert a template row and hand back its uid.
pub(crate) fn insert_template_row(conn: &Connection, title: &str, content: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO templates (title, content) VALUES (?1, ?2)",
        params![title, content],
    )
    .context("failed to insert template")?;

    Ok(conn.last_insert_rowid())
}

/// Rewrite every column of a template row.
pub(crate) fn update_template_row(
    conn: &Connection,
    id: i64,
    title: &str,
    content: &str,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE templates SET title = ?1, content = ?2 WHERE uid = ?3",
            params![title, content, id],
        )
        .context("failed to update template")?;

    if updated == 0 {
        Err(StoreError::NotFound.into())
    } else {
        Ok(())
    }
}

/// Delete the association rows of a template and then the template itself.
/// Orphaned tags are left for `remove_empty_tags`.
pub(crate) fn delete_template_rows(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM templateTags WHERE tmplt_uid = ?1", params![id])
        .context("failed to delete template tags")?;

    let deleted = conn
        .execute("DELETE FROM templates WHERE uid = ?1", params![id])
        .context("failed to delete template")?;

    if deleted == 0 {
        Err(StoreError::NotFound.into())
    } else {
        Ok(())
    }
}

/// Empty all three tables, associations first so foreign keys hold.
pub(crate) fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM templateTags", [])
        .context("failed to clear template tags")?;
    conn.execute("DELETE FROM tags", [])
        .context("failed to clear tags")?;
    conn.execute("DELETE FROM templates", [])
        .context("failed to clear templates")?;
    Ok(())
}
