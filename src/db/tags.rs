use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::models::Tag;

/// Every tag known to the store, alphabetically.
pub(crate) fn fetch_all_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare("SELECT uid, tag FROM tags ORDER BY tag")
        .context("failed to prepare tag query")?;

    let tags = stmt
        .query_map([], |row| {
            let mut tag = Tag::new(row.get::<_, String>(1)?);
            tag.set_id(row.get(0)?);
            Ok(tag)
        })
        .context("failed to load tags")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect tags")?;

    Ok(tags)
}

/// Tags linked to one template through the association view.
pub(crate) fn fetch_tags_for_template(conn: &Connection, template_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare(
            "SELECT tgRowID, tag
             FROM vw_Templates_Tags
             WHERE tmpRowID = ?1
             ORDER BY tag",
        )
        .context("failed to prepare template tags query")?;

    let tags = stmt
        .query_map([template_id], |row| {
            let mut tag = Tag::new(row.get::<_, String>(1)?);
            tag.set_id(row.get(0)?);
            tag.set_assoc_id(template_id);
            Ok(tag)
        })
        .context("failed to iterate template tags")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect template tags")?;

    Ok(tags)
}

/// Return the uid for `tag`, inserting the row first when it does not
/// exist yet. The `UNIQUE` constraint on `tags.tag` makes this safe to call
/// for tags shared by many templates.
pub(crate) fn insert_tag_row(conn: &Connection, tag: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO tags (tag) VALUES (?1)", params![tag])
        .context("failed to insert tag")?;

    conn.query_row("SELECT uid FROM tags WHERE tag = ?1", params![tag], |row| {
        row.get(0)
    })
    .context("failed to read tag id")
}

/// Link a template to a tag. Repeated links are ignored; returns 1 when a
/// row was written and 0 when the link already existed.
pub(crate) fn insert_template_tag_row(conn: &Connection, template_id: i64, tag_id: i64) -> Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO templateTags (tmplt_uid, tag_uid) VALUES (?1, ?2)",
        params![template_id, tag_id],
    )
    .context("failed to link tag to template")
}

/// Persist `tags` for a template, filling in their ids as we go.
pub(crate) fn link_tags(conn: &Connection, template_id: i64, tags: &mut [Tag]) -> Result<()> {
    for tag in tags.iter_mut() {
        let tag_id = insert_tag_row(conn, tag.text())?;
        insert_template_tag_row(conn, template_id, tag_id)?;
        tag.set_id(tag_id);
        tag.set_assoc_id(template_id);
    }
    Ok(())
}

/// Drop every association row of a template.
pub(crate) fn unlink_template_tags(conn: &Connection, template_id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM templateTags WHERE tmplt_uid = ?1",
        params![template_id],
    )
    .context("failed to unlink template tags")
}

/// Remove tags that no template references any more. Has to run after every
/// deletion or re-tagging, otherwise the tag filter fills up with dead
/// entries.
pub(crate) fn remove_empty_tags(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM tags
         WHERE uid NOT IN (SELECT DISTINCT tag_uid FROM templateTags)",
        [],
    )
    .context("failed to remove unused tags")
}
