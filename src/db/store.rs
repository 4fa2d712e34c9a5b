use anyhow::{Context, Result};
use tracing::{debug, info};

use super::connection::TemplateStore;
use super::tags::{
    fetch_all_tags, fetch_tags_for_template, link_tags, remove_empty_tags, unlink_template_tags,
};
use super::templates::{
    delete_template_rows, fetch_all_templates, fetch_template, fetch_templates_for_tag,
    insert_template_row, update_template_row,
};
use crate::error::StoreError;
use crate::models::{Tag, Template};

fn require_id(template: &Template) -> Result<i64> {
    template
        .id()
        .ok_or_else(|| StoreError::MissingIdentifier.into())
}

impl TemplateStore {
    /// Every template, oldest first. Tags are not attached; call
    /// [`fetch_metadata_for_template`](Self::fetch_metadata_for_template) for
    /// the ones that need them.
    pub fn fetch_all_templates(&self) -> Result<Vec<Template>> {
        fetch_all_templates(self.conn()?)
    }

    /// Attach the tags of a persisted template. Fails with
    /// [`StoreError::MissingIdentifier`] for a template that was never saved.
    pub fn fetch_metadata_for_template(&self, template: &mut Template) -> Result<()> {
        let id = require_id(template)?;
        *template.tags_mut() = fetch_tags_for_template(self.conn()?, id)?;
        Ok(())
    }

    /// Fetch all templates and attach their tags in one go.
    pub fn fetch_all_templates_with_tags(&self) -> Result<Vec<Template>> {
        let mut templates = self.fetch_all_templates()?;
        for template in &mut templates {
            self.fetch_metadata_for_template(template)?;
        }
        Ok(templates)
    }

    /// Templates tagged with `tag`. The tag text is normalized the same way
    /// stored tags are.
    pub fn fetch_templates_for_tag(&self, tag: &str) -> Result<Vec<Template>> {
        let tag = Tag::new(tag.trim());
        fetch_templates_for_tag(self.conn()?, tag.text())
    }

    pub fn fetch_all_tags(&self) -> Result<Vec<Tag>> {
        fetch_all_tags(self.conn()?)
    }

    /// Look a single template up by uid, tags included.
    pub fn fetch_template(&self, id: i64) -> Result<Option<Template>> {
        let Some(mut template) = fetch_template(self.conn()?, id)? else {
            return Ok(None);
        };
        self.fetch_metadata_for_template(&mut template)?;
        Ok(Some(template))
    }

    /// Insert a template together with its tags. On success the template
    /// and its tags carry their new ids.
    pub fn add_template(&mut self, template: &mut Template) -> Result<()> {
        let tx = self.transaction()?;
        let id = insert_template_row(&tx, template.title(), template.body())?;
        link_tags(&tx, id, template.tags_mut())?;
        tx.commit().context("failed to commit new template")?;

        template.mark_persisted(id);
        info!("Added template {id}: {}", template.title());
        Ok(())
    }

    /// Write title and body back and re-link the template's tags. Tags the
    /// template no longer uses are purged if nothing else references them.
    pub fn update_template(&mut self, template: &mut Template) -> Result<()> {
        let id = require_id(template)?;
        let tx = self.transaction()?;
        update_template_row(&tx, id, template.title(), template.body())?;
        unlink_template_tags(&tx, id)?;
        link_tags(&tx, id, template.tags_mut())?;
        let purged = remove_empty_tags(&tx)?;
        tx.commit().context("failed to commit template update")?;

        template.mark_persisted(id);
        info!("Updated template {id}: {}", template.title());
        if purged > 0 {
            debug!("Removed {purged} unused tags");
        }
        Ok(())
    }

    /// Delete a template, its tag links and any tag left without templates.
    pub fn delete_template(&mut self, template: &mut Template) -> Result<()> {
        let id = require_id(template)?;
        let tx = self.transaction()?;
        delete_template_rows(&tx, id)?;
        let purged = remove_empty_tags(&tx)?;
        tx.commit().context("failed to commit template deletion")?;

        template.mark_deleted();
        info!("Deleted template {id}: {}", template.title());
        if purged > 0 {
            debug!("Removed {purged} unused tags");
        }
        Ok(())
    }

    /// Purge tags no template references. Returns how many were removed.
    pub fn remove_empty_tags(&self) -> Result<usize> {
        remove_empty_tags(self.conn()?)
    }
}
