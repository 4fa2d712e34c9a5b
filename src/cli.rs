use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use crate::config::AppPaths;
use crate::db::TemplateStore;
use crate::error::StoreError;
use crate::import::{import_spreadsheet, ImportOptions};
use crate::logging;
use crate::models::{Tag, Template};
use crate::ui::{run_app, App};

/// Email templates with fill-in fields, kept in a local SQLite store.
#[derive(Parser)]
#[command(
    name = "emstencil",
    version,
    about = "Email templates with fill-in fields",
    long_about = r#"EmStencil keeps email templates with ${field} placeholders in a local
database. Pick a template, fill in the fields and copy the result to the
clipboard.

Examples:
  emstencil                              # Browse templates interactively
  emstencil import templates.xlsx        # Load templates from a spreadsheet
  emstencil render 3 --set Name=ada      # Print a filled in template"#
)]
pub struct Cli {
    /// Directory holding templates.db and runlog.log
    #[arg(long = "data-dir", env = "EMSTENCIL_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// SQL file used to create the schema instead of the built-in one
    #[arg(long = "schema", env = "EMSTENCIL_SCHEMA", global = true)]
    pub schema: Option<PathBuf>,

    /// Also print warnings and errors to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and database
    Init,
    /// Import templates from a spreadsheet (title, body, tags columns)
    Import {
        file: PathBuf,
        /// Worksheet to read instead of the first one
        #[arg(long)]
        sheet: Option<String>,
        /// The first row holds data, not column headings
        #[arg(long = "no-header")]
        no_header: bool,
        /// Remove every stored template first
        #[arg(long)]
        replace: bool,
    },
    /// List templates
    List {
        /// Only templates carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Add a template
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Change a stored template
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Comma separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a template
    Delete { id: i64 },
    /// Print a template with its fields filled in
    Render {
        id: i64,
        /// Field value as name=value, repeatable
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
}

/// Parse a `name=value` argument. The value may be empty or contain `=`.
fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let paths = AppPaths::resolve(self.data_dir, self.schema)?;
        paths.ensure()?;
        logging::init(&paths.log_file, self.verbose && self.command.is_some())?;
        info!("Application start.");
        debug!("Data directory: {}", paths.data_dir.display());

        let store = TemplateStore::open(&paths.database_file, paths.schema_file.as_deref())?;

        let (mut store, result) = match self.command {
            None => {
                let mut app = App::new(store, paths.log_file.clone())?;
                let result = run_app(&mut app);
                (app.into_store(), result)
            }
            Some(command) => {
                let mut store = store;
                let result = run_command(command, &mut store, &mut io::stdout().lock());
                (store, result)
            }
        };

        if let Err(err) = store.close() {
            error!("Failed to close template store: {err:#}");
        }
        info!("Application close.");
        result
    }
}

fn require_template(store: &TemplateStore, id: i64) -> Result<Template> {
    store
        .fetch_template(id)?
        .ok_or_else(|| anyhow!(StoreError::NotFound))
        .with_context(|| format!("no template with id {id}"))
}

/// Run one non-interactive subcommand, writing its output to `out`.
pub fn run_command(
    command: Commands,
    store: &mut TemplateStore,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::Init => {
            writeln!(out, "Template store ready.")?;
        }
        Commands::Import {
            file,
            sheet,
            no_header,
            replace,
        } => {
            let options = ImportOptions {
                sheet,
                has_header: !no_header,
                replace,
            };
            let summary = import_spreadsheet(store, &file, &options)?;
            if !summary.succeeded() {
                return Err(anyhow!("no templates found in {}", file.display()));
            }
            writeln!(
                out,
                "Imported {} templates and {} tags.",
                summary.templates, summary.tags
            )?;
        }
        Commands::List { tag } => {
            let mut templates = match tag {
                Some(tag) => store.fetch_templates_for_tag(&tag)?,
                None => store.fetch_all_templates()?,
            };
            if templates.is_empty() {
                writeln!(out, "--Empty List--")?;
            }
            for template in &mut templates {
                store.fetch_metadata_for_template(template)?;
                write_summary(out, template)?;
            }
        }
        Commands::Add { title, body, tags } => {
            let mut template = Template::new(title, body).with_tags(tags.as_deref().unwrap_or(""));
            store.add_template(&mut template)?;
            write_summary(out, &template)?;
        }
        Commands::Edit {
            id,
            title,
            body,
            tags,
        } => {
            let mut template = require_template(store, id)?;
            if title.is_some() || body.is_some() {
                let title = title.unwrap_or_else(|| template.title().to_string());
                let body = body.unwrap_or_else(|| template.body().to_string());
                template.update_content(title, body);
            }
            if let Some(tags) = tags {
                template.set_tags(Tag::parse_list(&tags));
            }
            store.update_template(&mut template)?;
            write_summary(out, &template)?;
        }
        Commands::Delete { id } => {
            let mut template = require_template(store, id)?;
            store.delete_template(&mut template)?;
            writeln!(out, "Deleted {id}: {}", template.title())?;
        }
        Commands::Render { id, set } => {
            let mut template = require_template(store, id)?;
            if template.number_of_fields() > 0 || !set.is_empty() {
                template.set_fields(set)?;
            }
            writeln!(out, "{}", template.rendered_text()?)?;
        }
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, template: &Template) -> Result<()> {
    let tags = template
        .tags()
        .iter()
        .map(Tag::text)
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        out,
        "{}\t{}\t[{}]",
        template.id().unwrap_or_default(),
        template.title(),
        tags
    )?;
    Ok(())
}
