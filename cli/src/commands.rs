//! Command definitions and their execution against a [`ThemeManager`].

use clap::{Parser, Subcommand, ValueEnum};
use registry::catalog::ThemeRecord;
use registry::config::InstallSource;
use registry::manager::ThemeManager;
use registry::validation::slugify;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

#[derive(Debug, Parser)]
#[command(name = "themectl", version, about = "Manage installed themes")]
pub struct Cli {
    /// Configuration file (defaults to ./themectl.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceType {
    Auto,
    Zip,
    Git,
    Local,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List discovered themes
    List {
        #[arg(long, conflicts_with = "invalid")]
        valid: bool,
        #[arg(long)]
        invalid: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one theme in detail
    Show {
        slug: String,
        #[arg(long)]
        json: bool,
    },
    /// Print catalog counts
    Stats,
    /// Install a theme from a zip archive, git repository or local directory
    Install {
        source: String,
        #[arg(long = "type", value_enum, default_value_t = SourceType::Auto)]
        source_type: SourceType,
        /// Target slug (local installs only)
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        activate: bool,
    },
    /// Copy an installed theme into a new child theme
    Clone {
        source: String,
        name: String,
        /// Defaults to the slugified name
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        activate: bool,
    },
    /// Make a theme the active one
    Activate { slug: String },
    /// Delete one or more themes
    Delete {
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Reinstall a theme from the GitHub repository in its homepage
    Update { slug: String },
    /// Show deletability and validation details
    Debug { slug: Option<String> },
    /// Drop the cached catalog
    Refresh,
}

/// Decides how to install `source` when `--type` is `auto`.
pub fn detect_source(source: &str, requested: SourceType) -> AppResult<InstallSource> {
    match requested {
        SourceType::Zip => Ok(InstallSource::Zip),
        SourceType::Git => Ok(InstallSource::Git),
        SourceType::Local => Ok(InstallSource::Local),
        SourceType::Auto => {
            if source.to_lowercase().ends_with(".zip") {
                Ok(InstallSource::Zip)
            } else if Path::new(source).is_dir() {
                Ok(InstallSource::Local)
            } else if source.contains("github.com") || source.contains('/') {
                Ok(InstallSource::Git)
            } else {
                Err(AppError::Usage(format!(
                    "Cannot tell what kind of source '{source}' is; pass --type zip|git|local"
                )))
            }
        }
    }
}

/// Runs one command. `Ok(false)` means the command ran but only partly
/// succeeded (for example a bulk delete with skipped themes).
pub fn execute(command: Command, manager: &ThemeManager) -> AppResult<bool> {
    match command {
        Command::List {
            valid,
            invalid,
            json,
        } => {
            let query = manager.query();
            let themes = if valid {
                query.valid()?
            } else if invalid {
                query.invalid()?
            } else {
                query.all()?
            };
            if json {
                print_json(&themes)?;
            } else if themes.is_empty() {
                println!("No themes found in {}", query.themes_path().display());
            } else {
                print!("{}", render_list(&themes));
            }
            Ok(true)
        }
        Command::Show { slug, json } => {
            let record = manager.query().find_by_slug(&slug)?.ok_or_else(|| {
                AppError::Theme(registry::ThemeError::NotFound { slug: slug.clone() })
            })?;
            if json {
                print_json(&record)?;
            } else {
                print!("{}", render_details(&record, manager));
            }
            Ok(true)
        }
        Command::Stats => {
            let stats = manager.query().stats()?;
            println!("Total:    {}", stats.total);
            println!("Active:   {}", stats.active);
            println!("Inactive: {}", stats.inactive);
            println!("Valid:    {}", stats.valid);
            println!("Invalid:  {}", stats.invalid);
            Ok(true)
        }
        Command::Install {
            source,
            source_type,
            slug,
            activate,
        } => {
            let kind = detect_source(&source, source_type)?;
            if slug.is_some() && kind != InstallSource::Local {
                return Err(AppError::Usage(
                    "--slug is only supported for local installs".to_string(),
                ));
            }

            let lifecycle = manager.lifecycle();
            let installed = match kind {
                InstallSource::Zip => lifecycle.install_from_zip(Path::new(&source))?,
                InstallSource::Git => lifecycle.install_from_remote(&source)?,
                InstallSource::Local => {
                    lifecycle.install_from_local(Path::new(&source), slug.as_deref())?
                }
            };

            let verb = if installed.replaced { "Replaced" } else { "Installed" };
            println!(
                "{verb} theme '{}' at {}",
                installed.slug,
                installed.path.display()
            );
            if activate && !installed.activated {
                lifecycle.activate(&installed.slug)?;
            }
            if activate || installed.activated {
                println!("Activated theme '{}'", installed.slug);
            }
            Ok(true)
        }
        Command::Clone {
            source,
            name,
            slug,
            activate,
        } => {
            let new_slug = slug.unwrap_or_else(|| slugify(&name));
            if new_slug.is_empty() {
                return Err(AppError::Usage(format!(
                    "Cannot derive a slug from '{name}'; pass --slug"
                )));
            }

            let path = manager.lifecycle().clone_theme(&source, &new_slug, &name)?;
            println!("Cloned '{source}' to '{new_slug}' at {}", path.display());
            if activate {
                manager.lifecycle().activate(&new_slug)?;
                println!("Activated theme '{new_slug}'");
            }
            Ok(true)
        }
        Command::Activate { slug } => {
            manager.lifecycle().activate(&slug)?;
            println!("Activated theme '{slug}'");
            Ok(true)
        }
        Command::Delete { slugs } => {
            if let [slug] = slugs.as_slice() {
                manager.lifecycle().delete(slug)?;
                println!("Deleted theme '{slug}'");
                return Ok(true);
            }

            let result = manager.lifecycle().bulk_delete(&slugs);
            for slug in &result.deleted {
                println!("deleted  {slug}");
            }
            for skipped in &result.skipped {
                println!("skipped  {} ({})", skipped.slug, skipped.reason);
            }
            for failed in &result.errored {
                println!("error    {}: {}", failed.slug, failed.error);
            }
            println!("{}", result.summary());
            Ok(result.is_complete_success())
        }
        Command::Update { slug } => {
            let installed = manager.lifecycle().update_from_homepage(&slug)?;
            println!(
                "Updated theme '{slug}' (installed as '{}')",
                installed.slug
            );
            Ok(true)
        }
        Command::Debug { slug } => {
            let themes = manager.query().all()?;
            print!("{}", render_debug_table(&themes, manager));
            if let Some(slug) = slug {
                print!("{}", render_debug_reasons(&slug, manager)?);
            }
            Ok(true)
        }
        Command::Refresh => {
            manager.lifecycle().refresh();
            println!("Theme cache cleared");
            Ok(true)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Usage(format!("Failed to serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Left-aligned table with a header row and columns sized to fit.
pub fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: Vec<&str>| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", line.join("  ").trim_end())
    };

    let mut out = format_row(header.to_vec());
    for row in rows {
        out.push_str(&format_row(row.iter().map(String::as_str).collect()));
    }
    out
}

pub fn render_list(themes: &[ThemeRecord]) -> String {
    let rows: Vec<Vec<String>> = themes
        .iter()
        .map(|theme| {
            let status = match (theme.active, theme.is_valid) {
                (true, _) => "active",
                (false, true) => "valid",
                (false, false) => "invalid",
            };
            vec![
                theme.slug().to_string(),
                theme.name().to_string(),
                theme.descriptor.version.clone(),
                status.to_string(),
            ]
        })
        .collect();
    render_table(&["SLUG", "NAME", "VERSION", "STATUS"], &rows)
}

fn render_details(record: &ThemeRecord, manager: &ThemeManager) -> String {
    let d = &record.descriptor;
    let mut out = String::new();
    let mut line = |label: &str, value: &str| out.push_str(&format!("{label:<12} {value}\n"));

    line("Name", &d.name);
    line("Slug", &d.slug);
    line("Version", &d.version);
    line("Path", &record.path.display().to_string());
    line("Active", yes_no(record.active));
    line("Valid", yes_no(record.is_valid));
    if let Some(description) = &d.description {
        line("Description", description);
    }
    if let Some(author) = &d.author {
        line("Author", author);
    }
    if let Some(parent) = &d.parent {
        line("Parent", parent);
    }
    if let Some(homepage) = &d.homepage {
        line("Homepage", homepage);
    }
    if !d.supports.is_empty() {
        line("Supports", &d.supports.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    line(
        "Files",
        &format!(
            "{} template(s), {} stylesheet(s), {} script(s), {} bytes",
            record.metadata.template_files,
            record.metadata.stylesheet_files,
            record.metadata.script_files,
            record.metadata.size_bytes
        ),
    );
    for error in &record.errors {
        line("Error", error);
    }
    if let Ok(unmet) = manager.query().requirement_errors(d.slug.as_str()) {
        for requirement in unmet {
            line("Requirement", &requirement);
        }
    }
    out
}

fn render_debug_table(themes: &[ThemeRecord], manager: &ThemeManager) -> String {
    let query = manager.query();
    let rows: Vec<Vec<String>> = themes
        .iter()
        .map(|theme| {
            vec![
                theme.slug().to_string(),
                theme.name().to_string(),
                yes_no(theme.active).to_string(),
                yes_no(theme.is_valid).to_string(),
                yes_no(query.is_protected(theme.slug())).to_string(),
                yes_no(query.can_delete(theme.slug())).to_string(),
                yes_no(theme.path.is_dir()).to_string(),
            ]
        })
        .collect();

    let mut out = format!(
        "Active theme: {}\nProtected: {}\n\n",
        query.active_slug(),
        query.protected_themes().join(", ")
    );
    out.push_str(&render_table(
        &["SLUG", "NAME", "ACTIVE", "VALID", "PROTECTED", "CAN DELETE", "PATH EXISTS"],
        &rows,
    ));
    out
}

fn render_debug_reasons(slug: &str, manager: &ThemeManager) -> AppResult<String> {
    let query = manager.query();
    let mut out = format!("\nTheme '{slug}':\n");

    if !query.exists(slug)? {
        out.push_str("  not found in catalog\n");
        return Ok(out);
    }

    let blockers = query.deletion_blockers(slug);
    if blockers.is_empty() {
        out.push_str("  can be deleted\n");
    } else {
        out.push_str(&format!("  cannot be deleted: {}\n", blockers.join(", ")));
    }
    if let Some(record) = query.find_by_slug(slug)? {
        for error in &record.errors {
            out.push_str(&format!("  validation: {error}\n"));
        }
    }
    for requirement in query.requirement_errors(slug)? {
        out.push_str(&format!("  requirement: {requirement}\n"));
    }
    Ok(out)
}
