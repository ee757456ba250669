use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use in_place::{EditOptions, InPlace, InPlaceError, Mode};
use similar::TextDiff;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "in-place")]
#[command(about = "Edit files in place, atomically", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every occurrence of a literal string
    Replace {
        /// File to edit
        file: PathBuf,

        /// Text to search for
        from: String,

        /// Replacement text
        to: String,

        #[command(flatten)]
        edit: EditArgs,
    },

    /// Strip trailing whitespace from every line
    Strip {
        /// File to edit
        file: PathBuf,

        #[command(flatten)]
        edit: EditArgs,
    },
}

#[derive(Args)]
struct EditArgs {
    /// Move the original file here once the edit is committed
    #[arg(long, conflicts_with = "backup_ext")]
    backup: Option<PathBuf>,

    /// Keep the original next to the file, with this suffix appended
    #[arg(long)]
    backup_ext: Option<OsString>,

    /// Open the file in binary mode ("b") or text mode ("t")
    #[arg(long, default_value = "t", value_parser = parse_mode)]
    mode: Mode,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,
}

impl EditArgs {
    fn options(&self) -> EditOptions {
        EditOptions {
            mode: self.mode,
            backup: self.backup.clone(),
            backup_ext: self.backup_ext.clone(),
            ..EditOptions::default()
        }
    }
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse().map_err(|e: in_place::ConfigError| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replace {
            file,
            from,
            to,
            edit,
        } => {
            if from.is_empty() {
                anyhow::bail!("Search text cannot be empty");
            }
            cmd_edit(&file, &edit, |line| line.replace(&from, &to))
        }

        Commands::Strip { file, edit } => cmd_edit(&file, &edit, strip_trailing_whitespace),
    }
}

/// Strip trailing whitespace, keeping the line terminator.
fn strip_trailing_whitespace(line: &str) -> String {
    let (body, terminator) = split_terminator(line);
    format!("{}{}", body.trim_end(), terminator)
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Run `transform` over every line of `file` inside one in-place session.
fn cmd_edit(file: &Path, args: &EditArgs, transform: impl Fn(&str) -> String) -> Result<()> {
    let options = args.options();

    let mut session =
        InPlace::open(file, &options).with_context(|| format!("Failed to open {}", file.display()))?;

    let (original, modified) = rewrite_lines(&mut session, &transform)
        .with_context(|| format!("Failed to edit {}", file.display()))?;

    if args.diff {
        let diff = format_diff(file, &original, &modified);
        if !diff.is_empty() {
            println!();
            print!("{diff}");
        }
    }

    if args.dry_run {
        session.rollback()?;
        if original == modified {
            println!("{} {}: no changes", "○".dimmed(), file.display());
        } else {
            println!("{} {}: would modify (dry run)", "✓".green(), file.display());
        }
        return Ok(());
    }

    session
        .commit()
        .with_context(|| format!("Failed to commit {}", file.display()))?;

    if original == modified {
        println!("{} {}: no changes", "○".dimmed(), file.display());
    } else {
        println!("{} {}: modified", "✓".green(), file.display());
        if let Some(backup) = session.backup_path() {
            println!("  Backup: {}", backup.display());
        }
    }

    Ok(())
}

/// Returns the original and rewritten content.
fn rewrite_lines(
    session: &mut InPlace,
    transform: &impl Fn(&str) -> String,
) -> Result<(String, String), InPlaceError> {
    let mut original = String::new();
    let mut modified = String::new();

    for line in session.read_lines()? {
        let new_line = transform(&line);
        session.write(&new_line)?;
        original.push_str(&line);
        modified.push_str(&new_line);
    }

    Ok((original, modified))
}

/// Render the change to `file` as a coloured unified diff with three lines
/// of context. Empty when nothing changed.
fn format_diff(file: &Path, original: &str, modified: &str) -> String {
    let old_header = format!("{} (original)", file.display());
    let new_header = format!("{} (edited)", file.display());
    let unified = TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&old_header, &new_header)
        .to_string();

    unified
        .split_inclusive('\n')
        .map(|line| {
            if line.starts_with("---") || line.starts_with("+++") {
                line.dimmed().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else {
                line.to_string()
            }
        })
        .collect()
}
