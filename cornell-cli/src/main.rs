//! Cornell CLI - manage Cornell notes and export them to PDF

mod io;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cornell_core::annotation::Point;
use cornell_core::{
    sorted_for_display, App, ExportOptions, Focus, JsonFileStore, Note, NoteFields, NoteStore,
};

#[derive(Parser)]
#[command(name = "cornell")]
#[command(about = "Cornell notes: take, style, annotate and export notes")]
struct Cli {
    /// Notes file (defaults to ~/.cornell/notes.json)
    #[arg(long, global = true, env = "CORNELL_NOTES_FILE")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Which rich region of a note a command edits
#[derive(Args, Debug, Clone, Copy)]
struct Target {
    /// Edit the summary instead of the notes body
    #[arg(long)]
    summary: bool,
}

impl Target {
    fn focus(self) -> Focus {
        if self.summary {
            Focus::Summary
        } else {
            Focus::Body
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List notes, most recently updated first
    List,
    /// Print one note
    Show {
        id: String,
        /// Print the stored JSON record
        #[arg(long)]
        json: bool,
    },
    /// Create a note
    New {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        cues: String,
        /// Notes body markup
        #[arg(long, default_value = "")]
        notes: String,
        /// Summary markup
        #[arg(long, default_value = "")]
        summary: String,
    },
    /// Change fields of a note; omitted fields are kept
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        cues: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Delete a note
    Delete { id: String },
    /// Render a note to PDF
    Export {
        id: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Device pixel ratio to render at (capped at 2)
        #[arg(long)]
        scale: Option<f32>,
        /// JSON file with export options
        #[arg(long)]
        options: Option<PathBuf>,
    },
    /// Embed an image file into a note
    AttachImage {
        id: String,
        path: PathBuf,
        /// Insertion position (defaults to the end)
        #[arg(long)]
        at: Option<usize>,
        #[command(flatten)]
        target: Target,
    },
    /// Style a range of a note
    Style {
        id: String,
        #[arg(long)]
        start: usize,
        #[arg(long)]
        end: usize,
        #[arg(long)]
        bold: bool,
        /// Font size in px
        #[arg(long)]
        size: Option<u32>,
        /// Text color
        #[arg(long)]
        color: Option<String>,
        /// Highlight color
        #[arg(long)]
        highlight: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// Draw a freehand annotation from a JSON stroke list and embed it
    Annotate {
        id: String,
        strokes: PathBuf,
        #[arg(long, default_value_t = 600)]
        width: u32,
        #[arg(long, default_value_t = 300)]
        height: u32,
        /// Device pixel ratio of the drawing surface
        #[arg(long, default_value_t = 1.0)]
        dpr: f32,
        /// Insertion position (defaults to the end)
        #[arg(long)]
        at: Option<usize>,
        #[command(flatten)]
        target: Target,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("cornell_core=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let data_file = match cli.data_file {
        Some(path) => path,
        None => io::default_notes_file()?,
    };
    let store = JsonFileStore::new(data_file);

    run(cli.command, &store)
}

fn run(command: Commands, store: &dyn NoteStore) -> Result<()> {
    match command {
        Commands::List => {
            let notes = sorted_for_display(store.list()?);
            if notes.is_empty() {
                println!("No notes found.");
            }
            for record in notes {
                let note = Note::from_record(&record);
                println!("{}  {}  ({} words)", record.id, note.display_title(), note.word_count());
            }
        }
        Commands::Show { id, json } => {
            let record = store.get(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let note = Note::from_record(&record);
                println!("# {}", note.display_title());
                if !note.cues.is_empty() {
                    println!("Cues: {}", note.cues);
                }
                println!("\n{}", note.body.plain_text());
                if !note.summary.is_empty() {
                    println!("\nSummary: {}", note.summary.plain_text());
                }
            }
        }
        Commands::New {
            title,
            cues,
            notes,
            summary,
        } => {
            let record = store.create(NoteFields {
                cues: Some(cues),
                notes: Some(notes),
                summary: Some(summary),
                ..NoteFields::title(title)
            })?;
            println!("Created note {}", record.id);
        }
        Commands::Update {
            id,
            title,
            cues,
            notes,
            summary,
        } => {
            let record = store.update(
                &id,
                NoteFields {
                    title,
                    cues,
                    notes,
                    summary,
                    ..NoteFields::default()
                },
            )?;
            println!("Updated note {}", record.id);
        }
        Commands::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted note {}", id);
        }
        Commands::Export {
            id,
            out,
            scale,
            options,
        } => {
            let mut export_options = match options {
                Some(path) => io::load_export_options(&path)?,
                None => ExportOptions::default(),
            };
            if scale.is_some() {
                export_options.device_scale = scale;
            }

            let note = Note::from_record(&store.get(&id)?);
            let artifact = cornell_core::export_note(&note, &export_options)
                .with_context(|| format!("Failed to export note {}", id))?;
            let path = io::write_artifact(&out, &artifact)?;
            tracing::info!(
                id = %id,
                path = %path.display(),
                pages = artifact.pages.len(),
                skipped_images = artifact.skipped_images,
                "exported note"
            );
            println!("Wrote {} ({} pages)", path.display(), artifact.pages.len());
            if artifact.skipped_images > 0 {
                println!("{} image(s) kept at original quality", artifact.skipped_images);
            }
        }
        Commands::AttachImage {
            id,
            path,
            at,
            target,
        } => {
            let bytes = io::read_bytes(&path)?;
            let mut app = open(store, &id, target, at)?;
            if !app.insert_image_file(&bytes, Instant::now()) {
                bail!("{} is not a readable image", path.display());
            }
            save(&mut app, store)?;
        }
        Commands::Style {
            id,
            start,
            end,
            bold,
            size,
            color,
            highlight,
            target,
        } => {
            if !bold && size.is_none() && color.is_none() && highlight.is_none() {
                bail!("Nothing to apply: pass --bold, --size, --color or --highlight");
            }
            let mut app = open(store, &id, target, None)?;
            // Each wrap collapses the selection, so reselect before every style
            let mut changed = false;
            if bold {
                app.select(start, end);
                changed |= app.apply_weight();
            }
            if let Some(px) = size {
                app.select(start, end);
                changed |= app.apply_font_size(px);
            }
            if let Some(color) = &color {
                app.select(start, end);
                changed |= app.apply_text_color(color);
            }
            if let Some(color) = &highlight {
                app.select(start, end);
                changed |= app.apply_highlight(color);
            }
            if !changed {
                println!("Empty range, note unchanged");
                return Ok(());
            }
            save(&mut app, store)?;
        }
        Commands::Annotate {
            id,
            strokes,
            width,
            height,
            dpr,
            at,
            target,
        } => {
            let strokes = io::load_strokes(&strokes)?;
            let mut app = open(store, &id, target, at)?;
            app.open_annotation(width, height, Point::new(0.0, 0.0), dpr);
            if let Some(surface) = app.annotation_mut() {
                io::replay_strokes(surface, &strokes);
            }
            app.commit_annotation().context("Failed to capture annotation")?;
            save(&mut app, store)?;
        }
    }

    Ok(())
}

/// Load a stored note into an editing session with the cursor placed
fn open(store: &dyn NoteStore, id: &str, target: Target, at: Option<usize>) -> Result<App> {
    let record = store.get(id)?;
    let mut app = App::new();
    app.load_note(&record);
    app.focus = target.focus();
    let position = at.unwrap_or_else(|| app.region(app.focus).len());
    app.set_cursor(position);
    Ok(app)
}

/// Persist only the region the command edited
fn save(app: &mut App, store: &dyn NoteStore) -> Result<()> {
    let now = Instant::now();
    let record = app.save_region(store, app.focus, now)?;
    tracing::info!(id = %record.id, focus = ?app.focus, "saved note");
    println!("{}: note {}", app.status(now).unwrap_or("Saved"), record.id);
    Ok(())
}
