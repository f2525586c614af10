//! File I/O for the CLI

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use cornell_core::annotation::Point;
use cornell_core::{AnnotationSurface, ExportArtifact, ExportOptions};

/// Get the ~/.cornell directory path, creating it if needed
pub fn cornell_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let cornell_dir = home.join(".cornell");

    if !cornell_dir.exists() {
        fs::create_dir_all(&cornell_dir)
            .with_context(|| format!("Failed to create {}", cornell_dir.display()))?;
    }

    Ok(cornell_dir)
}

/// Default note file, ~/.cornell/notes.json
pub fn default_notes_file() -> Result<PathBuf> {
    Ok(cornell_dir()?.join("notes.json"))
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Read export options from a JSON file; missing keys keep their defaults
pub fn load_export_options(path: &Path) -> Result<ExportOptions> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid export options in {}", path.display()))
}

/// Write the exported PDF into `dir` under its derived file name
pub fn write_artifact(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(&artifact.file_name);
    fs::write(&path, &artifact.pdf)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// One recorded pen stroke, in CSS pixels relative to the page
#[derive(Debug, Clone, Deserialize)]
pub struct StrokeSpec {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub width: Option<f32>,
    pub points: Vec<(f32, f32)>,
}

pub fn load_strokes(path: &Path) -> Result<Vec<StrokeSpec>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid stroke list in {}", path.display()))
}

/// Replay strokes as pointer down / move / up events
pub fn replay_strokes(surface: &mut AnnotationSurface, strokes: &[StrokeSpec]) {
    for stroke in strokes {
        if let Some(color) = &stroke.color {
            surface.set_pen_color(color);
        }
        if let Some(width) = stroke.width {
            surface.set_pen_width(width);
        }
        let mut points = stroke.points.iter().map(|&(x, y)| Point::new(x, y));
        let Some(first) = points.next() else {
            continue;
        };
        surface.begin_stroke(first);
        for point in points {
            surface.extend_stroke(point);
        }
        surface.end_stroke();
    }
}
