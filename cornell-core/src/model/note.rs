use chrono::{DateTime, Utc};

use super::ContentTree;
use crate::markup;
use crate::store::{NoteFields, NoteRecord};

/// A Cornell note with its rich regions parsed into content trees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    /// Assigned by the store on first save
    pub id: Option<String>,
    pub title: String,
    pub cues: String,
    pub body: ContentTree,
    pub summary: ContentTree,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn new(title: impl Into<String>, cues: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cues: cues.into(),
            ..Self::default()
        }
    }

    /// Parse a stored record. Markup is parsed tolerantly, never fails.
    pub fn from_record(record: &NoteRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            title: record.title.clone(),
            cues: record.cues.clone(),
            body: markup::parse(&record.notes),
            summary: markup::parse(&record.summary),
            updated_at: record.updated_at.and_then(DateTime::from_timestamp_millis),
        }
    }

    /// Serialize every field for a create or full update
    pub fn to_fields(&self) -> NoteFields {
        NoteFields {
            title: Some(self.title.clone()),
            cues: Some(self.cues.clone()),
            notes: Some(markup::serialize(&self.body)),
            summary: Some(markup::serialize(&self.summary)),
            updated_at: self.updated_at.map(|t| t.timestamp_millis()),
            ..NoteFields::default()
        }
    }

    /// Display title, falling back like the note list does
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    pub fn word_count(&self) -> usize {
        [
            self.cues.clone(),
            self.body.plain_text(),
            self.summary.plain_text(),
        ]
        .iter()
        .map(|s| s.split_whitespace().count())
        .sum()
    }
}
