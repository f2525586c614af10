use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fields of an unsaved note held by the draft cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DraftKey {
    Title,
    Cues,
    NotesHtml,
    SummaryHtml,
}

impl DraftKey {
    pub fn all() -> &'static [DraftKey] {
        &[
            DraftKey::Title,
            DraftKey::Cues,
            DraftKey::NotesHtml,
            DraftKey::SummaryHtml,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKey::Title => "title",
            DraftKey::Cues => "cues",
            DraftKey::NotesHtml => "notes_html",
            DraftKey::SummaryHtml => "summary_html",
        }
    }
}

/// Ephemeral per-session storage for a note that has not been saved yet.
///
/// Owned by the editing session and cleared explicitly on save or discard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftCache {
    entries: BTreeMap<String, String>,
}

impl DraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: DraftKey, value: &str) {
        self.entries.insert(key.as_str().to_string(), value.to_string());
    }

    pub fn get(&self, key: DraftKey) -> Option<&str> {
        self.entries.get(key.as_str()).map(String::as_str)
    }

    pub fn remove(&mut self, key: DraftKey) -> Option<String> {
        self.entries.remove(key.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut draft = DraftCache::new();
        assert!(draft.is_empty());

        draft.set(DraftKey::Title, "Algebra");
        draft.set(DraftKey::NotesHtml, "<b>y</b>");
        assert_eq!(draft.get(DraftKey::Title), Some("Algebra"));
        assert_eq!(draft.get(DraftKey::Cues), None);

        assert_eq!(draft.remove(DraftKey::Title).as_deref(), Some("Algebra"));
        draft.clear();
        assert!(draft.is_empty());
    }

    #[test]
    fn test_serialized_keys_match_storage_names() {
        let mut draft = DraftCache::new();
        draft.set(DraftKey::SummaryHtml, "s");
        let json = serde_json::to_string(&draft).unwrap();
        assert_eq!(json, r#"{"entries":{"summary_html":"s"}}"#);
        assert_eq!(DraftKey::all().len(), 4);
    }
}
