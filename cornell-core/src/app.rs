use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::annotation::{AnnotationSurface, Point};
use crate::cursor::Region;
use crate::draft::{DraftCache, DraftKey};
use crate::error::{CaptureError, ExportError, StoreError};
use crate::export::{export_note, ExportArtifact, ExportOptions};
use crate::model::{Cursor, Note};
use crate::store::{NoteFields, NoteRecord, NoteStore};

/// How long a status notice stays visible
pub const STATUS_TTL: Duration = Duration::from_secs(2);

/// Which rich region receives edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Body,
    Summary,
}

/// Session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Editing,
    Annotating,
}

/// Transient message such as `Saved` or `Save failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotice {
    pub message: String,
    pub shown_at: Instant,
}

/// Editing session for one note
pub struct App {
    pub session_id: Uuid,
    pub focus: Focus,
    pub mode: Mode,
    note_id: Option<String>,
    title: String,
    cues: String,
    body: Region,
    summary: Region,
    draft: DraftCache,

    // Annotation state
    annotation: Option<AnnotationSurface>,
    annotation_target: Option<(Focus, Cursor)>,

    status: Option<StatusNotice>,
}

impl App {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            focus: Focus::Body,
            mode: Mode::Editing,
            note_id: None,
            title: String::new(),
            cues: String::new(),
            body: Region::default(),
            summary: Region::default(),
            draft: DraftCache::new(),
            annotation: None,
            annotation_target: None,
            status: None,
        }
    }

    /// Continue an unsaved note from a draft snapshot
    pub fn resume_draft(draft: DraftCache) -> Self {
        let mut app = Self::new();
        app.title = draft.get(DraftKey::Title).unwrap_or_default().to_string();
        app.cues = draft.get(DraftKey::Cues).unwrap_or_default().to_string();
        app.body = Region::from_markup(draft.get(DraftKey::NotesHtml).unwrap_or_default());
        app.summary = Region::from_markup(draft.get(DraftKey::SummaryHtml).unwrap_or_default());
        app.draft = draft;
        app
    }

    /// Start a fresh unsaved note. Any previous draft is dropped.
    pub fn open_create(&mut self) {
        let session_id = self.session_id;
        *self = Self::new();
        self.session_id = session_id;
    }

    /// Edit a stored note. The draft cache is not consulted for it.
    pub fn load_note(&mut self, record: &NoteRecord) {
        let note = Note::from_record(record);
        self.open_create();
        self.note_id = note.id;
        self.title = note.title;
        self.cues = note.cues;
        self.body = Region::new(note.body);
        self.summary = Region::new(note.summary);
    }

    pub fn note_id(&self) -> Option<&str> {
        self.note_id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cues(&self) -> &str {
        &self.cues
    }

    pub fn body(&self) -> &Region {
        &self.body
    }

    pub fn summary(&self) -> &Region {
        &self.summary
    }

    pub fn draft(&self) -> &DraftCache {
        &self.draft
    }

    pub fn region(&self, focus: Focus) -> &Region {
        match focus {
            Focus::Body => &self.body,
            Focus::Summary => &self.summary,
        }
    }

    /// The focused region. Edits made through it are not mirrored into the
    /// draft until the next session-level edit or [`App::sync_draft`].
    pub fn focused_mut(&mut self) -> &mut Region {
        match self.focus {
            Focus::Body => &mut self.body,
            Focus::Summary => &mut self.summary,
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.sync_draft();
    }

    pub fn set_cues(&mut self, cues: &str) {
        self.cues = cues.to_string();
        self.sync_draft();
    }

    /// Mirror every field into the draft cache while the note is unsaved
    pub fn sync_draft(&mut self) {
        if self.note_id.is_some() {
            return;
        }
        self.draft.set(DraftKey::Title, &self.title);
        self.draft.set(DraftKey::Cues, &self.cues);
        self.draft.set(DraftKey::NotesHtml, &self.body.to_markup());
        self.draft.set(DraftKey::SummaryHtml, &self.summary.to_markup());
    }

    fn edit<T>(&mut self, change: impl FnOnce(&mut Region) -> T) -> T {
        let result = change(self.focused_mut());
        self.sync_draft();
        result
    }

    pub fn select(&mut self, start: usize, end: usize) {
        self.focused_mut().select(start, end);
    }

    pub fn set_cursor(&mut self, position: usize) {
        self.focused_mut().set_cursor(position);
    }

    pub fn insert_text(&mut self, text: &str) {
        self.edit(|region| region.insert_text(text));
    }

    pub fn insert_line_break(&mut self) {
        self.edit(Region::insert_line_break);
    }

    pub fn apply_weight(&mut self) -> bool {
        self.edit(Region::apply_weight)
    }

    pub fn apply_font_size(&mut self, px: u32) -> bool {
        self.edit(|region| region.apply_font_size(px))
    }

    pub fn apply_text_color(&mut self, color: &str) -> bool {
        self.edit(|region| region.apply_text_color(color))
    }

    pub fn apply_highlight(&mut self, color: &str) -> bool {
        self.edit(|region| region.apply_highlight(color))
    }

    /// Embed an image file at the cursor. Unreadable files leave the note
    /// untouched and raise a status notice.
    pub fn insert_image_file(&mut self, bytes: &[u8], now: Instant) -> bool {
        match self.edit(|region| region.insert_image_file(bytes)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "image not inserted");
                self.set_status("Could not read image", now);
                false
            }
        }
    }

    /// Open the drawing surface over the focused region. The current cursor
    /// is remembered as the insertion point for the committed drawing.
    pub fn open_annotation(&mut self, css_width: u32, css_height: u32, origin: Point, device_pixel_ratio: f32) {
        let cursor = self.region(self.focus).cursor_state().cursor();
        self.annotation = Some(AnnotationSurface::new(css_width, css_height, origin, device_pixel_ratio));
        self.annotation_target = Some((self.focus, cursor));
        self.mode = Mode::Annotating;
    }

    pub fn annotation(&self) -> Option<&AnnotationSurface> {
        self.annotation.as_ref()
    }

    pub fn annotation_mut(&mut self) -> Option<&mut AnnotationSurface> {
        self.annotation.as_mut()
    }

    /// Commit the drawing into the region it was opened over. Returns
    /// `Ok(false)` when no surface is open.
    pub fn commit_annotation(&mut self) -> Result<bool, CaptureError> {
        let Some(surface) = self.annotation.as_mut() else {
            return Ok(false);
        };
        let image = surface.commit()?;
        let (focus, cursor) = self
            .annotation_target
            .take()
            .unwrap_or((self.focus, Cursor::at(0)));
        self.close_annotation();

        self.focus = focus;
        self.edit(|region| {
            region.set_cursor(cursor.position);
            region.insert_annotation(image);
        });
        Ok(true)
    }

    /// Discard the drawing surface
    pub fn close_annotation(&mut self) {
        if let Some(mut surface) = self.annotation.take() {
            surface.close();
        }
        self.annotation_target = None;
        self.mode = Mode::Editing;
    }

    /// Snapshot of the note as it would be saved
    pub fn to_note(&self) -> Note {
        Note {
            id: self.note_id.clone(),
            title: self.title.clone(),
            cues: self.cues.clone(),
            body: self.body.tree().clone(),
            summary: self.summary.tree().clone(),
            updated_at: None,
        }
    }

    /// Create or update the note in `store`. On success the note takes the
    /// stored id and the draft is cleared.
    pub fn save(&mut self, store: &dyn NoteStore, now: Instant) -> Result<NoteRecord, StoreError> {
        let fields = self.to_note().to_fields();
        self.persist(store, fields, now)
    }

    /// Like [`App::save`] but writes only the markup of one rich region.
    /// Stored title, cues and the other region are left byte for byte.
    pub fn save_region(
        &mut self,
        store: &dyn NoteStore,
        focus: Focus,
        now: Instant,
    ) -> Result<NoteRecord, StoreError> {
        let markup = self.region(focus).to_markup();
        let fields = match focus {
            Focus::Body => NoteFields {
                notes: Some(markup),
                ..NoteFields::default()
            },
            Focus::Summary => NoteFields {
                summary: Some(markup),
                ..NoteFields::default()
            },
        };
        self.persist(store, fields, now)
    }

    fn persist(
        &mut self,
        store: &dyn NoteStore,
        mut fields: NoteFields,
        now: Instant,
    ) -> Result<NoteRecord, StoreError> {
        let _span = tracing::info_span!("save", session = %self.session_id).entered();
        fields.updated_at = Some(Utc::now().timestamp_millis());

        let result = match self.note_id.as_deref() {
            Some(id) => store.update(id, fields),
            None => store.create(fields),
        };

        match &result {
            Ok(record) => {
                tracing::debug!(id = %record.id, "note saved");
                self.note_id = Some(record.id.clone());
                self.draft.clear();
                self.set_status("Saved", now);
            }
            Err(e) => {
                tracing::warn!(error = %e, "save failed");
                self.set_status("Save failed", now);
            }
        }
        result
    }

    /// Throw away unsaved edits of a new note
    pub fn discard_draft(&mut self) {
        if self.note_id.is_none() {
            self.open_create();
        }
    }

    pub fn export(&self, options: &ExportOptions) -> Result<ExportArtifact, ExportError> {
        export_note(&self.to_note(), options)
    }

    pub fn set_status(&mut self, message: &str, now: Instant) {
        self.status = Some(StatusNotice {
            message: message.to_string(),
            shown_at: now,
        });
    }

    /// Current status message, if it has not expired
    pub fn status(&self, now: Instant) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|s| now.saturating_duration_since(s.shown_at) < STATUS_TTL)
            .map(|s| s.message.as_str())
    }

    /// Drop an expired status notice
    pub fn tick(&mut self, now: Instant) {
        if self.status(now).is_none() {
            self.status = None;
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, StyleDescriptor};
    use crate::store::MemoryStore;
    use crate::test_support::png_bytes;

    struct FailingStore;

    impl NoteStore for FailingStore {
        fn list(&self) -> Result<Vec<NoteRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn get(&self, id: &str) -> Result<NoteRecord, StoreError> {
            Err(StoreError::NotFound(id.to_string()))
        }
        fn create(&self, _fields: NoteFields) -> Result<NoteRecord, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn update(&self, _id: &str, _fields: NoteFields) -> Result<NoteRecord, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn delete(&self, id: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    #[test]
    fn test_edits_are_mirrored_into_draft() {
        let mut app = App::new();
        app.set_title("Algebra");
        app.insert_text("y=mx+b");
        app.select(0, 6);
        assert!(app.apply_weight());

        assert_eq!(app.draft().get(DraftKey::Title), Some("Algebra"));
        assert_eq!(
            app.draft().get(DraftKey::NotesHtml),
            Some("<span style=\"font-weight: 700;\">y=mx+b</span>")
        );

        let resumed = App::resume_draft(app.draft().clone());
        assert_eq!(resumed.title(), "Algebra");
        assert_eq!(resumed.body().tree(), app.body().tree());
    }

    #[test]
    fn test_save_creates_then_updates() {
        let store = MemoryStore::new();
        let now = Instant::now();
        let mut app = App::new();
        app.set_title("Algebra");
        app.set_cues("slope");

        let created = app.save(&store, now).unwrap();
        assert_eq!(app.note_id(), Some(created.id.as_str()));
        assert!(app.draft().is_empty());
        assert_eq!(app.status(now), Some("Saved"));

        app.set_title("Algebra II");
        assert!(app.draft().is_empty());
        let updated = app.save(&store, now).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get(&created.id).unwrap().title, "Algebra II");
    }

    #[test]
    fn test_save_region_leaves_other_fields_as_stored() {
        let store = MemoryStore::new();
        let now = Instant::now();
        let record = store
            .create(NoteFields {
                cues: Some("  raw cues ".into()),
                notes: Some("body".into()),
                summary: Some("<i>keep</i> &eacute;<div>as is</div>".into()),
                ..NoteFields::title("t")
            })
            .unwrap();

        let mut app = App::new();
        app.load_note(&record);
        app.select(0, 4);
        assert!(app.apply_weight());
        app.save_region(&store, Focus::Body, now).unwrap();

        let stored = store.get(&record.id).unwrap();
        assert_eq!(stored.notes, "<span style=\"font-weight: 700;\">body</span>");
        assert_eq!(stored.summary, "<i>keep</i> &eacute;<div>as is</div>");
        assert_eq!(stored.cues, "  raw cues ");
        assert_eq!(app.status(now), Some("Saved"));
    }

    #[test]
    fn test_save_failure_sets_transient_status() {
        let now = Instant::now();
        let mut app = App::new();
        app.set_title("x");

        assert!(app.save(&FailingStore, now).is_err());
        assert_eq!(app.status(now), Some("Save failed"));
        assert!(!app.draft().is_empty());

        let later = now + STATUS_TTL;
        assert_eq!(app.status(later), None);
        app.tick(later);
        assert_eq!(app.status(now), None);
    }

    #[test]
    fn test_load_note_ignores_draft() {
        let store = MemoryStore::new();
        let record = store
            .create(NoteFields {
                notes: Some("<b>bold</b>".into()),
                ..NoteFields::title("Stored")
            })
            .unwrap();

        let mut app = App::new();
        app.set_title("unsaved");
        app.load_note(&record);

        assert_eq!(app.title(), "Stored");
        assert_eq!(app.body().tree().plain_text(), "bold");
        assert!(app.draft().is_empty());

        app.set_title("changed");
        assert!(app.draft().is_empty());
    }

    #[test]
    fn test_discard_draft() {
        let mut app = App::new();
        app.set_title("scratch");
        app.insert_text("text");
        app.discard_draft();

        assert!(app.draft().is_empty());
        assert_eq!(app.title(), "");
        assert!(app.body().is_empty());
    }

    #[test]
    fn test_focus_routes_edits() {
        let mut app = App::new();
        app.insert_text("body");
        app.focus = Focus::Summary;
        app.insert_text("sum");
        app.select(0, 3);
        app.apply_highlight("yellow");

        assert_eq!(app.body().to_markup(), "body");
        assert_eq!(
            app.summary().to_markup(),
            "<span style=\"background-color: yellow;\">sum</span>"
        );
    }

    #[test]
    fn test_bad_image_file_sets_status() {
        let now = Instant::now();
        let mut app = App::new();
        app.insert_text("ab");

        assert!(!app.insert_image_file(b"nope", now));
        assert_eq!(app.body().to_markup(), "ab");
        assert_eq!(app.status(now), Some("Could not read image"));

        assert!(app.insert_image_file(&png_bytes(4, 4), now));
        assert_eq!(app.body().tree().image_count(), 1);
    }

    #[test]
    fn test_annotation_lands_at_remembered_cursor() {
        let mut app = App::new();
        app.insert_text("abcd");
        app.set_cursor(2);
        app.open_annotation(40, 20, Point::new(0.0, 0.0), 1.0);
        assert_eq!(app.mode, Mode::Annotating);

        // Cursor moves while drawing; the drawing still goes to position 2
        app.set_cursor(4);
        let surface = app.annotation_mut().unwrap();
        assert!(surface.begin_stroke(Point::new(1.0, 1.0)));
        assert!(surface.extend_stroke(Point::new(30.0, 10.0)));
        surface.end_stroke();

        assert!(app.commit_annotation().unwrap());
        assert_eq!(app.mode, Mode::Editing);
        assert!(app.annotation().is_none());
        assert!(matches!(app.body().tree().nodes()[1], Node::Image(_)));
        assert_eq!(app.body().cursor_state().cursor(), Cursor::at(3));
    }

    #[test]
    fn test_commit_while_stroking_is_rejected() {
        let mut app = App::new();
        app.open_annotation(10, 10, Point::new(0.0, 0.0), 2.0);
        let surface = app.annotation_mut().unwrap();
        surface.begin_stroke(Point::new(1.0, 1.0));

        assert!(matches!(app.commit_annotation(), Err(CaptureError::Stroking)));
        assert_eq!(app.mode, Mode::Annotating);

        app.close_annotation();
        assert!(app.annotation().is_none());
        assert!(!app.commit_annotation().unwrap());
    }

    #[test]
    fn test_export_uses_session_content() {
        let mut app = App::new();
        app.set_title("Physics");
        app.insert_text("F=ma");
        app.select(0, 4);
        app.edit(|region| region.wrap_selection(&StyleDescriptor::font_size(28)));

        let artifact = app.export(&ExportOptions::default()).unwrap();
        assert_eq!(artifact.file_name, "Physics.pdf");
        assert_eq!(artifact.pages.len(), 1);
    }
}
