use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::actions::{ActionDispatcher, StatusReport};
use crate::store::{Field, LoadOutcome, RecordDraft, RecordStore};

const MAX_INPUT_LEN: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct AddRecordOverlay {
    pub draft: RecordDraft,
    pub focus: Field,
}

impl Default for AddRecordOverlay {
    fn default() -> Self {
        Self {
            draft: RecordDraft::default(),
            focus: Field::Topic,
        }
    }
}

impl AddRecordOverlay {
    fn cycle_focus(&mut self, delta: isize) {
        let len = Field::ALL.len() as isize;
        let current = Field::ALL
            .iter()
            .position(|field| *field == self.focus)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.focus = Field::ALL[next];
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOverlay {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    Import,
    Export,
}

impl PathAction {
    pub fn title(&self) -> &'static str {
        match self {
            PathAction::Import => "Import JSON file",
            PathAction::Export => "Export JSON file",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathPromptOverlay {
    pub action: PathAction,
    pub input: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    AddRecord(AddRecordOverlay),
    ConfirmDelete(DeleteOverlay),
    PathPrompt(PathPromptOverlay),
}

/// Presentation state layered over a [`RecordStore`]; row indices always refer
/// to the store's current view.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub selected: usize,
    pub marked: BTreeSet<u64>,
    pub search: SearchState,
    pub overlay: Option<OverlayState>,
    pub status: Option<StatusReport>,
    pub dirty: bool,
    pub last_saved: Option<OffsetDateTime>,
    quit_armed: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, report: StatusReport) {
        self.status = Some(report);
    }

    pub fn status(&self) -> Option<&StatusReport> {
        self.status.as_ref()
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn selected_id(&self, store: &RecordStore) -> Option<u64> {
        store.view().get(self.selected).map(|record| record.id)
    }

    pub fn move_selection(&mut self, store: &RecordStore, delta: isize) {
        let len = store.view_len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    pub fn select_id(&mut self, store: &RecordStore, id: u64) {
        if let Some(idx) = store.view().iter().position(|record| record.id == id) {
            self.selected = idx;
        } else {
            self.normalize_selection(store);
        }
    }

    pub fn toggle_mark(&mut self, store: &RecordStore) {
        let Some(id) = self.selected_id(store) else {
            return;
        };
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
    }

    pub fn is_marked(&self, id: u64) -> bool {
        self.marked.contains(&id)
    }

    // Search

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
    }

    pub fn finish_search(&mut self) {
        self.search.active = false;
    }

    pub fn push_search_char(&mut self, store: &mut RecordStore, ch: char) {
        if self.search.query.chars().count() >= MAX_INPUT_LEN {
            return;
        }
        self.search.query.push(ch);
        self.apply_search(store);
    }

    pub fn pop_search_char(&mut self, store: &mut RecordStore) {
        if pop_grapheme(&mut self.search.query) {
            self.apply_search(store);
        }
    }

    pub fn clear_search(&mut self, store: &mut RecordStore) {
        self.search = SearchState::default();
        let outcome = ActionDispatcher::new(store).clear_search();
        self.set_status(outcome.report);
        self.normalize_selection(store);
    }

    fn apply_search(&mut self, store: &mut RecordStore) {
        let outcome = ActionDispatcher::new(store).search(&self.search.query);
        self.set_status(outcome.report);
        self.selected = 0;
        self.normalize_selection(store);
    }

    // Add form

    pub fn open_add_record(&mut self) {
        if self.overlay.is_none() {
            self.overlay = Some(OverlayState::AddRecord(AddRecordOverlay::default()));
        }
    }

    pub fn add_record_overlay(&self) -> Option<&AddRecordOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::AddRecord(overlay)) => Some(overlay),
            _ => None,
        }
    }

    fn add_record_overlay_mut(&mut self) -> Option<&mut AddRecordOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::AddRecord(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn add_record_push_char(&mut self, ch: char) {
        if let Some(overlay) = self.add_record_overlay_mut() {
            let value = overlay.draft.field_mut(overlay.focus);
            if value.chars().count() < MAX_INPUT_LEN {
                value.push(ch);
            }
        }
    }

    pub fn add_record_pop_char(&mut self) {
        if let Some(overlay) = self.add_record_overlay_mut() {
            pop_grapheme(overlay.draft.field_mut(overlay.focus));
        }
    }

    pub fn add_record_next_field(&mut self) {
        if let Some(overlay) = self.add_record_overlay_mut() {
            overlay.cycle_focus(1);
        }
    }

    pub fn add_record_prev_field(&mut self) {
        if let Some(overlay) = self.add_record_overlay_mut() {
            overlay.cycle_focus(-1);
        }
    }

    pub fn add_record_clear_inputs(&mut self) {
        if let Some(overlay) = self.add_record_overlay_mut() {
            overlay.draft.clear();
            overlay.focus = Field::Topic;
        }
    }

    /// Inserts the drafted record. The form stays open on validation errors.
    pub fn submit_add_record(&mut self, store: &mut RecordStore) {
        let Some(draft) = self.add_record_overlay().map(|overlay| overlay.draft.clone()) else {
            return;
        };
        let outcome = ActionDispatcher::new(store).add(draft);
        if let Some(record) = &outcome.value {
            self.overlay = None;
            self.dirty = true;
            self.select_id(store, record.id);
        }
        self.set_status(outcome.report);
    }

    // Delete

    /// Targets the marked rows visible in the view, or the selected row when
    /// none are marked.
    pub fn delete_targets(&self, store: &RecordStore) -> Vec<u64> {
        let visible: Vec<u64> = store.view().iter().map(|record| record.id).collect();
        let marked: Vec<u64> = visible
            .iter()
            .copied()
            .filter(|id| self.marked.contains(id))
            .collect();
        if !marked.is_empty() {
            return marked;
        }
        self.selected_id(store).into_iter().collect()
    }

    pub fn open_delete(&mut self, store: &mut RecordStore, confirm: bool) {
        let ids = self.delete_targets(store);
        if ids.is_empty() {
            self.set_status(StatusReport::warn("Select a record to delete first"));
            return;
        }
        if confirm {
            self.overlay = Some(OverlayState::ConfirmDelete(DeleteOverlay { ids }));
        } else {
            self.delete_ids(store, &ids);
        }
    }

    pub fn delete_overlay(&self) -> Option<&DeleteOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::ConfirmDelete(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn submit_delete(&mut self, store: &mut RecordStore) {
        let Some(ids) = self.delete_overlay().map(|overlay| overlay.ids.clone()) else {
            return;
        };
        self.overlay = None;
        self.delete_ids(store, &ids);
    }

    fn delete_ids(&mut self, store: &mut RecordStore, ids: &[u64]) {
        let ids: HashSet<u64> = ids.iter().copied().collect();
        let outcome = ActionDispatcher::new(store).remove(&ids);
        if outcome.value.unwrap_or(0) > 0 {
            self.dirty = true;
        }
        self.marked.retain(|id| !ids.contains(id));
        self.normalize_selection(store);
        self.set_status(outcome.report);
    }

    // Files

    pub fn open_path_prompt(&mut self, action: PathAction, initial: String) {
        if self.overlay.is_none() {
            self.overlay = Some(OverlayState::PathPrompt(PathPromptOverlay {
                action,
                input: initial,
            }));
        }
    }

    pub fn path_prompt(&self) -> Option<&PathPromptOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::PathPrompt(overlay)) => Some(overlay),
            _ => None,
        }
    }

    fn path_prompt_mut(&mut self) -> Option<&mut PathPromptOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::PathPrompt(overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn path_prompt_push_char(&mut self, ch: char) {
        if let Some(overlay) = self.path_prompt_mut() {
            if overlay.input.chars().count() < MAX_INPUT_LEN * 4 {
                overlay.input.push(ch);
            }
        }
    }

    pub fn path_prompt_pop_char(&mut self) {
        if let Some(overlay) = self.path_prompt_mut() {
            pop_grapheme(&mut overlay.input);
        }
    }

    pub fn submit_path_prompt(&mut self, store: &mut RecordStore) {
        let Some((action, input)) = self
            .path_prompt()
            .map(|overlay| (overlay.action, overlay.input.trim().to_owned()))
        else {
            return;
        };
        if input.is_empty() {
            self.set_status(StatusReport::warn("Enter a file path"));
            return;
        }
        self.overlay = None;
        let path = PathBuf::from(input);
        match action {
            PathAction::Import => self.load(store, &path),
            PathAction::Export => {
                let outcome = ActionDispatcher::new(store).export(&path);
                self.set_status(outcome.report);
            }
        }
    }

    pub fn load(&mut self, store: &mut RecordStore, path: &std::path::Path) {
        let outcome = ActionDispatcher::new(store).load(path);
        self.after_load(store, outcome.value, outcome.report);
    }

    pub fn reload(&mut self, store: &mut RecordStore) {
        let outcome = ActionDispatcher::new(store).reload();
        self.after_load(store, outcome.value, outcome.report);
    }

    fn after_load(
        &mut self,
        store: &RecordStore,
        loaded: Option<LoadOutcome>,
        report: StatusReport,
    ) {
        if loaded.is_some() {
            self.search = SearchState::default();
            self.marked.clear();
            self.dirty = false;
            self.selected = 0;
            self.normalize_selection(store);
        }
        self.set_status(report);
    }

    pub fn save(&mut self, store: &mut RecordStore) {
        let outcome = ActionDispatcher::new(store).save();
        if outcome.value.is_some() {
            self.dirty = false;
            self.last_saved = Some(OffsetDateTime::now_utc());
        }
        self.set_status(outcome.report);
    }

    // Quit

    /// Returns true when the app may exit. With unsaved changes the first call
    /// only arms the quit and warns.
    pub fn request_quit(&mut self) -> bool {
        if !self.dirty || self.quit_armed {
            return true;
        }
        self.quit_armed = true;
        self.set_status(StatusReport::warn(
            "Unsaved changes: press q again to quit, Ctrl-s to save",
        ));
        false
    }

    pub fn disarm_quit(&mut self) {
        self.quit_armed = false;
    }

    fn normalize_selection(&mut self, store: &RecordStore) {
        let len = store.view_len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

fn pop_grapheme(text: &mut String) -> bool {
    match text.grapheme_indices(true).next_back() {
        Some((idx, _)) => {
            text.truncate(idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::actions::StatusLevel;
    use tempfile::TempDir;

    fn store_with(records: &[[&str; 4]]) -> RecordStore {
        let mut store = RecordStore::default();
        for fields in records {
            store
                .insert(fields[0], fields[1], fields[2], fields[3])
                .expect("valid record");
        }
        store
    }

    fn type_into_form(state: &mut AppState, values: [&str; 4]) {
        for (idx, value) in values.iter().enumerate() {
            for ch in value.chars() {
                state.add_record_push_char(ch);
            }
            if idx + 1 < values.len() {
                state.add_record_next_field();
            }
        }
    }

    #[test]
    fn add_form_inserts_and_selects_new_record() {
        let mut store = store_with(&[["a", "b", "c", "d"]]);
        let mut state = AppState::new();
        state.open_add_record();
        type_into_form(&mut state, ["Topic", "Cat", "Desc", "High"]);

        state.submit_add_record(&mut store);
        assert!(state.overlay().is_none());
        assert!(state.dirty);
        assert_eq!(state.selected_id(&store), Some(2));
        assert_eq!(state.status().map(|s| s.message.as_str()), Some("Added record #2"));
    }

    #[test]
    fn add_form_stays_open_on_blank_field() {
        let mut store = RecordStore::default();
        let mut state = AppState::new();
        state.open_add_record();
        type_into_form(&mut state, ["Topic", "Cat", "", "High"]);

        state.submit_add_record(&mut store);
        assert!(state.add_record_overlay().is_some());
        assert!(store.is_empty());
        assert!(!state.dirty);
        assert_eq!(
            state.status().map(|s| s.level),
            Some(StatusLevel::Error)
        );
    }

    #[test]
    fn add_form_focus_wraps_and_clear_resets() {
        let mut state = AppState::new();
        state.open_add_record();
        state.add_record_prev_field();
        assert_eq!(state.add_record_overlay().map(|o| o.focus), Some(Field::Importance));
        state.add_record_push_char('x');
        state.add_record_next_field();
        assert_eq!(state.add_record_overlay().map(|o| o.focus), Some(Field::Topic));

        state.add_record_clear_inputs();
        let overlay = state.add_record_overlay().expect("form open");
        assert_eq!(overlay.draft, RecordDraft::default());
    }

    #[test]
    fn typing_search_filters_live_and_backspace_widens() {
        let mut store = store_with(&[
            ["apple", "fruit", "red", "high"],
            ["apricot", "fruit", "orange", "low"],
            ["kale", "veg", "green", "low"],
        ]);
        let mut state = AppState::new();
        state.begin_search();
        for ch in "apr".chars() {
            state.push_search_char(&mut store, ch);
        }
        assert_eq!(store.view_len(), 1);

        state.pop_search_char(&mut store);
        assert_eq!(store.view_len(), 2);

        state.clear_search(&mut store);
        assert_eq!(store.view_len(), 3);
        assert!(!state.is_search_active());
    }

    #[test]
    fn delete_prefers_visible_marked_rows() {
        let mut store = store_with(&[
            ["one", "x", "x", "x"],
            ["two", "x", "x", "x"],
            ["three", "x", "x", "x"],
        ]);
        let mut state = AppState::new();
        state.toggle_mark(&store);
        state.move_selection(&store, 2);
        state.toggle_mark(&store);
        assert_eq!(state.delete_targets(&store), vec![1, 3]);

        state.open_delete(&mut store, true);
        assert_eq!(state.delete_overlay().map(|o| o.ids.clone()), Some(vec![1, 3]));
        state.submit_delete(&mut store);

        let remaining: Vec<u64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![2]);
        assert!(state.marked.is_empty());
        assert_eq!(state.selected, 0);
        assert!(state.dirty);
    }

    #[test]
    fn delete_without_marks_uses_selection() {
        let mut store = store_with(&[["one", "x", "x", "x"], ["two", "x", "x", "x"]]);
        let mut state = AppState::new();
        state.move_selection(&store, 1);
        state.open_delete(&mut store, false);
        let remaining: Vec<u64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![1]);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn quit_requires_confirmation_when_dirty() {
        let mut state = AppState::new();
        assert!(state.request_quit());

        state.dirty = true;
        assert!(!state.request_quit());
        assert!(state.request_quit());
    }

    #[test]
    fn save_clears_dirty_and_failed_import_keeps_rows() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "[1, 2")?;

        let mut store = RecordStore::default();
        let mut state = AppState::new();
        state.load(&mut store, &path);
        state.open_add_record();
        type_into_form(&mut state, ["a", "b", "c", "d"]);
        state.submit_add_record(&mut store);
        assert!(state.dirty);

        state.save(&mut store);
        assert!(!state.dirty);
        assert!(state.last_saved.is_some());
        assert!(path.exists());

        state.open_path_prompt(PathAction::Import, broken.display().to_string());
        state.submit_path_prompt(&mut store);
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_path(), Some(path.as_path()));
        assert_eq!(state.status().map(|s| s.level), Some(StatusLevel::Error));
        Ok(())
    }

    #[test]
    fn backspace_removes_whole_grapheme() {
        let mut text = String::from("cafe\u{301}");
        assert!(pop_grapheme(&mut text));
        assert_eq!(text, "caf");
        let mut empty = String::new();
        assert!(!pop_grapheme(&mut empty));
    }
}
