use std::path::PathBuf;

use crate::note::Note;
use crate::timeline::{NoteHandle, TimelineModel};
use crate::track::TrackStore;
use crate::{EditError, LoopbeatError, Result, Song};

type EditResult<T> = std::result::Result<T, EditError>;

/// Authoring state for one song: the note timeline, the bar being shown and
/// the selected note.
#[derive(Debug, Clone)]
pub struct EditorSession {
    song: Song,
    timeline: TimelineModel,
    current_bar: u32,
    selected: Option<NoteHandle>,
    phrase_bars: u32,
}

impl EditorSession {
    pub fn new(song: Song, timeline: TimelineModel, phrase_bars: u32) -> Self {
        debug_assert_eq!(song.beats_per_bar(), timeline.beats_per_bar());
        Self {
            song,
            timeline,
            current_bar: 0,
            selected: None,
            phrase_bars,
        }
    }

    /// Starts editing `song` from a persisted note list.
    pub fn from_notes(
        song: Song,
        notes: impl IntoIterator<Item = Note>,
        lane_count: usize,
        phrase_bars: u32,
    ) -> Self {
        let timeline = TimelineModel::from_notes(song.beats_per_bar(), lane_count, notes);
        Self::new(song, timeline, phrase_bars)
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn timeline(&self) -> &TimelineModel {
        &self.timeline
    }

    pub fn current_bar(&self) -> u32 {
        self.current_bar
    }

    pub fn selected(&self) -> Option<NoteHandle> {
        self.selected
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.song.title = title.into();
    }

    pub fn set_offset(&mut self, offset: f64) -> bool {
        if !offset.is_finite() {
            return false;
        }
        self.song.offset = offset;
        true
    }

    pub fn set_track_name(&mut self, track_name: impl Into<String>) {
        self.song.track_name = track_name.into();
    }

    pub fn set_bar(&mut self, bar: u32) {
        self.current_bar = bar;
        self.drop_selection_outside_bar();
    }

    pub fn next_bar(&mut self) {
        self.set_bar(self.current_bar.saturating_add(1));
    }

    pub fn prev_bar(&mut self) {
        self.set_bar(self.current_bar.saturating_sub(1));
    }

    pub fn next_phrase(&mut self) {
        self.set_bar(self.current_bar.saturating_add(self.phrase_bars));
    }

    pub fn prev_phrase(&mut self) {
        self.set_bar(self.current_bar.saturating_sub(self.phrase_bars));
    }

    pub fn notes_in_current_bar(&self) -> Vec<(NoteHandle, Note)> {
        self.timeline.notes_in_bar(self.current_bar)
    }

    pub fn select(&mut self, handle: NoteHandle) -> EditResult<()> {
        if !self.timeline.contains(handle) {
            return Err(EditError::UnknownNote(handle.0));
        }
        self.selected = Some(handle);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Places a note in the current bar and selects it.
    pub fn place(&mut self, lane: usize, beat_pos: f64) -> EditResult<NoteHandle> {
        let handle = self.timeline.add_note(lane, beat_pos, self.current_bar)?;
        self.selected = Some(handle);
        Ok(handle)
    }

    pub fn set_selected_start(&mut self, start: f64) -> EditResult<()> {
        let handle = self.selected.ok_or(EditError::NothingSelected)?;
        self.timeline.set_start(handle, start)?;
        self.drop_selection_outside_bar();
        Ok(())
    }

    pub fn adjust_selected_start(&mut self, delta: f64) -> EditResult<()> {
        let note = self.selected_note()?;
        self.set_selected_start(note.start + delta)
    }

    pub fn set_selected_stop(&mut self, stop: f64) -> EditResult<()> {
        let handle = self.selected.ok_or(EditError::NothingSelected)?;
        self.timeline.set_stop(handle, stop)?;
        self.drop_selection_outside_bar();
        Ok(())
    }

    pub fn adjust_selected_stop(&mut self, delta: f64) -> EditResult<()> {
        let note = self.selected_note()?;
        self.set_selected_stop(note.stop + delta)
    }

    pub fn remove_selected(&mut self) -> EditResult<Note> {
        let handle = self.selected.take().ok_or(EditError::NothingSelected)?;
        self.timeline.remove_note(handle)
    }

    /// Beat positions offered for placement with the given note value
    /// (4 = quarter note when the beat unit is 4).
    pub fn grid(&self, note_value: u32, triplet: bool) -> Vec<f64> {
        if note_value == 0 {
            return Vec::new();
        }
        let mut step = f64::from(self.song.beat_unit()) / f64::from(note_value);
        if triplet {
            step *= 2.0 / 3.0;
        }

        let bar_len = f64::from(self.song.beats_per_bar());
        (0_u32..)
            .map(|i| f64::from(i) * step)
            .take_while(|beat| *beat < bar_len - 1e-9)
            .collect()
    }

    /// The notes in track order, ready to be saved.
    pub fn to_notes(&self) -> Vec<Note> {
        self.timeline.to_notes()
    }

    /// Writes the track back under the song's track name. Refused when the
    /// timeline skipped persisted notes on load, since they would be lost.
    pub fn save(&self, store: &TrackStore) -> Result<PathBuf> {
        let skipped = self.timeline.skipped_on_load();
        if skipped > 0 {
            tracing::warn!(track = %self.song.track_name, skipped, "refusing lossy track save");
            return Err(LoopbeatError::LossySave(skipped));
        }
        store.save(&self.song.track_name, &self.to_notes())
    }

    fn selected_note(&self) -> EditResult<Note> {
        let handle = self.selected.ok_or(EditError::NothingSelected)?;
        self.timeline
            .get(handle)
            .copied()
            .ok_or(EditError::UnknownNote(handle.0))
    }

    fn drop_selection_outside_bar(&mut self) {
        let beats_per_bar = self.timeline.beats_per_bar();
        let visible = self
            .selected
            .and_then(|handle| self.timeline.get(handle))
            .map(|note| note.in_bar(self.current_bar, beats_per_bar));
        if visible == Some(false) {
            self.selected = None;
        }
    }
}
