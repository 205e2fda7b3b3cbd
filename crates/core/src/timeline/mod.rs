use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::note::Note;
use crate::{EditError, LoopbeatError, Result};

/// Tolerance used when comparing beat positions for duplicate placement.
pub const BEAT_EPSILON: f64 = 1e-6;

/// Stable reference to a note owned by a [`TimelineModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteHandle(pub u64);

impl fmt::Display for NoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn beats_approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= BEAT_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Whether a note recurring at `beat_pos` has at least one occurrence in
/// `[start, stop]`.
pub fn beat_pos_in_range(start: f64, stop: f64, beat_pos: f64, beats_per_bar: u32) -> bool {
    let bar_len = f64::from(beats_per_bar);
    let offset = start.rem_euclid(bar_len);
    let adjusted = (beat_pos - offset).rem_euclid(bar_len);
    0.0 <= adjusted && adjusted <= stop - start
}

/// The authoritative, insertion-ordered collection of notes for one track.
///
/// Every mutation goes through the model and is validated as a whole; a
/// rejected edit leaves the model untouched.
#[derive(Debug, Clone)]
pub struct TimelineModel {
    beats_per_bar: u32,
    lane_count: usize,
    notes: Vec<(NoteHandle, Note)>,
    next_handle: u64,
    skipped_on_load: usize,
}

impl TimelineModel {
    pub fn new(beats_per_bar: u32, lane_count: usize) -> Self {
        debug_assert!(beats_per_bar > 0);
        Self {
            beats_per_bar,
            lane_count,
            notes: Vec::new(),
            next_handle: 0,
            skipped_on_load: 0,
        }
    }

    /// Builds a model from persisted notes, keeping their order. Notes that
    /// could never be valid (non-finite values, `start > stop`, unknown
    /// lane) are skipped.
    pub fn from_notes(
        beats_per_bar: u32,
        lane_count: usize,
        notes: impl IntoIterator<Item = Note>,
    ) -> Self {
        let mut model = Self::new(beats_per_bar, lane_count);
        for note in notes {
            let finite = note.beat_pos.is_finite() && note.start.is_finite() && note.stop.is_finite();
            if !finite || note.start > note.stop || note.lane >= lane_count {
                tracing::warn!(?note, "skipping persisted note that cannot be valid");
                model.skipped_on_load += 1;
                continue;
            }
            model.insert(note);
        }
        model
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Persisted notes dropped by [`TimelineModel::from_notes`]. Saving a
    /// model with skipped notes would erase them from the track.
    pub fn skipped_on_load(&self) -> usize {
        self.skipped_on_load
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, handle: NoteHandle) -> Option<&Note> {
        self.notes
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, note)| note)
    }

    pub fn contains(&self, handle: NoteHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Handle of the note at position `index` in track order.
    pub fn handle_at(&self, index: usize) -> Option<NoteHandle> {
        self.notes.get(index).map(|(handle, _)| *handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NoteHandle, &Note)> + '_ {
        self.notes.iter().map(|(handle, note)| (*handle, note))
    }

    /// Copies the notes out in track order, ready to be persisted.
    pub fn to_notes(&self) -> Vec<Note> {
        self.notes.iter().map(|(_, note)| *note).collect()
    }

    /// Notes visible in `bar`, in track order.
    pub fn notes_in_bar(&self, bar: u32) -> Vec<(NoteHandle, Note)> {
        self.notes
            .iter()
            .filter(|(_, note)| note.in_bar(bar, self.beats_per_bar))
            .copied()
            .collect()
    }

    /// Places a single-bar note at `beat_pos` in `bar`.
    pub fn add_note(
        &mut self,
        lane: usize,
        beat_pos: f64,
        bar: u32,
    ) -> std::result::Result<NoteHandle, EditError> {
        if lane >= self.lane_count {
            return Err(EditError::LaneOutOfRange {
                lane,
                lane_count: self.lane_count,
            });
        }
        if !beat_pos.is_finite() || beat_pos < 0.0 || beat_pos >= f64::from(self.beats_per_bar) {
            return Err(EditError::BeatPosOutOfRange {
                beat_pos,
                beats_per_bar: self.beats_per_bar,
            });
        }

        let duplicate = self.notes.iter().any(|(_, note)| {
            note.lane == lane
                && beats_approx_eq(note.beat_pos, beat_pos)
                && note.in_bar(bar, self.beats_per_bar)
        });
        if duplicate {
            tracing::warn!(lane, beat_pos, bar, "rejected duplicate note placement");
            return Err(EditError::DuplicatePlacement {
                lane,
                beat_pos,
                bar,
            });
        }

        let bar_beat = f64::from(bar) * f64::from(self.beats_per_bar);
        let handle = self.insert(Note::new(lane, beat_pos, bar_beat, bar_beat + beat_pos));
        tracing::debug!(%handle, lane, beat_pos, bar, "added note");
        Ok(handle)
    }

    pub fn start_valid(&self, note: &Note, start: f64) -> bool {
        start.is_finite()
            && start > note.beat_pos - f64::from(self.beats_per_bar)
            && start <= note.stop
            && beat_pos_in_range(start, note.stop, note.beat_pos, self.beats_per_bar)
    }

    pub fn stop_valid(&self, note: &Note, stop: f64) -> bool {
        stop.is_finite()
            && stop >= 0.0
            && stop >= note.start
            && beat_pos_in_range(note.start, stop, note.beat_pos, self.beats_per_bar)
    }

    pub fn set_start(&mut self, handle: NoteHandle, start: f64) -> std::result::Result<(), EditError> {
        let current = *self.get(handle).ok_or(EditError::UnknownNote(handle.0))?;
        if !self.start_valid(&current, start) {
            tracing::warn!(%handle, start, "rejected start edit");
            return Err(EditError::InvalidStart { start });
        }
        self.note_mut(handle)?.start = start;
        Ok(())
    }

    pub fn set_stop(&mut self, handle: NoteHandle, stop: f64) -> std::result::Result<(), EditError> {
        let current = *self.get(handle).ok_or(EditError::UnknownNote(handle.0))?;
        if !self.stop_valid(&current, stop) {
            tracing::warn!(%handle, stop, "rejected stop edit");
            return Err(EditError::InvalidStop { stop });
        }
        self.note_mut(handle)?.stop = stop;
        Ok(())
    }

    pub fn remove_note(&mut self, handle: NoteHandle) -> std::result::Result<Note, EditError> {
        let index = self
            .notes
            .iter()
            .position(|(h, _)| *h == handle)
            .ok_or(EditError::UnknownNote(handle.0))?;
        let (_, note) = self.notes.remove(index);
        tracing::debug!(%handle, "removed note");
        Ok(note)
    }

    fn insert(&mut self, note: Note) -> NoteHandle {
        let handle = NoteHandle(self.next_handle);
        self.next_handle += 1;
        self.notes.push((handle, note));
        handle
    }

    fn note_mut(&mut self, handle: NoteHandle) -> std::result::Result<&mut Note, EditError> {
        self.notes
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, note)| note)
            .ok_or(EditError::UnknownNote(handle.0))
    }
}

/// Thread-safe view over a [`TimelineModel`]. Each call holds the lock for
/// one whole operation so no edit is ever seen half-applied.
#[derive(Clone)]
pub struct SharedTimeline {
    shared: Arc<Mutex<TimelineModel>>,
}

impl SharedTimeline {
    pub fn new(model: TimelineModel) -> Self {
        Self {
            shared: Arc::new(Mutex::new(model)),
        }
    }

    /// Runs `op` against the model under the lock.
    pub fn with<R>(&self, op: impl FnOnce(&mut TimelineModel) -> R) -> Result<R> {
        let mut model = self.lock()?;
        Ok(op(&mut model))
    }

    pub fn snapshot(&self) -> Result<TimelineModel> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, TimelineModel>> {
        self.shared
            .lock()
            .map_err(|_| LoopbeatError::msg("timeline model has been poisoned"))
    }
}

impl fmt::Debug for SharedTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTimeline").finish()
    }
}
