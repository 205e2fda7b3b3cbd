use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::clock::SECONDS_PER_MINUTE;

/// Beats of lead time during which a note fades in before its start.
pub const ANTICIPATION_BEATS: f64 = 2.0;
/// Beats a note takes to fade out once it is done.
pub const DISAPPEAR_BEATS: f64 = 0.5;

/// A repeating note: hit `lane` at `beat_pos` within every bar whose
/// occurrence falls inside `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Note {
    pub lane: usize,
    pub beat_pos: f64,
    pub start: f64,
    pub stop: f64,
}

impl Note {
    pub fn new(lane: usize, beat_pos: f64, start: f64, stop: f64) -> Self {
        Self {
            lane,
            beat_pos,
            start,
            stop,
        }
    }

    /// Whether any part of this note is visible in `bar`.
    pub fn in_bar(&self, bar: u32, beats_per_bar: u32) -> bool {
        let bar_beat = f64::from(bar) * f64::from(beats_per_bar);
        self.start - bar_beat <= self.beat_pos && self.beat_pos <= self.stop - bar_beat
    }
}

/// Everything the play-time engine derives from a [`Note`].
#[derive(Debug, Clone, PartialEq)]
pub struct NoteExpansion {
    /// Absolute beats at which the note must be judged, ascending.
    pub hit_instants: Vec<f64>,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
}

/// Expands notes into judgeable instants and decides their visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteExpander {
    pub anticipation_beats: f64,
    pub disappear_beats: f64,
}

impl Default for NoteExpander {
    fn default() -> Self {
        Self {
            anticipation_beats: ANTICIPATION_BEATS,
            disappear_beats: DISAPPEAR_BEATS,
        }
    }
}

impl NoteExpander {
    pub fn new(anticipation_beats: f64, disappear_beats: f64) -> Self {
        Self {
            anticipation_beats,
            disappear_beats,
        }
    }

    pub fn expand(&self, note: &Note, beats_per_bar: u32, tempo: f64) -> NoteExpansion {
        debug_assert!(beats_per_bar > 0 && tempo > 0.0);
        let seconds_per_beat = SECONDS_PER_MINUTE / tempo;
        NoteExpansion {
            hit_instants: hit_instants(note, beats_per_bar),
            fade_in_seconds: self.anticipation_beats * seconds_per_beat,
            fade_out_seconds: self.disappear_beats * seconds_per_beat,
        }
    }

    pub fn should_spawn(&self, current_beat: f64, start: f64) -> bool {
        start - current_beat < self.anticipation_beats
    }
}

/// Smallest `bar * beats_per_bar + beat_pos` that is not before `note.start`,
/// then every bar after it up to and including `note.stop`.
fn hit_instants(note: &Note, beats_per_bar: u32) -> Vec<f64> {
    let bar_len = f64::from(beats_per_bar);
    let start_bar = (note.start / bar_len).floor();
    let mut first_hit = start_bar * bar_len + note.beat_pos;
    if note.start.rem_euclid(bar_len) > note.beat_pos {
        first_hit += bar_len;
    }

    let mut hits = Vec::new();
    let mut k = 0.0;
    loop {
        let hit = first_hit + k * bar_len;
        if hit > note.stop {
            break;
        }
        hits.push(hit);
        k += 1.0;
    }
    hits
}

/// Expands `note` with the default anticipation and disappear lengths.
pub fn expand_note(note: &Note, beats_per_bar: u32, tempo: f64) -> NoteExpansion {
    NoteExpander::default().expand(note, beats_per_bar, tempo)
}

pub fn should_spawn(current_beat: f64, start: f64) -> bool {
    NoteExpander::default().should_spawn(current_beat, start)
}

/// True once the note has scrolled past its stop bound, whatever its
/// remaining instants.
pub fn should_despawn_bound(current_beat: f64, stop: f64) -> bool {
    current_beat > stop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_into_one_hit_per_bar() {
        let note = Note::new(0, 2.0, 0.0, 8.0);
        let expansion = expand_note(&note, 4, 120.0);

        assert_eq!(expansion.hit_instants, vec![2.0, 6.0]);
        assert_eq!(expansion.fade_in_seconds, 1.0);
        assert_eq!(expansion.fade_out_seconds, 0.25);
    }

    #[test]
    fn first_hit_skips_to_next_bar_when_start_is_past_beat_pos() {
        let note = Note::new(1, 1.0, 5.5, 14.0);
        assert_eq!(hit_instants(&note, 4), vec![9.0, 13.0]);
    }

    #[test]
    fn hit_on_start_and_stop_bounds_is_included() {
        let note = Note::new(0, 1.0, 5.0, 9.0);
        assert_eq!(hit_instants(&note, 4), vec![5.0, 9.0]);
    }

    #[test]
    fn negative_start_still_begins_at_or_after_start() {
        let note = Note::new(0, 2.0, -1.0, 7.0);
        assert_eq!(hit_instants(&note, 4), vec![2.0, 6.0]);
    }

    #[test]
    fn range_without_occurrence_yields_no_hits() {
        let note = Note::new(2, 3.0, 0.0, 2.0);
        let expansion = expand_note(&note, 4, 100.0);
        assert!(expansion.hit_instants.is_empty());
    }

    #[test]
    fn every_hit_lies_in_range_and_on_beat_pos() {
        let bars = [3_u32, 4, 7];
        let positions = [0.0, 0.5, 1.75, 2.0];
        let starts = [-2.5, 0.0, 1.25, 6.0, 13.0];
        for &bpb in &bars {
            for &pos in positions.iter().filter(|p| **p < f64::from(bpb)) {
                for &start in &starts {
                    let note = Note::new(0, pos, start, start + 17.0);
                    let first = expand_note(&note, bpb, 130.0);
                    let second = expand_note(&note, bpb, 130.0);
                    assert_eq!(first, second);

                    for hit in first.hit_instants {
                        assert!(hit >= note.start && hit <= note.stop);
                        let phase = (hit - pos).rem_euclid(f64::from(bpb));
                        assert!(phase < 1e-9 || f64::from(bpb) - phase < 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn spawn_and_despawn_windows() {
        assert!(!should_spawn(0.0, 2.0));
        assert!(should_spawn(0.1, 2.0));
        assert!(!should_despawn_bound(8.0, 8.0));
        assert!(should_despawn_bound(8.01, 8.0));

        let eager = NoteExpander::new(4.0, 1.0);
        assert!(eager.should_spawn(0.0, 3.0));
    }

    #[test]
    fn bar_visibility() {
        let note = Note::new(0, 2.0, 4.0, 10.0);
        assert!(!note.in_bar(0, 4));
        assert!(note.in_bar(1, 4));
        assert!(note.in_bar(2, 4));
        assert!(!note.in_bar(3, 4));
    }
}
