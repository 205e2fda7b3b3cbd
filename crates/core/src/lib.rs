//! Core library for the Loopbeat rhythm game.
//!
//! Notes are repeating patterns: a lane and a position within the bar that
//! recur across a range of beats. The crate turns those patterns into
//! judgeable instants, drives the hit and miss judgment against a beat clock,
//! and keeps the authoring model consistent while a track is edited. Audio,
//! rendering and raw input polling live on the host side.

pub mod clock;
pub mod config;
pub mod editor;
pub mod error;
pub mod input;
pub mod instance;
pub mod judgment;
pub mod note;
pub mod play;
pub mod song;
pub mod timeline;
pub mod track;

pub use clock::{current_beat, BeatClock, PlaybackClock};
pub use config::{AppConfig, EditorConfig, JudgmentConfig, PlayConfig};
pub use editor::EditorSession;
pub use error::{EditError, LoopbeatError, Result};
pub use input::{LaneInput, LanePress, SubscriptionId};
pub use instance::{InstanceId, Lifecycle, NoteInstance};
pub use judgment::{check_misses, judge, Judgment, JudgmentEngine, Tier, TierSet};
pub use note::{expand_note, should_despawn_bound, should_spawn, Note, NoteExpander, NoteExpansion};
pub use play::{PlayEvent, PlaySession, Tally};
pub use song::Song;
pub use timeline::{beat_pos_in_range, NoteHandle, SharedTimeline, TimelineModel};
pub use track::{decode_track, encode_track, TrackStore};
