use std::collections::{BTreeMap, VecDeque};

use crate::clock::BeatClock;
use crate::config::{AppConfig, PlayConfig};
use crate::input::LanePress;
use crate::instance::{InstanceId, Lifecycle, NoteInstance};
use crate::judgment::{Judgment, JudgmentEngine};
use crate::note::{should_despawn_bound, Note, NoteExpander};
use crate::timeline::TimelineModel;
use crate::{Result, Song};

/// Everything the presentation and scoring side needs to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayEvent {
    Spawned {
        id: InstanceId,
        note: Note,
        hit_count: usize,
    },
    Lifecycle {
        id: InstanceId,
        state: Lifecycle,
    },
    Hit {
        id: InstanceId,
        lane: usize,
        judgment: Judgment,
    },
    Miss {
        id: InstanceId,
        lane: usize,
        hit_instant: f64,
    },
    /// The instance finished fading out and has been released.
    Despawned { id: InstanceId },
}

/// Running hit and miss counts for one play.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub hits: BTreeMap<String, u32>,
    pub misses: u32,
    pub combo: u32,
    pub max_combo: u32,
}

impl Tally {
    fn record_hit(&mut self, label: &str) {
        *self.hits.entry(label.to_string()).or_default() += 1;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.combo = 0;
    }

    pub fn total_hits(&self) -> u32 {
        self.hits.values().sum()
    }

    pub fn count(&self, label: &str) -> u32 {
        self.hits.get(label).copied().unwrap_or(0)
    }
}

/// One play-through of a track: spawns notes from the timeline as the song
/// advances, judges presses, detects misses and retires finished notes.
///
/// Driven by a single host loop calling [`PlaySession::tick`] with the song
/// time and [`PlaySession::press`] for every lane press.
#[derive(Debug)]
pub struct PlaySession {
    clock: BeatClock,
    beats_per_bar: u32,
    expander: NoteExpander,
    engine: JudgmentEngine,
    hit_offset: f64,
    pending: VecDeque<Note>,
    live: Vec<NoteInstance>,
    next_id: u64,
    tally: Tally,
}

impl PlaySession {
    pub fn new(song: &Song, timeline: &TimelineModel, engine: JudgmentEngine, play: &PlayConfig) -> Self {
        let mut notes = timeline.to_notes();
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));

        Self {
            clock: BeatClock::for_song(song, play.sync_offset),
            beats_per_bar: song.beats_per_bar(),
            expander: play.expander(),
            engine,
            hit_offset: play.hit_offset,
            pending: notes.into(),
            live: Vec::new(),
            next_id: 0,
            tally: Tally::default(),
        }
    }

    pub fn from_config(song: &Song, timeline: &TimelineModel, config: &AppConfig) -> Result<Self> {
        config.play.validate()?;
        let engine = JudgmentEngine::new(config.judgment.tier_set()?);
        Ok(Self::new(song, timeline, engine, &config.play))
    }

    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn live(&self) -> &[NoteInstance] {
        &self.live
    }

    pub fn instance(&self, id: InstanceId) -> Option<&NoteInstance> {
        self.live.iter().find(|instance| instance.id() == id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once every note has been spawned and released.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.live.is_empty()
    }

    /// Advances the session to song time `time`.
    pub fn tick(&mut self, time: f64) -> Vec<PlayEvent> {
        let beat = self.clock.current_beat(time);
        let mut events = Vec::new();

        self.spawn_due(beat, time, &mut events);

        for instance in &mut self.live {
            let id = instance.id();
            let lane = instance.lane();

            for hit_instant in self.engine.check_misses(instance, beat) {
                self.tally.record_miss();
                events.push(PlayEvent::Miss {
                    id,
                    lane,
                    hit_instant,
                });
            }

            if instance.is_exhausted() || should_despawn_bound(beat, instance.note().stop) {
                instance.request_fade_out(time);
            }

            for state in instance.advance(time) {
                events.push(PlayEvent::Lifecycle { id, state });
                if state == Lifecycle::Despawned {
                    // Instants still pending when the fade-out ends count as missed.
                    for hit_instant in instance.consume_matching(|_| true) {
                        self.tally.record_miss();
                        events.push(PlayEvent::Miss {
                            id,
                            lane,
                            hit_instant,
                        });
                    }
                    tracing::debug!(instance = %id, "despawned note");
                    events.push(PlayEvent::Despawned { id });
                }
            }
        }

        self.live.retain(|instance| !instance.is_despawned());
        events
    }

    /// Judges a lane press against the live notes on that lane, oldest
    /// spawn first. At most one hit instant is consumed.
    pub fn press(&mut self, press: LanePress) -> Option<PlayEvent> {
        let beat = self.clock.current_beat(press.time - self.hit_offset);
        let engine = &self.engine;

        let (id, judgment) = self
            .live
            .iter_mut()
            .filter(|instance| instance.lane() == press.lane && !instance.is_despawned())
            .find_map(|instance| {
                engine
                    .judge(instance, beat, press.time)
                    .map(|judgment| (instance.id(), judgment))
            })?;

        self.tally.record_hit(&judgment.label);
        Some(PlayEvent::Hit {
            id,
            lane: press.lane,
            judgment,
        })
    }

    /// Force-removes a live instance, cancelling its timers. No despawn
    /// event is emitted.
    pub fn remove_instance(&mut self, id: InstanceId) -> bool {
        let Some(index) = self.live.iter().position(|instance| instance.id() == id) else {
            return false;
        };
        let mut instance = self.live.remove(index);
        instance.cancel()
    }

    fn spawn_due(&mut self, beat: f64, time: f64, events: &mut Vec<PlayEvent>) {
        while let Some(note) = self.pending.front().copied() {
            if !self.expander.should_spawn(beat, note.start) {
                break;
            }
            self.pending.pop_front();

            let expansion = self.expander.expand(&note, self.beats_per_bar, self.clock.tempo);
            let id = InstanceId(self.next_id);
            self.next_id += 1;

            let hit_count = expansion.hit_instants.len();
            tracing::debug!(instance = %id, lane = note.lane, hit_count, "spawned note");
            self.live.push(NoteInstance::spawn(id, note, expansion, time));
            events.push(PlayEvent::Spawned {
                id,
                note,
                hit_count,
            });
        }
    }
}
