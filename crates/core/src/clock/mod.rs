use crate::Song;

pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Converts playback time to a beat coordinate.
///
/// Negative results are valid and mean "before the song starts".
pub fn current_beat(time: f64, tempo: f64, offset: f64) -> f64 {
    (time - offset) * tempo / SECONDS_PER_MINUTE
}

/// Stateless beat clock bound to a tempo and an offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatClock {
    pub tempo: f64,
    pub offset: f64,
}

impl BeatClock {
    pub fn new(tempo: f64, offset: f64) -> Self {
        debug_assert!(tempo > 0.0, "tempo must be validated before reaching the clock");
        Self { tempo, offset }
    }

    /// Clock for `song`, with the player's sync calibration added to the
    /// song's own offset.
    pub fn for_song(song: &Song, sync_offset: f64) -> Self {
        Self::new(song.tempo(), song.offset + sync_offset)
    }

    pub fn current_beat(&self, time: f64) -> f64 {
        current_beat(time, self.tempo, self.offset)
    }

    /// Playback time at which `beat` is reached.
    pub fn time_at_beat(&self, beat: f64) -> f64 {
        beat * SECONDS_PER_MINUTE / self.tempo + self.offset
    }
}

/// Song time accumulated from per-frame deltas.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) -> f64 {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
        self.time_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_time_to_beats() {
        assert_eq!(current_beat(1.0, 120.0, 0.0), 2.0);
        assert_eq!(current_beat(1.5, 120.0, 0.5), 2.0);
    }

    #[test]
    fn yields_negative_beats_before_offset() {
        let clock = BeatClock::new(60.0, 2.0);
        assert_eq!(clock.current_beat(0.5), -1.5);
    }

    #[test]
    fn time_at_beat_inverts_current_beat() {
        let clock = BeatClock::new(140.0, -0.3);
        let time = clock.time_at_beat(7.25);
        assert!((clock.current_beat(time) - 7.25).abs() < 1e-9);
    }

    #[test]
    fn sync_offset_shifts_song_offset() {
        let song = Song::new(120.0, 4, 4, 0.25).unwrap();
        let clock = BeatClock::for_song(&song, 0.25);
        assert_eq!(clock.offset, 0.5);
        assert_eq!(clock.current_beat(0.5), 0.0);
    }

    #[test]
    fn playback_clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(0.25);
        assert_eq!(clock.advance(-1.0), 0.0);
        clock.advance(0.5);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }
}
