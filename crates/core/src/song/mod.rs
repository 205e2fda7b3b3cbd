use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LoopbeatError, Result};

/// Song parameters shared by the beat clock, the note expander and the editor.
///
/// Values are validated on construction so the judgment core never sees a
/// non-positive tempo or an empty bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSong")]
pub struct Song {
    pub title: String,
    pub track_name: String,
    tempo: f64,
    beats_per_bar: u32,
    beat_unit: u32,
    pub offset: f64,
}

#[derive(Debug, Deserialize)]
struct RawSong {
    #[serde(default)]
    title: String,
    #[serde(default)]
    track_name: String,
    tempo: f64,
    beats_per_bar: u32,
    #[serde(default = "default_beat_unit")]
    beat_unit: u32,
    #[serde(default)]
    offset: f64,
}

fn default_beat_unit() -> u32 {
    4
}

impl TryFrom<RawSong> for Song {
    type Error = LoopbeatError;

    fn try_from(raw: RawSong) -> Result<Self> {
        let mut song = Song::new(raw.tempo, raw.beats_per_bar, raw.beat_unit, raw.offset)?;
        song.title = raw.title;
        song.track_name = raw.track_name;
        Ok(song)
    }
}

impl Song {
    pub fn new(tempo: f64, beats_per_bar: u32, beat_unit: u32, offset: f64) -> Result<Self> {
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(LoopbeatError::InvalidSong(format!(
                "tempo must be positive, got {tempo}"
            )));
        }
        if beats_per_bar == 0 {
            return Err(LoopbeatError::InvalidSong(
                "beats per bar must be positive".to_string(),
            ));
        }
        if beat_unit == 0 {
            return Err(LoopbeatError::InvalidSong(
                "beat unit must be positive".to_string(),
            ));
        }
        if !offset.is_finite() {
            return Err(LoopbeatError::InvalidSong(format!(
                "offset must be finite, got {offset}"
            )));
        }

        Ok(Self {
            title: String::new(),
            track_name: String::new(),
            tempo,
            beats_per_bar,
            beat_unit,
            offset,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_track_name(mut self, track_name: impl Into<String>) -> Self {
        self.track_name = track_name.into();
        self
    }

    /// Reads a JSON song descriptor from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Beats per minute, always positive.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Note-length denominator used by the editor grid.
    pub fn beat_unit(&self) -> u32 {
        self.beat_unit
    }

    /// Length of one beat in seconds.
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_tempo() {
        assert!(Song::new(0.0, 4, 4, 0.0).is_err());
        assert!(Song::new(-120.0, 4, 4, 0.0).is_err());
        assert!(Song::new(f64::NAN, 4, 4, 0.0).is_err());
    }

    #[test]
    fn rejects_empty_bars() {
        let err = Song::new(120.0, 0, 4, 0.0).unwrap_err();
        assert!(format!("{err}").contains("beats per bar"));
    }

    #[test]
    fn accepts_negative_offset() {
        let song = Song::new(120.0, 4, 4, -0.25).unwrap();
        assert_eq!(song.offset, -0.25);
        assert!((song.seconds_per_beat() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn validates_while_deserialising() {
        let song: Song = serde_json::from_str(
            r#"{"title":"Loop","track_name":"loop","tempo":90,"beats_per_bar":3}"#,
        )
        .unwrap();
        assert_eq!(song.beats_per_bar(), 3);
        assert_eq!(song.beat_unit(), 4);
        assert_eq!(song.track_name, "loop");

        let bad = serde_json::from_str::<Song>(r#"{"tempo":0,"beats_per_bar":4}"#);
        assert!(bad.is_err());
    }
}
