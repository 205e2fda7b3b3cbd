use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::judgment::{default_tiers, Tier, TierSet};
use crate::note::{NoteExpander, ANTICIPATION_BEATS, DISAPPEAR_BEATS};
use crate::{LoopbeatError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub play: PlayConfig,
    pub judgment: JudgmentConfig,
    pub editor: EditorConfig,
    /// Directory holding persisted tracks.
    pub tracks_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            play: PlayConfig::default(),
            judgment: JudgmentConfig::default(),
            editor: EditorConfig::default(),
            tracks_dir: "tracks".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.play.validate()?;
        config.judgment.tier_set()?;
        Ok(config)
    }
}

/// Play-time calibration and note timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayConfig {
    /// Seconds added to the song offset when computing the current beat.
    pub sync_offset: f64,
    /// Seconds subtracted from press timestamps before judging.
    pub hit_offset: f64,
    pub anticipation_beats: f64,
    pub disappear_beats: f64,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            sync_offset: 0.0,
            hit_offset: 0.0,
            anticipation_beats: ANTICIPATION_BEATS,
            disappear_beats: DISAPPEAR_BEATS,
        }
    }
}

impl PlayConfig {
    /// Offsets must be finite; the fade lengths must also be non-negative.
    pub fn validate(&self) -> Result<()> {
        let offsets = [("sync_offset", self.sync_offset), ("hit_offset", self.hit_offset)];
        if let Some((name, value)) = offsets.iter().find(|(_, value)| !value.is_finite()) {
            return Err(LoopbeatError::InvalidConfig(format!(
                "{name} must be finite, got {value}"
            )));
        }

        let lengths = [
            ("anticipation_beats", self.anticipation_beats),
            ("disappear_beats", self.disappear_beats),
        ];
        if let Some((name, value)) = lengths
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(LoopbeatError::InvalidConfig(format!(
                "{name} must be a non-negative number of beats, got {value}"
            )));
        }
        Ok(())
    }

    pub fn expander(&self) -> NoteExpander {
        NoteExpander::new(self.anticipation_beats, self.disappear_beats)
    }
}

/// Judgment tiers in precedence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    pub tiers: Vec<Tier>,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl JudgmentConfig {
    pub fn tier_set(&self) -> Result<TierSet> {
        TierSet::new(self.tiers.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub lane_count: usize,
    /// Bars skipped by a phrase jump.
    pub phrase_bars: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            lane_count: 4,
            phrase_bars: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.editor.lane_count, 4);
        assert_eq!(config.play.anticipation_beats, 2.0);
        assert_eq!(config.judgment.tier_set().unwrap().outer_margin(), 0.25);
        assert_eq!(config.tracks_dir, "tracks");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{"play":{"hit_offset":0.02},"judgment":{"tiers":[{"margin":0.05,"label":"Exact"}]}}"#,
        )
        .unwrap();
        assert_eq!(config.play.hit_offset, 0.02);
        assert_eq!(config.play.disappear_beats, 0.5);
        assert_eq!(config.judgment.tiers[0].label, "Exact");
    }

    #[test]
    fn rejects_negative_or_non_finite_note_timing() {
        assert!(AppConfig::from_json_str(r#"{"play":{"anticipation_beats":-1}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"play":{"disappear_beats":-0.5}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"play":{"anticipation_beats":0,"disappear_beats":0}}"#).is_ok());

        let play = PlayConfig {
            anticipation_beats: f64::INFINITY,
            ..PlayConfig::default()
        };
        assert!(matches!(play.validate(), Err(LoopbeatError::InvalidConfig(_))));
        let play = PlayConfig {
            hit_offset: f64::NAN,
            ..PlayConfig::default()
        };
        assert!(play.validate().is_err());
        assert!(PlayConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unusable_tiers() {
        assert!(AppConfig::from_json_str(r#"{"judgment":{"tiers":[]}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"judgment":{"tiers":[{"margin":-1,"label":"X"}]}}"#).is_err());
    }
}
