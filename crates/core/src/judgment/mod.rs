//! Hit and miss classification against a beat clock.
//!
//! Tiers are checked in their configured order and the first one whose
//! margin covers the offset wins, even when a later tier is tighter. Hosts
//! that want nearest-window semantics must order their tiers tightest first.

use serde::{Deserialize, Serialize};

use crate::instance::NoteInstance;
use crate::{LoopbeatError, Result};

/// A timing window, in beats either side of a hit instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub margin: f64,
    pub label: String,
}

impl Tier {
    pub fn new(margin: f64, label: impl Into<String>) -> Self {
        Self {
            margin,
            label: label.into(),
        }
    }
}

/// Validated, ordered list of tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierSet {
    tiers: Vec<Tier>,
    outer_margin: f64,
}

impl TierSet {
    pub fn new(tiers: Vec<Tier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(LoopbeatError::InvalidConfig(
                "at least one judgment tier is required".to_string(),
            ));
        }
        if let Some(tier) = tiers
            .iter()
            .find(|tier| !tier.margin.is_finite() || tier.margin <= 0.0)
        {
            return Err(LoopbeatError::InvalidConfig(format!(
                "tier `{}` has a non-positive margin {}",
                tier.label, tier.margin
            )));
        }

        let outer_margin = tiers.iter().map(|tier| tier.margin).fold(0.0, f64::max);
        Ok(Self {
            tiers,
            outer_margin,
        })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Loosest configured margin; anything later than this is a miss.
    pub fn outer_margin(&self) -> f64 {
        self.outer_margin
    }
}

impl Default for TierSet {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            outer_margin: 0.25,
        }
    }
}

pub fn default_tiers() -> Vec<Tier> {
    vec![Tier::new(0.1, "Perfect"), Tier::new(0.25, "Good")]
}

/// Outcome of a successful judgment.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub label: String,
    pub late: bool,
    pub hit_instant: f64,
    /// `current_beat - hit_instant`; positive when late.
    pub offset_beats: f64,
}

/// Judges the first remaining instant that falls inside any tier and
/// consumes it. Returns `None` and leaves the instance untouched otherwise.
pub fn judge(instance: &mut NoteInstance, current_beat: f64, tiers: &TierSet) -> Option<Judgment> {
    let (index, tier) = instance
        .remaining_hits()
        .iter()
        .enumerate()
        .find_map(move |(index, &hit)| {
            let distance = (current_beat - hit).abs();
            tiers
                .tiers()
                .iter()
                .find(|tier| distance <= tier.margin)
                .map(|tier| (index, tier))
        })?;

    let label = tier.label.clone();
    let hit_instant = instance.consume_hit(index);
    let offset_beats = current_beat - hit_instant;
    Some(Judgment {
        label,
        late: offset_beats > 0.0,
        hit_instant,
        offset_beats,
    })
}

/// Consumes every remaining instant more than `outer_margin` beats in the
/// past and returns them in ascending order.
pub fn check_misses(instance: &mut NoteInstance, current_beat: f64, outer_margin: f64) -> Vec<f64> {
    instance.consume_matching(|hit| current_beat - hit > outer_margin)
}

/// Tier configuration plus the hit and miss passes that use it.
#[derive(Debug, Clone, Default)]
pub struct JudgmentEngine {
    tiers: TierSet,
}

impl JudgmentEngine {
    pub fn new(tiers: TierSet) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &TierSet {
        &self.tiers
    }

    /// Judges `instance` at `current_beat` and starts its pop feedback at
    /// song time `now` on success.
    pub fn judge(&self, instance: &mut NoteInstance, current_beat: f64, now: f64) -> Option<Judgment> {
        let judgment = judge(instance, current_beat, &self.tiers)?;
        instance.pop(now);
        tracing::debug!(
            instance = %instance.id(),
            label = %judgment.label,
            late = judgment.late,
            offset = judgment.offset_beats,
            "judged hit"
        );
        Some(judgment)
    }

    pub fn check_misses(&self, instance: &mut NoteInstance, current_beat: f64) -> Vec<f64> {
        let missed = check_misses(instance, current_beat, self.tiers.outer_margin());
        if !missed.is_empty() {
            tracing::debug!(instance = %instance.id(), ?missed, "missed hit instants");
        }
        missed
    }
}
