use std::fmt;

use crate::note::{Note, NoteExpansion};

/// Scale applied to a note for a short moment after it is hit.
pub const POP_SCALE: f64 = 1.1;
/// How long the hit pop lasts, in seconds.
pub const POP_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Presentation lifecycle of a spawned note. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    Anticipated,
    Visible,
    FadingOut,
    Despawned,
}

#[derive(Debug, Clone, Copy)]
struct FadeTimer {
    started_at: f64,
    duration: f64,
}

impl FadeTimer {
    fn new(started_at: f64, duration: f64) -> Self {
        Self {
            started_at,
            duration: duration.max(0.0),
        }
    }

    fn ends_at(&self) -> f64 {
        self.started_at + self.duration
    }

    fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0)
    }

    fn finished(&self, now: f64) -> bool {
        now >= self.ends_at()
    }
}

/// Runtime projection of one [`Note`]: the instants still waiting for a
/// judgment plus the fade state used by the presentation layer.
#[derive(Debug, Clone)]
pub struct NoteInstance {
    id: InstanceId,
    note: Note,
    hits: Vec<f64>,
    state: Lifecycle,
    fade_in: FadeTimer,
    fade_out_seconds: f64,
    fade_out_requested_at: Option<f64>,
    fade_out: Option<FadeTimer>,
    pop: Option<FadeTimer>,
}

impl NoteInstance {
    /// Spawns an instance at song time `now`; the fade-in starts immediately.
    pub fn spawn(id: InstanceId, note: Note, expansion: NoteExpansion, now: f64) -> Self {
        Self {
            id,
            note,
            hits: expansion.hit_instants,
            state: Lifecycle::Anticipated,
            fade_in: FadeTimer::new(now, expansion.fade_in_seconds),
            fade_out_seconds: expansion.fade_out_seconds,
            fade_out_requested_at: None,
            fade_out: None,
            pop: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn lane(&self) -> usize {
        self.note.lane
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn remaining_hits(&self) -> &[f64] {
        &self.hits
    }

    pub fn is_exhausted(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn is_despawned(&self) -> bool {
        self.state == Lifecycle::Despawned
    }

    pub(crate) fn consume_hit(&mut self, index: usize) -> f64 {
        self.hits.remove(index)
    }

    /// Removes and returns every remaining instant matching `expired`,
    /// preserving order.
    pub(crate) fn consume_matching(&mut self, mut expired: impl FnMut(f64) -> bool) -> Vec<f64> {
        let mut taken = Vec::new();
        self.hits.retain(|&hit| {
            if expired(hit) {
                taken.push(hit);
                false
            } else {
                true
            }
        });
        taken
    }

    /// Starts the transient pop feedback.
    pub fn pop(&mut self, now: f64) {
        self.pop = Some(FadeTimer::new(now, POP_SECONDS));
    }

    /// Asks the instance to fade out. Returns `false` when a fade-out is
    /// already pending or the instance is gone.
    ///
    /// A request made during the fade-in is held until the note is fully
    /// visible.
    pub fn request_fade_out(&mut self, now: f64) -> bool {
        if self.fade_out_requested_at.is_some() || self.state == Lifecycle::Despawned {
            return false;
        }
        self.fade_out_requested_at = Some(now);
        true
    }

    /// Moves the lifecycle forward to song time `now` and returns every
    /// state entered on the way, in order.
    pub fn advance(&mut self, now: f64) -> Vec<Lifecycle> {
        let mut entered = Vec::new();

        if self.state == Lifecycle::Anticipated && self.fade_in.finished(now) {
            self.state = Lifecycle::Visible;
            entered.push(Lifecycle::Visible);
        }

        if self.state == Lifecycle::Visible {
            if let Some(requested_at) = self.fade_out_requested_at {
                let begins_at = requested_at.max(self.fade_in.ends_at());
                self.fade_out = Some(FadeTimer::new(begins_at, self.fade_out_seconds));
                self.state = Lifecycle::FadingOut;
                entered.push(Lifecycle::FadingOut);
            }
        }

        if self.state == Lifecycle::FadingOut
            && self.fade_out.map_or(true, |timer| timer.finished(now))
        {
            self.fade_out = None;
            self.pop = None;
            self.state = Lifecycle::Despawned;
            entered.push(Lifecycle::Despawned);
        }

        entered
    }

    /// Force-removes the instance, dropping any pending timers. Returns
    /// `false` if it had already despawned.
    pub fn cancel(&mut self) -> bool {
        let was_live = self.state != Lifecycle::Despawned;
        self.fade_out_requested_at = None;
        self.fade_out = None;
        self.pop = None;
        self.state = Lifecycle::Despawned;
        was_live
    }

    /// Opacity in `[0, 1]` at song time `now`.
    pub fn alpha(&self, now: f64) -> f64 {
        match self.state {
            Lifecycle::Anticipated => self.fade_in.progress(now),
            Lifecycle::Visible => 1.0,
            Lifecycle::FadingOut => self
                .fade_out
                .map_or(0.0, |timer| 1.0 - timer.progress(now)),
            Lifecycle::Despawned => 0.0,
        }
    }

    /// Size multiplier at song time `now`.
    pub fn scale(&self, now: f64) -> f64 {
        match self.pop {
            Some(timer) if !timer.finished(now) => POP_SCALE,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::expand_note;

    fn spawn(hits: Vec<f64>, now: f64) -> NoteInstance {
        let note = Note::new(0, 2.0, 0.0, 8.0);
        let mut expansion = expand_note(&note, 4, 120.0);
        expansion.hit_instants = hits;
        NoteInstance::spawn(InstanceId(1), note, expansion, now)
    }

    #[test]
    fn fades_in_then_becomes_visible() {
        let mut instance = spawn(vec![2.0, 6.0], 0.0);
        assert_eq!(instance.state(), Lifecycle::Anticipated);
        assert!(instance.advance(0.5).is_empty());
        assert!((instance.alpha(0.5) - 0.5).abs() < 1e-12);

        assert_eq!(instance.advance(1.0), vec![Lifecycle::Visible]);
        assert_eq!(instance.alpha(1.2), 1.0);
    }

    #[test]
    fn fades_out_and_despawns_after_request() {
        let mut instance = spawn(vec![], 0.0);
        instance.advance(1.0);
        assert!(instance.request_fade_out(2.0));
        assert_eq!(instance.advance(2.0), vec![Lifecycle::FadingOut]);
        assert!((instance.alpha(2.125) - 0.5).abs() < 1e-12);

        assert!(instance.advance(2.2).is_empty());
        assert_eq!(instance.advance(2.25), vec![Lifecycle::Despawned]);
        assert_eq!(instance.alpha(3.0), 0.0);
    }

    #[test]
    fn second_fade_out_request_is_ignored() {
        let mut instance = spawn(vec![], 0.0);
        instance.advance(1.0);
        assert!(instance.request_fade_out(1.0));
        instance.advance(1.1);
        assert!(!instance.request_fade_out(1.2));
        assert_eq!(instance.advance(1.25), vec![Lifecycle::Despawned]);
        assert!(!instance.request_fade_out(1.3));
        assert!(instance.advance(5.0).is_empty());
    }

    #[test]
    fn request_during_fade_in_waits_for_visibility() {
        let mut instance = spawn(vec![], 0.0);
        assert!(instance.request_fade_out(0.2));
        assert!(instance.advance(0.4).is_empty());
        assert_eq!(instance.state(), Lifecycle::Anticipated);

        assert_eq!(
            instance.advance(1.0),
            vec![Lifecycle::Visible, Lifecycle::FadingOut]
        );
        assert_eq!(instance.alpha(1.0), 1.0);
        assert_eq!(instance.advance(1.25), vec![Lifecycle::Despawned]);
    }

    #[test]
    fn late_tick_can_run_the_whole_chain() {
        let mut instance = spawn(vec![], 0.0);
        instance.request_fade_out(0.0);
        assert_eq!(
            instance.advance(10.0),
            vec![
                Lifecycle::Visible,
                Lifecycle::FadingOut,
                Lifecycle::Despawned
            ]
        );
    }

    #[test]
    fn cancel_clears_pending_timers() {
        let mut instance = spawn(vec![2.0], 0.0);
        instance.advance(1.0);
        instance.request_fade_out(1.0);
        instance.advance(1.0);
        assert!(instance.cancel());
        assert!(instance.is_despawned());
        assert!(!instance.cancel());
        assert!(instance.advance(2.0).is_empty());
        assert!(!instance.request_fade_out(2.0));
    }

    #[test]
    fn pop_is_transient() {
        let mut instance = spawn(vec![2.0], 0.0);
        instance.pop(1.0);
        assert_eq!(instance.scale(1.05), POP_SCALE);
        assert_eq!(instance.scale(1.2), 1.0);
    }

    #[test]
    fn consumes_matching_hits_in_order() {
        let mut instance = spawn(vec![2.0, 6.0, 10.0], 0.0);
        let taken = instance.consume_matching(|hit| hit < 7.0);
        assert_eq!(taken, vec![2.0, 6.0]);
        assert_eq!(instance.remaining_hits(), &[10.0]);
        assert_eq!(instance.consume_hit(0), 10.0);
        assert!(instance.is_exhausted());
    }
}
