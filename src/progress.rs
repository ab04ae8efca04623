//! Settlement accounting and status labels.

/// Status text shown under the counter, derived from the displayed percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Initializing,
    LoadingVideos,
    Preparing,
    AlmostReady,
    Complete,
}

impl StatusLabel {
    /// First matching range wins; anything at or above 100 is complete.
    pub fn for_progress(progress: u8) -> Self {
        match progress {
            0..25 => Self::Initializing,
            25..50 => Self::LoadingVideos,
            50..75 => Self::Preparing,
            75..100 => Self::AlmostReady,
            _ => Self::Complete,
        }
    }

    pub fn text<'a>(self, completion_message: &'a str) -> &'a str {
        match self {
            Self::Initializing => "Initializing assets...",
            Self::LoadingVideos => "Loading videos...",
            Self::Preparing => "Preparing experience...",
            Self::AlmostReady => "Almost ready...",
            Self::Complete => completion_message,
        }
    }
}

/// Counts settled assets and derives the actual progress percentage.
///
/// The settlement-derived percentage is kept apart from the two overrides a
/// session may apply: a bootstrap floor shown while nothing has settled, and
/// the forced completion of the fallback guard.
#[derive(Clone, Debug)]
pub struct ProgressAggregator {
    total: usize,
    settled: usize,
    floor: u8,
    forced: bool,
}

impl ProgressAggregator {
    /// `total` of zero is treated as one so the percentage math stays defined.
    pub fn new(total: usize) -> Self {
        Self {
            total: total.max(1),
            settled: 0,
            floor: 0,
            forced: false,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    /// Records one settled asset, whatever its outcome, and returns the new
    /// actual percentage. Extra settlements beyond the total are ignored.
    pub fn record_settlement(&mut self) -> u8 {
        if self.settled < self.total {
            self.settled += 1;
        }
        self.current_percentage()
    }

    /// `round(settled / total * 100)`, ignoring any override.
    pub fn settled_percentage(&self) -> u8 {
        ((self.settled as f64 / self.total as f64) * 100.0).round() as u8
    }

    /// Actual progress: the settled percentage raised by the floor, or 100 when forced.
    pub fn current_percentage(&self) -> u8 {
        if self.forced {
            return 100;
        }
        self.settled_percentage().max(self.floor)
    }

    /// Applies the bootstrap floor if nothing has settled yet.
    ///
    /// Returns whether the floor took effect.
    pub fn apply_bootstrap_floor(&mut self, floor: u8) -> bool {
        if self.settled > 0 || self.forced {
            return false;
        }
        self.floor = self.floor.max(floor.min(100));
        true
    }

    pub fn force_complete(&mut self) {
        self.forced = true;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn all_settled(&self) -> bool {
        self.settled == self.total
    }

    /// The "N" of the "N/M" asset counter, as implied by `progress`.
    pub fn counter_for(&self, progress: u8) -> usize {
        ((f64::from(progress) / 100.0) * self.total as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_thresholds() {
        let done = "Welcome!";
        assert_eq!(StatusLabel::for_progress(0).text(done), "Initializing assets...");
        assert_eq!(StatusLabel::for_progress(24).text(done), "Initializing assets...");
        assert_eq!(StatusLabel::for_progress(25).text(done), "Loading videos...");
        assert_eq!(StatusLabel::for_progress(30).text(done), "Loading videos...");
        assert_eq!(StatusLabel::for_progress(60).text(done), "Preparing experience...");
        assert_eq!(StatusLabel::for_progress(90).text(done), "Almost ready...");
        assert_eq!(StatusLabel::for_progress(99).text(done), "Almost ready...");
        assert_eq!(StatusLabel::for_progress(100).text(done), done);
    }

    #[test]
    fn four_assets_step_by_quarters() {
        let mut agg = ProgressAggregator::new(4);
        assert_eq!(agg.current_percentage(), 0);
        assert_eq!(agg.record_settlement(), 25);
        assert_eq!(agg.record_settlement(), 50);
        assert_eq!(agg.record_settlement(), 75);
        assert_eq!(agg.record_settlement(), 100);
        assert!(agg.all_settled());
    }

    #[test]
    fn rounding_matches_nearest_percent() {
        let mut agg = ProgressAggregator::new(3);
        assert_eq!(agg.record_settlement(), 33);
        assert_eq!(agg.record_settlement(), 67);
        assert_eq!(agg.record_settlement(), 100);
    }

    #[test]
    fn settled_count_never_exceeds_total() {
        let mut agg = ProgressAggregator::new(1);
        agg.record_settlement();
        agg.record_settlement();
        assert_eq!(agg.settled(), 1);
        assert_eq!(agg.current_percentage(), 100);
    }

    #[test]
    fn bootstrap_floor_only_applies_before_first_settlement() {
        let mut agg = ProgressAggregator::new(20);
        assert!(agg.apply_bootstrap_floor(10));
        assert_eq!(agg.current_percentage(), 10);
        assert_eq!(agg.settled_percentage(), 0);

        // 1/20 = 5% stays under the floor until real progress passes it.
        assert_eq!(agg.record_settlement(), 10);
        assert_eq!(agg.record_settlement(), 10);
        assert_eq!(agg.record_settlement(), 15);

        let mut late = ProgressAggregator::new(4);
        late.record_settlement();
        assert!(!late.apply_bootstrap_floor(10));
        assert_eq!(late.current_percentage(), 25);
    }

    #[test]
    fn forcing_reports_complete_without_touching_settlements() {
        let mut agg = ProgressAggregator::new(5);
        agg.force_complete();
        assert_eq!(agg.current_percentage(), 100);
        assert_eq!(agg.settled(), 0);
        assert!(!agg.all_settled());
    }

    #[test]
    fn counter_tracks_progress() {
        let agg = ProgressAggregator::new(4);
        assert_eq!(agg.counter_for(0), 0);
        assert_eq!(agg.counter_for(75), 3);
        assert_eq!(agg.counter_for(100), 4);
    }
}
