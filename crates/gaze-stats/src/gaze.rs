//! Reconciliation of binocular gaze samples.
//!
//! Eye trackers report a screen position for each eye. A reading outside the
//! screen means the tracker lost that eye. The two eyes are combined per axis:
//! both valid are averaged, one valid is used as is, and neither valid leaves
//! the axis at [`INVALID_COORD`].

use serde::{Deserialize, Serialize};

use crate::geometry::ScreenGeometry;

/// Placeholder for an axis with no valid reading (`INT_MAX` in the tracker SDK)
pub const INVALID_COORD: f64 = i32::MAX as f64;

/// Which eye(s) produced an out-of-range reading for a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadSide {
    Right,
    Left,
    Both,
}

impl BadSide {
    /// Combine the classification from one axis with the classification
    /// accumulated so far. Different eyes, or a both-bad axis, give `Both`.
    fn merge(current: Option<BadSide>, side: BadSide) -> BadSide {
        match current {
            None => side,
            Some(existing) if existing == side => side,
            Some(_) => BadSide::Both,
        }
    }
}

/// A single gaze position derived from both eyes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciledGaze {
    pub x: f64,
    pub y: f64,
    pub bad_side: Option<BadSide>,
}

impl ReconciledGaze {
    /// A sample can be used for distance statistics unless both eyes failed
    pub fn is_usable(&self) -> bool {
        self.bad_side != Some(BadSide::Both)
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Combines per-eye readings into one validated gaze position.
#[derive(Debug, Clone, Copy)]
pub struct GazeReconciler {
    screen: ScreenGeometry,
}

impl GazeReconciler {
    pub fn new(screen: ScreenGeometry) -> Self {
        Self { screen }
    }

    /// Reconcile right and left eye readings.
    ///
    /// ```
    /// use gaze_stats::gaze::{BadSide, GazeReconciler};
    /// use gaze_stats::geometry::ScreenGeometry;
    ///
    /// let reconciler = GazeReconciler::new(ScreenGeometry::default());
    /// let gaze = reconciler.reconcile((500, 500), (99999, 500));
    /// assert_eq!(gaze.position(), (500.0, 500.0));
    /// assert_eq!(gaze.bad_side, Some(BadSide::Left));
    /// ```
    pub fn reconcile(&self, right: (i64, i64), left: (i64, i64)) -> ReconciledGaze {
        let right = [right.0, right.1];
        let left = [left.0, left.1];
        let mut position = [INVALID_COORD; 2];
        let mut bad_side = None;

        for axis in 0..2 {
            let right_ok = self.screen.in_range(axis, right[axis]);
            let left_ok = self.screen.in_range(axis, left[axis]);

            match (right_ok, left_ok) {
                (true, true) => {
                    position[axis] = (right[axis] + left[axis]) as f64 / 2.0;
                }
                (true, false) => {
                    position[axis] = right[axis] as f64;
                    bad_side = Some(BadSide::merge(bad_side, BadSide::Left));
                }
                (false, true) => {
                    position[axis] = left[axis] as f64;
                    bad_side = Some(BadSide::merge(bad_side, BadSide::Right));
                }
                (false, false) => bad_side = Some(BadSide::Both),
            }
        }

        ReconciledGaze {
            x: position[0],
            y: position[1],
            bad_side,
        }
    }
}

impl Default for GazeReconciler {
    fn default() -> Self {
        Self::new(ScreenGeometry::default())
    }
}

/// Drops readings that repeat the previously retained position.
///
/// Some trackers report the last good reading again instead of flagging the
/// sample as invalid. Samples must be offered in recording order.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFilter {
    enabled: bool,
    previous: Option<(f64, f64)>,
}

impl DuplicateFilter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            previous: None,
        }
    }

    /// Returns `false` when the sample should be discarded as a duplicate.
    /// Retained samples become the new comparison point.
    pub fn retain(&mut self, position: (f64, f64)) -> bool {
        if self.enabled && self.previous == Some(position) {
            return false;
        }
        self.previous = Some(position);
        true
    }
}

/// Tally of bad reads for one aggregation group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadDataCounts {
    pub right: u64,
    pub left: u64,
    pub both: u64,
}

impl BadDataCounts {
    pub fn record(&mut self, side: BadSide) {
        match side {
            BadSide::Right => self.right += 1,
            BadSide::Left => self.left += 1,
            BadSide::Both => self.both += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.right + self.left + self.both
    }
}
