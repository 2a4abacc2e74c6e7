//! Session aggregation for route views.
//!
//! Turns the flat sample list returned by the route endpoint into:
//! - samples grouped per trip (stable partition, no re-sorting)
//! - per-trip travelled distance
//! - the combined distance of the trips currently shown on the map
//!
//! Everything here is a pure function of its input. Derived totals are
//! recomputed on demand from the canonical distance and visibility maps.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;

use crate::geo_utils::{polyline_length, view_bounds};
use crate::{Bounds, GpsPoint, LocationSample, SessionId};

// ============================================================================
// Ordered maps keyed by session
// ============================================================================

/// Map keyed by session id that iterates in first-insertion order.
#[derive(Debug, Clone, PartialEq)]
struct OrderedSessions<V> {
    entries: Vec<(SessionId, V)>,
    index: HashMap<SessionId, usize>,
}

impl<V> Default for OrderedSessions<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> OrderedSessions<V> {
    fn get(&self, id: &SessionId) -> Option<&V> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    fn get_mut(&mut self, id: &SessionId) -> Option<&mut V> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    fn entry_or_insert_with(&mut self, id: &SessionId, make: impl FnOnce() -> V) -> &mut V {
        let i = match self.index.get(id) {
            Some(&i) => i,
            None => {
                self.entries.push((id.clone(), make()));
                let i = self.entries.len() - 1;
                self.index.insert(id.clone(), i);
                i
            }
        };
        &mut self.entries[i].1
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&SessionId, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// Samples grouped by session, in order of each session's first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionGroups {
    inner: OrderedSessions<Vec<LocationSample>>,
}

impl SessionGroups {
    /// Samples of one session, in input order.
    pub fn get(&self, id: &SessionId) -> Option<&[LocationSample]> {
        self.inner.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Session ids in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &SessionId> {
        self.inner.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &[LocationSample])> {
        self.inner.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// All samples, group after group.
    pub fn flatten(&self) -> Vec<LocationSample> {
        self.inner
            .iter()
            .flat_map(|(_, samples)| samples.iter().cloned())
            .collect()
    }
}

/// Travelled distance per session in meters, in the same order as [`SessionGroups`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDistances {
    inner: OrderedSessions<f64>,
}

impl SessionDistances {
    pub fn get(&self, id: &SessionId) -> Option<f64> {
        self.inner.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &SessionId> {
        self.inner.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, f64)> {
        self.inner.iter().map(|(k, v)| (k, *v))
    }

    /// Sum over every session.
    pub fn total(&self) -> f64 {
        self.inner.iter().map(|(_, v)| *v).sum()
    }

    fn insert(&mut self, id: &SessionId, meters: f64) {
        *self.inner.entry_or_insert_with(id, || 0.0) = meters;
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Result of [`group_and_measure`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub groups: SessionGroups,
    pub distances: SessionDistances,
}

/// Partition samples by session and measure each session.
///
/// The partition is stable: a session's samples keep their relative input
/// order and sessions are keyed in the order they are first seen. Each
/// session's distance is the sum of haversine distances between consecutive
/// samples; sessions with fewer than two samples measure exactly 0.
///
/// Empty input yields empty maps. Callers that need to tell "no data" apart
/// should check the raw sample list before calling.
///
/// # Example
/// ```
/// use route_viewer::{LocationSample, sessions::group_and_measure};
///
/// let summary = group_and_measure(&[
///     LocationSample::new("a", 59.93, 30.31, 0),
///     LocationSample::new("b", 59.95, 30.40, 30),
///     LocationSample::new("a", 59.94, 30.32, 60),
/// ]);
///
/// let keys: Vec<_> = summary.groups.keys().map(|k| k.as_str()).collect();
/// assert_eq!(keys, ["a", "b"]);
/// assert_eq!(summary.distances.get(&"b".into()), Some(0.0));
/// ```
pub fn group_and_measure(samples: &[LocationSample]) -> SessionSummary {
    let mut groups = SessionGroups::default();
    for sample in samples {
        groups
            .inner
            .entry_or_insert_with(&sample.session_id, Vec::new)
            .push(sample.clone());
    }

    let mut distances = SessionDistances::default();
    for (id, members) in groups.iter() {
        distances.insert(id, session_distance(members));
    }

    debug!(
        "[Sessions] {} samples -> {} sessions, {:.0}m total",
        samples.len(),
        groups.len(),
        distances.total()
    );

    SessionSummary { groups, distances }
}

/// Distance of one session: haversine over consecutive samples, in order.
pub fn session_distance(samples: &[LocationSample]) -> f64 {
    let track: Vec<GpsPoint> = samples.iter().map(LocationSample::point).collect();
    polyline_length(&track)
}

/// Sum the distance of every session marked visible.
///
/// Sessions absent from `visible` or marked hidden are skipped. A visible
/// session with no distance entry counts as 0.
pub fn active_distance_total(distances: &SessionDistances, visible: &Visibility) -> f64 {
    visible
        .inner
        .iter()
        .filter(|(_, shown)| **shown)
        .map(|(id, _)| distances.get(id).unwrap_or(0.0))
        .fold(0.0, |acc, d| acc + d)
}

// ============================================================================
// Visibility
// ============================================================================

/// Which sessions are currently shown on the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visibility {
    inner: OrderedSessions<bool>,
}

impl Visibility {
    /// Every listed session visible.
    pub fn all_visible<'a>(ids: impl IntoIterator<Item = &'a SessionId>) -> Self {
        let mut visibility = Self::default();
        for id in ids {
            *visibility.inner.entry_or_insert_with(id, || true) = true;
        }
        visibility
    }

    /// Flip one session. Unknown ids start from "not visible" and become visible.
    pub fn toggle(&mut self, id: &SessionId) {
        match self.inner.get_mut(id) {
            Some(shown) => *shown = !*shown,
            None => {
                self.inner.entry_or_insert_with(id, || true);
            }
        }
    }

    pub fn set(&mut self, id: &SessionId, shown: bool) {
        *self.inner.entry_or_insert_with(id, || shown) = shown;
    }

    pub fn is_visible(&self, id: &SessionId) -> bool {
        self.inner.get(id).copied().unwrap_or(false)
    }

    /// Visible session ids in first-seen order.
    pub fn visible_ids(&self) -> Vec<SessionId> {
        self.inner
            .iter()
            .filter(|(_, shown)| **shown)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn clear(&mut self) {
        self.inner = OrderedSessions::default();
    }
}

// ============================================================================
// Derived per-session statistics
// ============================================================================

/// Summary of one trip for lists and popups.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub sample_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds between first and last sample (0 if they are out of order)
    pub duration_secs: i64,
    /// Meters
    pub distance: f64,
    /// km/h, 0 when the duration is 0
    pub average_speed_kmh: f64,
}

impl SessionStats {
    fn from_group(session_id: &SessionId, samples: &[LocationSample], distance: f64) -> Self {
        let first = samples.first();
        let last = samples.last();
        let duration_secs = match (first, last) {
            (Some(f), Some(l)) => (l.timestamp - f.timestamp).max(0),
            _ => 0,
        };
        let average_speed_kmh = if duration_secs > 0 {
            (distance / 1000.0) / (duration_secs as f64 / 3600.0)
        } else {
            0.0
        };

        Self {
            session_id: session_id.clone(),
            sample_count: samples.len(),
            started_at: first.and_then(LocationSample::recorded_at),
            ended_at: last.and_then(LocationSample::recorded_at),
            duration_secs,
            distance,
            average_speed_kmh,
        }
    }

    /// Duration in whole minutes, as leaderboards show it.
    pub fn duration_minutes(&self) -> i64 {
        self.duration_secs / 60
    }
}

impl SessionSummary {
    /// Per-session statistics in group order.
    pub fn stats(&self) -> Vec<SessionStats> {
        self.groups
            .iter()
            .map(|(id, samples)| {
                let distance = self.distances.get(id).unwrap_or(0.0);
                SessionStats::from_group(id, samples, distance)
            })
            .collect()
    }

    /// One polyline per session for the map renderer.
    pub fn polylines(&self) -> Vec<(SessionId, Vec<GpsPoint>)> {
        self.groups
            .iter()
            .map(|(id, samples)| (id.clone(), samples.iter().map(LocationSample::point).collect()))
            .collect()
    }

    /// Box fitting the given sessions, or the default map position if none match.
    pub fn view_bounds<'a>(&self, sessions: impl IntoIterator<Item = &'a SessionId>) -> Bounds {
        let points: Vec<GpsPoint> = sessions
            .into_iter()
            .filter_map(|id| self.groups.get(id))
            .flatten()
            .map(LocationSample::point)
            .collect();
        view_bounds(&points)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
