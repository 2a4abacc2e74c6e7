//! Fetch lifecycle of the route view.
//!
//! ```text
//! Idle/Ready/Empty/Failed --submit--> Loading
//! Loading --samples (non-empty)--> Ready
//! Loading --samples (empty)------> Empty
//! Loading --error----------------> Failed
//! Ready --toggle-----------------> Ready
//! ```
//!
//! Every submission gets a fresh [`RequestId`]. Only the response carrying the
//! latest id may change state, so a slow earlier request cannot overwrite a
//! newer one.

use chrono::{NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::sessions::{active_distance_total, group_and_measure, SessionSummary, Visibility};
use crate::{Bounds, LocationSample, SessionId};

/// Message shown when a period has no recorded route.
pub const NO_ROUTE_MESSAGE: &str = "no route found for period";

/// Message shown when the start date is after the end date.
pub const INVALID_RANGE_MESSAGE: &str = "start date must be on or before end date";

/// Inclusive range of calendar days to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> ApiResult<Self> {
        if start > end {
            return Err(ApiError::InvalidInput(INVALID_RANGE_MESSAGE.to_string()));
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Today..today by the UTC calendar, the range loaded when a view mounts.
    pub fn today() -> Self {
        Self::single_day(Utc::now().date_naive())
    }

    /// `startDate` / `endDate` query parameters in `YYYY-MM-DD` form.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("startDate", self.start.format("%Y-%m-%d").to_string()),
            ("endDate", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Sequence number of a route request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Where the view is in its fetch lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading { request: RequestId, range: DateRange },
    Ready,
    Empty(String),
    Failed(String),
}

/// State of one route view: lifecycle plus the data it renders.
///
/// Sessions, distances and visibility are only populated in [`ViewState::Ready`];
/// every other state keeps them cleared.
#[derive(Debug, Clone)]
pub struct RouteView {
    state: ViewState,
    last_request: u64,
    summary: SessionSummary,
    visible: Visibility,
}

impl Default for RouteView {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteView {
    pub fn new() -> Self {
        Self {
            state: ViewState::Idle,
            last_request: 0,
            summary: SessionSummary::default(),
            visible: Visibility::default(),
        }
    }

    /// First load of a freshly shown view: today..today.
    pub fn mount(&mut self) -> RequestId {
        self.submit(DateRange::today())
    }

    /// Start loading `range`. Clears everything currently shown.
    pub fn submit(&mut self, range: DateRange) -> RequestId {
        self.last_request += 1;
        let request = RequestId(self.last_request);
        self.clear();
        self.state = ViewState::Loading { request, range };
        debug!("[RouteView] request #{} for {} .. {}", request.0, range.start, range.end);
        request
    }

    /// Apply the outcome of a request.
    ///
    /// Returns `false` (and changes nothing) when `request` is not the latest
    /// submission or the view is not waiting for it.
    pub fn complete(&mut self, request: RequestId, outcome: ApiResult<Vec<LocationSample>>) -> bool {
        let waiting = matches!(self.state, ViewState::Loading { request: r, .. } if r == request);
        if request.0 != self.last_request || !waiting {
            debug!(
                "[RouteView] dropping stale response #{} (latest #{})",
                request.0, self.last_request
            );
            return false;
        }

        match outcome {
            Ok(samples) if samples.is_empty() => {
                self.clear();
                self.state = ViewState::Empty(NO_ROUTE_MESSAGE.to_string());
            }
            Ok(samples) => {
                self.summary = group_and_measure(&samples);
                self.visible = Visibility::all_visible(self.summary.groups.keys());
                info!(
                    "[RouteView] #{} ready: {} sessions from {} samples",
                    request.0,
                    self.summary.groups.len(),
                    samples.len()
                );
                self.state = ViewState::Ready;
            }
            Err(err) => {
                self.clear();
                self.state = ViewState::Failed(err.user_message());
            }
        }
        true
    }

    /// Flip the visibility of one session. Only meaningful in `Ready`.
    pub fn toggle(&mut self, session: &SessionId) -> bool {
        if self.state != ViewState::Ready || self.summary.groups.get(session).is_none() {
            return false;
        }
        self.visible.toggle(session);
        true
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ViewState::Loading { .. })
    }

    /// Inline message for `Empty` and `Failed`.
    pub fn message(&self) -> Option<&str> {
        match &self.state {
            ViewState::Empty(msg) | ViewState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visible
    }

    /// Distance of the visible sessions, recomputed on every call.
    pub fn active_distance(&self) -> f64 {
        active_distance_total(&self.summary.distances, &self.visible)
    }

    /// Box the map should fit: the visible sessions, else the default position.
    pub fn view_bounds(&self) -> Bounds {
        self.summary.view_bounds(self.visible.visible_ids().iter())
    }

    fn clear(&mut self) {
        self.summary = SessionSummary::default();
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn samples() -> Vec<LocationSample> {
        vec![
            LocationSample::new(1, 0.0, 0.0, 0),
            LocationSample::new(1, 0.0, 0.01, 60),
            LocationSample::new(2, 10.0, 10.0, 120),
        ]
    }

    fn ready_view() -> RouteView {
        let mut view = RouteView::new();
        let req = view.submit(DateRange::single_day(day(2024, 5, 1)));
        assert!(view.complete(req, Ok(samples())));
        view
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::new(day(2024, 5, 1), day(2024, 5, 3)).is_ok());
        assert!(DateRange::new(day(2024, 5, 3), day(2024, 5, 3)).is_ok());

        let err = DateRange::new(day(2024, 5, 4), day(2024, 5, 3)).unwrap_err();
        assert_eq!(err.user_message(), INVALID_RANGE_MESSAGE);
    }

    #[test]
    fn test_query_params_format() {
        let range = DateRange::new(day(2024, 1, 9), day(2024, 2, 10)).unwrap();
        let params = range.query_params();
        assert_eq!(params[0], ("startDate", "2024-01-09".to_string()));
        assert_eq!(params[1], ("endDate", "2024-02-10".to_string()));
    }

    #[test]
    fn test_today_is_single_day() {
        let range = DateRange::today();
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_mount_loads_today() {
        let mut view = RouteView::new();
        assert_eq!(view.state(), &ViewState::Idle);

        let req = view.mount();
        assert!(matches!(
            view.state(),
            ViewState::Loading { request, range } if *request == req && range.start == range.end
        ));
        assert!(view.complete(req, Ok(samples())));
        assert_eq!(view.state(), &ViewState::Ready);
    }

    #[test]
    fn test_success_reaches_ready_with_all_visible() {
        let view = ready_view();
        assert_eq!(view.state(), &ViewState::Ready);
        assert_eq!(view.summary().groups.len(), 2);
        assert!(view.visibility().is_visible(&SessionId::from("1")));
        assert!(view.visibility().is_visible(&SessionId::from("2")));
        assert!((view.active_distance() - view.summary().distances.total()).abs() < 1e-9);
    }

    #[test]
    fn test_empty_response_reaches_empty() {
        let mut view = RouteView::new();
        let req = view.submit(DateRange::today());
        assert!(view.complete(req, Ok(vec![])));
        assert_eq!(view.state(), &ViewState::Empty(NO_ROUTE_MESSAGE.to_string()));
        assert!(view.summary().is_empty());
        assert!(view.visibility().is_empty());
    }

    #[test]
    fn test_failure_leaves_state_cleared() {
        let mut view = ready_view();
        let req = view.submit(DateRange::today());
        let cleared_summary = view.summary().clone();
        let cleared_visibility = view.visibility().clone();
        assert!(cleared_summary.is_empty());

        assert!(view.complete(req, Err(ApiError::Transport("connection refused".into()))));
        assert_eq!(view.state(), &ViewState::Failed("connection refused".to_string()));
        assert_eq!(view.summary(), &cleared_summary);
        assert_eq!(view.visibility(), &cleared_visibility);
        assert_eq!(view.active_distance(), 0.0);
    }

    #[test]
    fn test_submit_clears_previous_sessions() {
        let mut view = ready_view();
        view.submit(DateRange::today());
        assert!(view.is_loading());
        assert!(view.summary().groups.is_empty());
        assert!(view.summary().distances.is_empty());
        assert!(view.visibility().is_empty());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut view = RouteView::new();
        let first = view.submit(DateRange::single_day(day(2024, 5, 1)));
        let second = view.submit(DateRange::single_day(day(2024, 5, 2)));
        assert!(second > first);

        // Slow first request lands after the second was issued
        assert!(!view.complete(first, Ok(samples())));
        assert!(view.is_loading());
        assert!(view.summary().is_empty());

        assert!(view.complete(second, Ok(vec![LocationSample::new(9, 1.0, 1.0, 0)])));
        assert_eq!(view.summary().groups.len(), 1);

        // And a late first response after the second completed changes nothing
        assert!(!view.complete(first, Err(ApiError::Transport("late".into()))));
        assert_eq!(view.state(), &ViewState::Ready);
    }

    #[test]
    fn test_duplicate_completion_is_ignored() {
        let mut view = RouteView::new();
        let req = view.submit(DateRange::today());
        assert!(view.complete(req, Ok(samples())));
        assert!(!view.complete(req, Ok(vec![])));
        assert_eq!(view.state(), &ViewState::Ready);
    }

    #[test]
    fn test_toggle_changes_only_visibility() {
        let mut view = ready_view();
        let before = view.summary().clone();
        let one = SessionId::from("1");

        assert!(view.toggle(&one));
        assert!(!view.visibility().is_visible(&one));
        assert_eq!(view.summary(), &before);
        assert_eq!(view.active_distance(), 0.0);

        assert!(view.toggle(&one));
        assert!(view.visibility().is_visible(&one));
    }

    #[test]
    fn test_toggle_outside_ready_is_noop() {
        let mut view = RouteView::new();
        assert!(!view.toggle(&SessionId::from("1")));

        let mut ready = ready_view();
        assert!(!ready.toggle(&SessionId::from("unknown")));
    }

    #[test]
    fn test_view_reenters_after_failure() {
        let mut view = RouteView::new();
        let req = view.submit(DateRange::today());
        view.complete(req, Err(ApiError::Transport("offline".into())));
        assert_eq!(view.message(), Some("offline"));

        let req = view.submit(DateRange::today());
        assert!(view.message().is_none());
        assert!(view.complete(req, Ok(samples())));
        assert_eq!(view.state(), &ViewState::Ready);
    }

    #[test]
    fn test_view_bounds_follow_visibility() {
        let mut view = ready_view();
        assert_eq!(view.view_bounds().max_lat, 10.0);

        view.toggle(&SessionId::from("2"));
        let bounds = view.view_bounds();
        assert_eq!((bounds.min_lng, bounds.max_lng), (0.0, 0.01));
        assert_eq!(bounds.max_lat, 0.0);

        assert_eq!(RouteView::new().view_bounds().center(), crate::geo_utils::DEFAULT_MAP_CENTER);
    }
}
