//! # Route Viewer
//!
//! Trip session aggregation and API client for a telegram-integrated
//! ride/commute tracker.
//!
//! This library provides:
//! - Session aggregation: grouping raw location samples into trips and measuring them
//! - The route view fetch lifecycle (with a stale-response guard)
//! - Typed models for weekly stats, leaderboards, heatmaps and map markers
//! - Telegram sign-in callbacks and persisted preferences
//! - An HTTP client for the tracker API and an active-users poller
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP client and the active-users poller
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_viewer::{LocationSample, sessions};
//!
//! let samples = vec![
//!     LocationSample::new(1, 0.0, 0.0, 0),
//!     LocationSample::new(1, 0.0, 0.01, 60),
//!     LocationSample::new(2, 10.0, 10.0, 120),
//! ];
//!
//! let summary = sessions::group_and_measure(&samples);
//! assert_eq!(summary.groups.len(), 2);
//!
//! let first = summary.distances.get(&"1".into()).unwrap();
//! assert!((first - 1113.2).abs() < 2.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub mod config;
pub mod error;
pub mod geo_utils;
pub mod heatmap;
pub mod identity;
pub mod lifecycle;
pub mod preferences;
pub mod sessions;
pub mod stations;
pub mod stats;

// HTTP client and poller for the tracker API
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod poller;

pub use config::{ClientConfig, RetryConfig};
pub use error::{ApiError, ApiResult};
pub use identity::{AuthCallbacks, AuthConfig, Registration, TelegramUser};
pub use lifecycle::{DateRange, RequestId, RouteView, ViewState};
pub use preferences::{MemoryPreferences, PreferenceStore, Preferences};
pub use sessions::{
    active_distance_total, group_and_measure, SessionDistances, SessionGroups, SessionStats,
    SessionSummary, Visibility,
};

#[cfg(feature = "http")]
pub use http::TrackerClient;
#[cfg(feature = "http")]
pub use poller::{ActiveUser, ActiveUsersHandle, ActiveUsersPoller};

// ============================================================================
// Core Types
// ============================================================================

/// WGS84 position in degrees.
///
/// ```
/// use route_viewer::GpsPoint;
/// let hermitage = GpsPoint::new(59.9398, 30.3146);
/// assert!(hermitage.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Latitude/longitude box, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Smallest box holding every point, `None` for no points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let seed = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lng: first.longitude,
            max_lng: first.longitude,
        };
        Some(rest.iter().fold(seed, |b, p| Self {
            min_lat: b.min_lat.min(p.latitude),
            max_lat: b.max_lat.max(p.latitude),
            min_lng: b.min_lng.min(p.longitude),
            max_lng: b.max_lng.max(p.longitude),
        }))
    }

    pub fn center(&self) -> GpsPoint {
        GpsPoint {
            latitude: (self.min_lat + self.max_lat) / 2.0,
            longitude: (self.min_lng + self.max_lng) / 2.0,
        }
    }

    pub fn contains(&self, point: &GpsPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lng..=self.max_lng).contains(&point.longitude)
    }
}

/// Opaque identifier of one continuous tracked trip.
///
/// The tracker API sends session ids either as JSON numbers or as strings.
/// Both forms are kept as text so `7` and `"7"` name the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSessionId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSessionId::deserialize(deserializer)? {
            RawSessionId::Text(s) => SessionId(s),
            RawSessionId::Signed(n) => SessionId(n.to_string()),
            RawSessionId::Unsigned(n) => SessionId(n.to_string()),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Whole(i64),
    Fractional(f64),
}

/// Epoch seconds sent either whole or fractional; fractions are truncated.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Whole(secs) => secs,
        RawTimestamp::Fractional(secs) => secs.trunc() as i64,
    })
}

/// One location sample as returned by `GET /route/{userId}`.
///
/// `timestamp` is in seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub session_id: SessionId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: i64,
}

impl LocationSample {
    /// Create a sample.
    pub fn new(session_id: impl Into<SessionId>, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Position of this sample.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Wall-clock time of this sample, `None` if the timestamp is out of range.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

// ============================================================================
// Tests
// ============================================================================
