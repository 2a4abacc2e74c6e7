//! Crowd-sourced map markers: charging spots, hazards, meeting points.
//!
//! Models for the `/charging-stations` endpoints plus the client-side pieces
//! of the marker map: per-type filtering and a spatial index for viewport
//! queries.

use chrono::{DateTime, Utc};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo_utils::haversine_distance;
use crate::{Bounds, GpsPoint};

// =============================================================================
// Marker types
// =============================================================================

/// Kind of marker. Unknown wire values read as [`MarkerType::Charging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarkerType {
    #[default]
    Charging,
    ChargingAuto,
    Interesting,
    Danger,
    Chat,
}

impl MarkerType {
    pub const ALL: [MarkerType; 5] = [
        MarkerType::Charging,
        MarkerType::ChargingAuto,
        MarkerType::Interesting,
        MarkerType::Danger,
        MarkerType::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerType::Charging => "charging",
            MarkerType::ChargingAuto => "chargingAuto",
            MarkerType::Interesting => "interesting",
            MarkerType::Danger => "danger",
            MarkerType::Chat => "chat",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "chargingAuto" => MarkerType::ChargingAuto,
            "interesting" => MarkerType::Interesting,
            "danger" => MarkerType::Danger,
            "chat" => MarkerType::Chat,
            _ => MarkerType::Charging,
        }
    }

    /// Heading shown on the marker card.
    pub fn title(&self) -> &'static str {
        match self {
            MarkerType::Charging => "Charging spot",
            MarkerType::ChargingAuto => "Car charger",
            MarkerType::Interesting => "Point of interest",
            MarkerType::Danger => "Hazard",
            MarkerType::Chat => "Meeting spot",
        }
    }
}

impl Serialize for MarkerType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MarkerType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MarkerType::from_wire(&raw))
    }
}

// =============================================================================
// Stations
// =============================================================================

/// Who added a marker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddedBy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A marker as returned by `GET /charging-stations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(rename = "_id")]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub marker_type: MarkerType,
    #[serde(default, rename = "is24Hours")]
    pub is_24_hours: bool,
    #[serde(default)]
    pub comment: Option<String>,
    /// Photo URL
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub added_by: AddedBy,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

impl Station {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Username of the author, falling back to the display name.
    pub fn author_name(&self) -> Option<&str> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.is_empty())
        }
        non_empty(&self.added_by.username).or_else(|| non_empty(&self.added_by.name))
    }

    /// Route-to link for Yandex Maps, `None` if the coordinates are unusable.
    ///
    /// ```
    /// use route_viewer::stations::{Station, MarkerType};
    /// let station: Station = serde_json::from_str(
    ///     r#"{"_id":"s1","latitude":59.93,"longitude":30.31}"#
    /// ).unwrap();
    /// assert_eq!(
    ///     station.directions_url().unwrap(),
    ///     "https://yandex.ru/maps/?rtext=~59.93,30.31&rtt=bc"
    /// );
    /// assert_eq!(station.marker_type, MarkerType::Charging);
    /// ```
    pub fn directions_url(&self) -> Option<String> {
        if !self.point().is_valid() || (self.latitude == 0.0 && self.longitude == 0.0) {
            return None;
        }
        Some(format!(
            "https://yandex.ru/maps/?rtext=~{},{}&rtt=bc",
            self.latitude, self.longitude
        ))
    }
}

/// Photo attached to a new or edited marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StationPhoto {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Contents of the add/edit marker form.
#[derive(Debug, Clone, PartialEq)]
pub struct StationDraft {
    pub latitude: f64,
    pub longitude: f64,
    pub marker_type: MarkerType,
    /// Only meaningful for [`MarkerType::Charging`]
    pub is_24_hours: bool,
    pub comment: String,
    pub photo: Option<StationPhoto>,
    pub added_by: Option<AddedBy>,
}

impl StationDraft {
    /// Empty draft at a map position, with the form's defaults.
    pub fn at(point: GpsPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            marker_type: MarkerType::Charging,
            is_24_hours: false,
            comment: String::new(),
            photo: None,
            added_by: None,
        }
    }

    /// Draft pre-filled from an existing marker, for editing.
    pub fn from_station(station: &Station) -> Self {
        Self {
            latitude: station.latitude,
            longitude: station.longitude,
            marker_type: station.marker_type,
            is_24_hours: station.is_24_hours,
            comment: station.comment.clone().unwrap_or_default(),
            photo: None,
            added_by: Some(station.added_by.clone()),
        }
    }

    /// Text fields of the multipart form, photo excluded.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("markerType", self.marker_type.as_str().to_string()),
            (
                "is24Hours",
                (self.is_24_hours && self.marker_type == MarkerType::Charging).to_string(),
            ),
            ("comment", self.comment.trim().to_string()),
        ];
        if let Some(author) = &self.added_by {
            // Serializing plain strings and integers cannot fail
            if let Ok(json) = serde_json::to_string(author) {
                fields.push(("addedBy", json));
            }
        }
        fields
    }
}

// =============================================================================
// Likes
// =============================================================================

/// Response of `GET /charging-stations/{id}/like-status/{userId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LikeStatus {
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub disliked: bool,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
}

impl LikeStatus {
    /// Likes minus dislikes.
    pub fn score(&self) -> i64 {
        i64::from(self.likes) - i64::from(self.dislikes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Dislike,
}

impl LikeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeAction::Like => "like",
            LikeAction::Dislike => "dislike",
        }
    }
}

// =============================================================================
// Filtering
// =============================================================================

fn enabled() -> bool {
    true
}

/// Which marker types are shown. Everything is shown by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerFilter {
    #[serde(default = "enabled")]
    pub charging: bool,
    #[serde(default = "enabled")]
    pub charging_auto: bool,
    #[serde(default = "enabled")]
    pub interesting: bool,
    #[serde(default = "enabled")]
    pub danger: bool,
    #[serde(default = "enabled")]
    pub chat: bool,
}

impl Default for MarkerFilter {
    fn default() -> Self {
        Self {
            charging: true,
            charging_auto: true,
            interesting: true,
            danger: true,
            chat: true,
        }
    }
}

impl MarkerFilter {
    fn slot(&mut self, marker_type: MarkerType) -> &mut bool {
        match marker_type {
            MarkerType::Charging => &mut self.charging,
            MarkerType::ChargingAuto => &mut self.charging_auto,
            MarkerType::Interesting => &mut self.interesting,
            MarkerType::Danger => &mut self.danger,
            MarkerType::Chat => &mut self.chat,
        }
    }

    pub fn allows(&self, marker_type: MarkerType) -> bool {
        match marker_type {
            MarkerType::Charging => self.charging,
            MarkerType::ChargingAuto => self.charging_auto,
            MarkerType::Interesting => self.interesting,
            MarkerType::Danger => self.danger,
            MarkerType::Chat => self.chat,
        }
    }

    pub fn toggle(&mut self, marker_type: MarkerType) {
        let slot = self.slot(marker_type);
        *slot = !*slot;
    }

    pub fn set(&mut self, marker_type: MarkerType, shown: bool) {
        *self.slot(marker_type) = shown;
    }

    pub fn apply<'a>(&self, stations: &'a [Station]) -> Vec<&'a Station> {
        stations.iter().filter(|s| self.allows(s.marker_type)).collect()
    }
}

// =============================================================================
// Spatial index
// =============================================================================

/// A station position with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedStation {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedStation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedStation {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Stations indexed by position for viewport and nearest-marker queries.
pub struct StationIndex {
    stations: Vec<Station>,
    tree: RTree<IndexedStation>,
}

impl StationIndex {
    pub fn new(stations: Vec<Station>) -> Self {
        let indexed: Vec<IndexedStation> = stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.point().is_valid())
            .map(|(idx, s)| IndexedStation {
                idx,
                lat: s.latitude,
                lng: s.longitude,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
            stations,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Stations inside `bounds` that pass `filter`, in original list order.
    pub fn in_bounds(&self, bounds: &Bounds, filter: &MarkerFilter) -> Vec<&Station> {
        let envelope = AABB::from_corners(
            [bounds.min_lat, bounds.min_lng],
            [bounds.max_lat, bounds.max_lng],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|s| s.idx)
            .collect();
        hits.sort_unstable();
        hits.into_iter()
            .map(|i| &self.stations[i])
            .filter(|s| filter.allows(s.marker_type))
            .collect()
    }

    /// Closest station to `point` with its great-circle distance in meters.
    ///
    /// Candidates are ranked in degree space, which is close enough at
    /// city scale.
    pub fn nearest(&self, point: &GpsPoint) -> Option<(&Station, f64)> {
        let found = self.tree.nearest_neighbor(&[point.latitude, point.longitude])?;
        let station = &self.stations[found.idx];
        Some((station, haversine_distance(point, &station.point())))
    }
}
