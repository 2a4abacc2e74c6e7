//! Ride heatmaps.
//!
//! Resolves the period picker to the monthly/yearly heatmap endpoints and
//! shapes the returned weighted points for rendering:
//! - normalized `[lat, lng, weight]` triples for a heat layer
//! - a sparse grid of summed intensity for zoomed-out views

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Period picker value of the heatmap view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapPeriod {
    #[default]
    ThisMonth,
    LastMonth,
    ThisYear,
}

/// A concrete heatmap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapQuery {
    Monthly { year: i32, month: u32 },
    Yearly { year: i32 },
}

impl HeatmapQuery {
    /// Resolve a period relative to `today`. `LastMonth` in January is
    /// December of the previous year.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use route_viewer::heatmap::{HeatmapPeriod, HeatmapQuery};
    ///
    /// let jan = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    /// let query = HeatmapQuery::resolve(HeatmapPeriod::LastMonth, jan);
    /// assert_eq!(query.path(), "monthly-heatmap/2024/12");
    /// ```
    pub fn resolve(period: HeatmapPeriod, today: NaiveDate) -> Self {
        let year = today.year();
        let month = today.month();
        match period {
            HeatmapPeriod::ThisMonth => HeatmapQuery::Monthly { year, month },
            HeatmapPeriod::LastMonth if month == 1 => HeatmapQuery::Monthly {
                year: year - 1,
                month: 12,
            },
            HeatmapPeriod::LastMonth => HeatmapQuery::Monthly {
                year,
                month: month - 1,
            },
            HeatmapPeriod::ThisYear => HeatmapQuery::Yearly { year },
        }
    }

    /// Endpoint path relative to the API root.
    pub fn path(&self) -> String {
        match self {
            HeatmapQuery::Monthly { year, month } => format!("monthly-heatmap/{}/{}", year, month),
            HeatmapQuery::Yearly { year } => format!("yearly-heatmap/{}", year),
        }
    }
}

fn unit_intensity() -> f64 {
    1.0
}

/// One weighted point of a heatmap response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "unit_intensity")]
    pub intensity: f64,
}

/// Heat layer rendering options.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapLayerConfig {
    /// Point radius in pixels. Default: 5
    pub radius: u32,
    /// Blur in pixels. Default: 2
    pub blur: u32,
    /// Intensity mapped to full color. Default: 1.0
    pub max: f64,
    /// Gradient stops (position, color)
    pub gradient: Vec<(f64, String)>,
}

impl Default for HeatmapLayerConfig {
    fn default() -> Self {
        Self {
            radius: 5,
            blur: 2,
            max: 1.0,
            gradient: vec![
                (0.3, "blue".to_string()),
                (0.6, "yellow".to_string()),
                (0.8, "red".to_string()),
            ],
        }
    }
}

/// `[lat, lng, weight]` triples with weight clamped to `[0, max]` and scaled to `[0, 1]`.
///
/// Points with invalid coordinates are dropped.
pub fn normalize(points: &[HeatmapPoint], config: &HeatmapLayerConfig) -> Vec<[f64; 3]> {
    let max = if config.max > 0.0 { config.max } else { 1.0 };
    points
        .iter()
        .filter(|p| crate::GpsPoint::new(p.latitude, p.longitude).is_valid())
        .map(|p| {
            let weight = if p.intensity.is_finite() {
                p.intensity.clamp(0.0, max) / max
            } else {
                0.0
            };
            [p.latitude, p.longitude, weight]
        })
        .collect()
}

// =============================================================================
// Grid binning
// =============================================================================

/// A single cell in the binned heatmap
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapCell {
    pub row: i32,
    pub col: i32,
    /// Cell center for rendering
    pub center_lat: f64,
    pub center_lng: f64,
    /// Summed intensity of all points in the cell
    pub intensity: f64,
    pub point_count: u32,
    /// Intensity relative to the hottest cell (0.0-1.0)
    pub density: f32,
}

/// Sparse grid of non-empty cells, sorted by row then column.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    pub cells: Vec<HeatmapCell>,
    pub cell_size_meters: f64,
    pub max_intensity: f64,
}

#[derive(Debug, Default)]
struct CellBuilder {
    intensity: f64,
    point_count: u32,
}

type CellCoord = (i32, i32);

const METERS_PER_DEGREE: f64 = 111_320.0;

struct GridProjection {
    cell_size_meters: f64,
    ref_lat: f64,
}

impl GridProjection {
    fn lng_meters_per_deg(&self) -> f64 {
        METERS_PER_DEGREE * self.ref_lat.to_radians().cos().max(0.01)
    }

    fn to_grid_coords(&self, lat: f64, lng: f64) -> CellCoord {
        let row = ((lat - self.ref_lat) * METERS_PER_DEGREE / self.cell_size_meters).floor() as i32;
        let col = (lng * self.lng_meters_per_deg() / self.cell_size_meters).floor() as i32;
        (row, col)
    }

    fn cell_center(&self, row: i32, col: i32) -> (f64, f64) {
        let center_lat = self.ref_lat + ((row as f64 + 0.5) * self.cell_size_meters / METERS_PER_DEGREE);
        let center_lng = (col as f64 + 0.5) * self.cell_size_meters / self.lng_meters_per_deg();
        (center_lat, center_lng)
    }
}

/// Aggregate points into square cells of roughly `cell_size_meters`.
///
/// The first valid point fixes the reference latitude of the projection.
pub fn bin_points(points: &[HeatmapPoint], cell_size_meters: f64) -> HeatmapGrid {
    let valid: Vec<&HeatmapPoint> = points
        .iter()
        .filter(|p| crate::GpsPoint::new(p.latitude, p.longitude).is_valid())
        .collect();

    let Some(first) = valid.first() else {
        return HeatmapGrid {
            cells: vec![],
            cell_size_meters,
            max_intensity: 0.0,
        };
    };

    let projection = GridProjection {
        cell_size_meters: cell_size_meters.max(1.0),
        ref_lat: first.latitude,
    };

    let mut builders: HashMap<CellCoord, CellBuilder> = HashMap::new();
    for p in &valid {
        let cell = builders
            .entry(projection.to_grid_coords(p.latitude, p.longitude))
            .or_default();
        cell.intensity += p.intensity.max(0.0);
        cell.point_count += 1;
    }

    let max_intensity = builders.values().map(|c| c.intensity).fold(0.0, f64::max);

    let mut cells: Vec<HeatmapCell> = builders
        .into_iter()
        .map(|((row, col), builder)| {
            let (center_lat, center_lng) = projection.cell_center(row, col);
            HeatmapCell {
                row,
                col,
                center_lat,
                center_lng,
                intensity: builder.intensity,
                point_count: builder.point_count,
                density: if max_intensity > 0.0 {
                    (builder.intensity / max_intensity) as f32
                } else {
                    0.0
                },
            }
        })
        .collect();
    cells.sort_by_key(|c| (c.row, c.col));

    HeatmapGrid {
        cells,
        cell_size_meters: projection.cell_size_meters,
        max_intensity,
    }
}
