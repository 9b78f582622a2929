//! Heatmap data model: wire types, navigation bounds, gradient and overlay

use fxhash::FxHashMap;
use serde::Deserialize;
use std::fmt;

/// Heatmap category requested from the server
pub const HEATMAP_TYPE: &str = "loyalist";

/// Render radius of every overlay, in degrees (non-dissipating)
pub const OVERLAY_RADIUS: f64 = 3.0;

/// One weighted point as returned by the heatmap endpoint
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HeatmapPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    pub weight: f64,
}

/// Body of `GET /airlines/{id}/heatmap-data`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResponse {
    #[serde(default)]
    pub points: Vec<HeatmapPoint>,
    pub max_intensity: f64,
    /// Lowest cycle offset for which the server still has data
    pub min_delta_count: i64,
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavDirection {
    Back10,
    Back1,
    Forward1,
    Forward10,
}

impl NavDirection {
    /// Buttons in the order they are drawn, left to right
    pub const ALL: [NavDirection; 4] = [
        NavDirection::Back10,
        NavDirection::Back1,
        NavDirection::Forward1,
        NavDirection::Forward10,
    ];

    #[inline]
    pub const fn delta(self) -> i64 {
        match self {
            NavDirection::Back10 => -10,
            NavDirection::Back1 => -1,
            NavDirection::Forward1 => 1,
            NavDirection::Forward10 => 10,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            NavDirection::Back10 => "«",
            NavDirection::Back1 => "‹",
            NavDirection::Forward1 => "›",
            NavDirection::Forward10 => "»",
        }
    }
}

/// Which of the four navigation controls are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavState {
    pub back1: bool,
    pub back10: bool,
    pub forward1: bool,
    pub forward10: bool,
}

impl NavState {
    pub const DISABLED: Self = Self {
        back1: false,
        back10: false,
        forward1: false,
        forward10: false,
    };

    /// Offsets decrease going further back; `min_delta_count` is the oldest
    /// offset with data and 0 is now.
    pub const fn compute(cycle_offset: i64, min_delta_count: i64) -> Self {
        Self {
            back1: cycle_offset > min_delta_count,
            back10: cycle_offset - 10 >= min_delta_count,
            forward1: cycle_offset < 0,
            forward10: cycle_offset + 10 <= 0,
        }
    }

    #[inline]
    pub const fn allows(&self, direction: NavDirection) -> bool {
        match direction {
            NavDirection::Back10 => self.back10,
            NavDirection::Back1 => self.back1,
            NavDirection::Forward1 => self.forward1,
            NavDirection::Forward10 => self.forward10,
        }
    }
}

/// Human-readable label for an offset, as shown in the control panel
#[inline]
pub const fn cycle_label(cycle_offset: i64) -> i64 {
    cycle_offset * -10
}

// ---------------------------------------------------------------------------
// Gradient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Alpha-composite over an opaque background
    pub fn blend_over(&self, bg: (u8, u8, u8)) -> (u8, u8, u8) {
        let a = self.a.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| -> u8 {
            (fg as f32 * a + bg as f32 * (1.0 - a)).round() as u8
        };
        (mix(self.r, bg.0), mix(self.g, bg.1), mix(self.b, bg.2))
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Weight-to-color stops: transparent blue-violet through white to amber
pub const HEATMAP_GRADIENT: [Rgba; 21] = [
    Rgba::new(128, 133, 242, 0.0),
    Rgba::new(141, 145, 243, 0.7),
    Rgba::new(154, 157, 244, 0.7),
    Rgba::new(167, 169, 245, 0.7),
    Rgba::new(180, 181, 246, 0.7),
    Rgba::new(193, 193, 247, 0.7),
    Rgba::new(206, 205, 248, 0.7),
    Rgba::new(219, 217, 249, 0.7),
    Rgba::new(232, 229, 250, 0.7),
    Rgba::new(245, 241, 251, 0.7),
    Rgba::new(255, 255, 255, 1.0),
    Rgba::new(255, 253, 235, 1.0),
    Rgba::new(255, 251, 215, 1.0),
    Rgba::new(255, 249, 195, 1.0),
    Rgba::new(255, 247, 175, 1.0),
    Rgba::new(255, 245, 155, 1.0),
    Rgba::new(255, 243, 135, 1.0),
    Rgba::new(255, 241, 115, 1.0),
    Rgba::new(255, 239, 95, 1.0),
    Rgba::new(255, 238, 75, 1.0),
    Rgba::new(255, 237, 52, 1.0),
];

/// Index into `gradient` for a weight relative to `max_intensity`
pub fn gradient_index(weight: f64, max_intensity: f64, gradient: &[Rgba]) -> usize {
    if gradient.is_empty() || max_intensity <= 0.0 || !weight.is_finite() {
        return 0;
    }
    let t = (weight / max_intensity).clamp(0.0, 1.0);
    let last = (gradient.len() - 1) as f64;
    (t * last).round() as usize
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedLocation {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

/// Summed weight of all locations falling into one grid cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatCell {
    /// Cell center
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

/// A weighted heatmap layer, ready to attach to a map widget
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapOverlay {
    pub locations: Vec<WeightedLocation>,
    pub max_intensity: f64,
    pub radius: f64,
    pub dissipating: bool,
    pub gradient: &'static [Rgba],
}

impl HeatmapOverlay {
    pub fn from_response(response: &HeatmapResponse) -> Self {
        let locations = response
            .points
            .iter()
            .map(|p| WeightedLocation {
                lat: p.latitude,
                lng: p.longitude,
                weight: p.weight,
            })
            .collect();

        let mut overlay = Self {
            locations,
            max_intensity: response.max_intensity,
            radius: OVERLAY_RADIUS,
            dissipating: false,
            gradient: &HEATMAP_GRADIENT,
        };
        // No usable server maximum: scale to the hottest cell instead
        if !(overlay.max_intensity > 0.0 && overlay.max_intensity.is_finite()) {
            overlay.max_intensity = overlay
                .cells()
                .iter()
                .map(|c| c.weight)
                .fold(0.0, f64::max);
        }
        overlay
    }

    /// Accumulate weights on a lat/lng grid whose cell edge is `radius`
    /// degrees. Output is sorted by (lat, lng) so rendering is stable.
    pub fn cells(&self) -> Vec<HeatCell> {
        let size = if self.radius > 0.0 { self.radius } else { OVERLAY_RADIUS };
        let mut grid: FxHashMap<(i64, i64), f64> = FxHashMap::default();

        for loc in &self.locations {
            if !loc.lat.is_finite() || !loc.lng.is_finite() {
                continue;
            }
            let key = (
                (loc.lat / size).floor() as i64,
                (loc.lng / size).floor() as i64,
            );
            *grid.entry(key).or_insert(0.0) += loc.weight;
        }

        let mut cells: Vec<HeatCell> = grid
            .into_iter()
            .map(|((row, col), weight)| HeatCell {
                lat: (row as f64 + 0.5) * size,
                lng: (col as f64 + 0.5) * size,
                weight,
            })
            .collect();
        cells.sort_unstable_by(|a, b| {
            a.lat
                .total_cmp(&b.lat)
                .then_with(|| a.lng.total_cmp(&b.lng))
        });
        cells
    }

    /// Gradient stop for a cell, `None` when it maps to a transparent stop
    pub fn color_for(&self, weight: f64) -> Option<Rgba> {
        let stop = *self
            .gradient
            .get(gradient_index(weight, self.max_intensity, self.gradient))?;
        (!stop.is_transparent()).then_some(stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_state_at_now_with_history() {
        let nav = NavState::compute(0, -30);
        assert!(nav.back1);
        assert!(nav.back10);
        assert!(!nav.forward1);
        assert!(!nav.forward10);
        assert_eq!(cycle_label(0), 0);
    }

    #[test]
    fn test_nav_state_at_oldest_offset() {
        let nav = NavState::compute(-30, -30);
        assert!(!nav.back1);
        assert!(!nav.back10);
        assert!(nav.forward1);
        assert!(nav.forward10);
        assert_eq!(cycle_label(-30), 300);
    }

    #[test]
    fn test_nav_state_formulas_hold_over_range() {
        for min_delta in -40..=0 {
            for offset in -45..=0 {
                let nav = NavState::compute(offset, min_delta);
                assert_eq!(nav.forward1, offset < 0);
                assert_eq!(nav.forward10, offset + 10 <= 0);
                assert_eq!(nav.back1, offset > min_delta);
                assert_eq!(nav.back10, offset - 10 >= min_delta);
            }
        }
    }

    #[test]
    fn test_nav_state_allows_matches_flags() {
        let nav = NavState::compute(-5, -12);
        assert!(nav.allows(NavDirection::Back1));
        assert!(!nav.allows(NavDirection::Back10));
        assert!(nav.allows(NavDirection::Forward1));
        assert!(!nav.allows(NavDirection::Forward10));
        assert!(NavDirection::ALL
            .iter()
            .all(|d| !NavState::DISABLED.allows(*d)));
    }

    #[test]
    fn test_gradient_stops() {
        assert_eq!(HEATMAP_GRADIENT.len(), 21);
        assert_eq!(HEATMAP_GRADIENT[0].to_string(), "rgba(128, 133, 242, 0)");
        assert_eq!(HEATMAP_GRADIENT[1].to_string(), "rgba(141, 145, 243, 0.7)");
        assert_eq!(HEATMAP_GRADIENT[10].to_string(), "rgba(255, 255, 255, 1)");
        assert_eq!(HEATMAP_GRADIENT[20].to_string(), "rgba(255, 237, 52, 1)");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "points": [{"lat": 51.47, "lng": -0.45, "weight": 12.5}],
            "maxIntensity": 40.0,
            "minDeltaCount": -30
        }"#;
        let resp: HeatmapResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.points.len(), 1);
        assert_eq!(resp.points[0].latitude, 51.47);
        assert_eq!(resp.points[0].longitude, -0.45);
        assert_eq!(resp.max_intensity, 40.0);
        assert_eq!(resp.min_delta_count, -30);
    }

    #[test]
    fn test_empty_points_build_empty_overlay() {
        let resp: HeatmapResponse =
            serde_json::from_str(r#"{"points": [], "maxIntensity": 0, "minDeltaCount": 0}"#)
                .unwrap();
        let overlay = HeatmapOverlay::from_response(&resp);
        assert!(overlay.locations.is_empty());
        assert!(overlay.cells().is_empty());
        assert!(!overlay.dissipating);
        assert_eq!(overlay.radius, OVERLAY_RADIUS);
        assert_eq!(overlay.gradient.len(), 21);
    }

    #[test]
    fn test_cells_sum_weights_in_same_cell() {
        let resp = HeatmapResponse {
            points: vec![
                HeatmapPoint { latitude: 1.0, longitude: 1.0, weight: 2.0 },
                HeatmapPoint { latitude: 2.0, longitude: 2.5, weight: 3.0 },
                HeatmapPoint { latitude: -40.0, longitude: 100.0, weight: 1.0 },
            ],
            max_intensity: 5.0,
            min_delta_count: 0,
        };
        let cells = HeatmapOverlay::from_response(&resp).cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].weight, 1.0);
        assert_eq!(cells[1].weight, 5.0);
        assert_eq!(cells[1].lat, 1.5);
        assert_eq!(cells[1].lng, 1.5);
    }

    #[test]
    fn test_color_for_weight() {
        let resp = HeatmapResponse {
            points: vec![],
            max_intensity: 10.0,
            min_delta_count: 0,
        };
        let overlay = HeatmapOverlay::from_response(&resp);
        assert_eq!(overlay.color_for(0.0), None);
        assert_eq!(overlay.color_for(10.0), Some(HEATMAP_GRADIENT[20]));
        assert_eq!(overlay.color_for(100.0), Some(HEATMAP_GRADIENT[20]));
        assert_eq!(overlay.color_for(5.0), Some(HEATMAP_GRADIENT[10]));
    }

    #[test]
    fn test_zero_max_intensity_scales_to_hottest_cell() {
        let resp: HeatmapResponse = serde_json::from_str(
            r#"{
                "points": [
                    {"lat": 10.0, "lng": 10.0, "weight": 2.0},
                    {"lat": 10.5, "lng": 10.5, "weight": 4.0},
                    {"lat": -30.0, "lng": 60.0, "weight": 3.0}
                ],
                "maxIntensity": 0,
                "minDeltaCount": 0
            }"#,
        )
        .unwrap();
        let overlay = HeatmapOverlay::from_response(&resp);
        assert_eq!(overlay.max_intensity, 6.0);
        assert_eq!(overlay.color_for(6.0), Some(HEATMAP_GRADIENT[20]));
        assert_eq!(overlay.color_for(3.0), Some(HEATMAP_GRADIENT[10]));
    }

    #[test]
    fn test_blend_over_background() {
        let opaque = Rgba::new(255, 237, 52, 1.0);
        assert_eq!(opaque.blend_over((0, 0, 0)), (255, 237, 52));
        let clear = Rgba::new(200, 200, 200, 0.0);
        assert_eq!(clear.blend_over((10, 20, 30)), (10, 20, 30));
    }
}
