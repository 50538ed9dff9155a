//! Log-scale projection of throughput history onto plot coordinates.
//!
//! Byte rates span many orders of magnitude, so the value axis is base-10
//! logarithmic with a floor of 1.0 to keep `log(0)` out of the math. The
//! time axis is index-based: series positions are assumed evenly spaced at
//! the sampling interval. The projected frame keeps every plotted point so
//! hover/inspection can run a nearest-point query against screen
//! coordinates without re-projecting.

use crate::history::HistoryStore;
use crate::snapshot::ProcessKey;

/// Floor for plotted values; everything below clamps up to this.
pub const MIN_VALUE: f64 = 1.0;

/// Headroom multiplier applied above the largest visible value.
const HEADROOM: f64 = 1.1;

/// Golden ratio conjugate; successive hues step by this for maximal spread.
const GOLDEN_RATIO_STEP: f64 = 0.618033988749895;

const PALETTE_SATURATION: f64 = 0.65;
const PALETTE_VALUE: f64 = 0.95;

/// Which direction a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Plot rectangle in screen pixels, top-down y.
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for PlotArea {
    fn default() -> Self {
        // Geometry of the reference canvas: 80/20 side margins inside 800x300
        Self {
            left: 80.0,
            top: 20.0,
            width: 700.0,
            height: 250.0,
        }
    }
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One plotted sample, retained for nearest-point queries.
#[derive(Debug, Clone)]
pub struct PlotPoint {
    pub key: ProcessKey,
    pub direction: Direction,
    /// Index within the series (0 = oldest in window).
    pub index: usize,
    /// The raw (unclamped) sample value in bytes/sec.
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

/// A drawable per-process, per-direction line.
#[derive(Debug, Clone)]
pub struct Polyline {
    pub key: ProcessKey,
    pub direction: Direction,
    pub color: Rgb,
    pub points: Vec<(f64, f64)>,
}

/// The projected frame handed to the renderer.
#[derive(Debug, Clone)]
pub struct PlotFrame {
    pub area: PlotArea,
    /// Scale ceiling after headroom.
    pub max_value: f64,
    pub polylines: Vec<Polyline>,
    points: Vec<PlotPoint>,
    log_min: f64,
    log_max: f64,
}

/// Deterministic per-process color: golden-ratio hue stepping at fixed
/// saturation/value. Equal process ordering yields equal colors across runs.
pub fn color_for_index(index: usize) -> Rgb {
    let hue = (index as f64 * GOLDEN_RATIO_STEP).fract();
    hsv_to_rgb(hue, PALETTE_SATURATION, PALETTE_VALUE)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb {
        r: (r * 255.0).round() as u8,
        g: (g * 255.0).round() as u8,
        b: (b * 255.0).round() as u8,
    }
}

fn clamp_value(value: f64) -> f64 {
    value.max(MIN_VALUE)
}

/// Projects every series in the history onto `area`.
///
/// Keys are iterated in sorted (name, pid) order so color assignment and
/// point encounter order are stable for a given process population.
pub fn project(history: &HistoryStore, area: PlotArea) -> PlotFrame {
    let mut keys: Vec<&ProcessKey> = history.iter().map(|(key, _)| key).collect();
    keys.sort();

    let raw_max = history
        .iter()
        .flat_map(|(_, pair)| pair.download().iter().chain(pair.upload().iter()))
        .fold(MIN_VALUE, |acc, v| acc.max(*v));
    let max_value = raw_max * HEADROOM;

    let log_min = MIN_VALUE.log10();
    let log_max = max_value.log10();

    let mut frame = PlotFrame {
        area,
        max_value,
        polylines: Vec::new(),
        points: Vec::new(),
        log_min,
        log_max,
    };

    for (index, key) in keys.iter().enumerate() {
        let Some((download, upload)) = history.windowed(key) else {
            continue;
        };
        let color = color_for_index(index);

        for (direction, series) in [(Direction::Download, download), (Direction::Upload, upload)] {
            let polyline = project_series(&mut frame, key, direction, color, &series);
            frame.polylines.push(polyline);
        }
    }

    frame
}

fn project_series(
    frame: &mut PlotFrame,
    key: &ProcessKey,
    direction: Direction,
    color: Rgb,
    series: &[f64],
) -> Polyline {
    let area = frame.area;
    let x_step = area.width / (series.len().saturating_sub(1)).max(1) as f64;
    let mut points = Vec::with_capacity(series.len());

    for (i, &value) in series.iter().enumerate() {
        let x = area.left + i as f64 * x_step;
        let y = frame.value_to_y(value);
        points.push((x, y));
        frame.points.push(PlotPoint {
            key: key.clone(),
            direction,
            index: i,
            value,
            x,
            y,
        });
    }

    Polyline {
        key: key.clone(),
        direction,
        color,
        points,
    }
}

impl PlotFrame {
    fn log_range(&self) -> f64 {
        self.log_max - self.log_min
    }

    /// Vertical pixel position of a value under the log scale (top-down y).
    pub fn value_to_y(&self, value: f64) -> f64 {
        let normalized = (clamp_value(value).log10() - self.log_min) / self.log_range();
        self.area.top + self.area.height - normalized * self.area.height
    }

    /// Inverse of [`value_to_y`](Self::value_to_y), in log10 units.
    fn y_to_log_value(&self, y: f64) -> f64 {
        let normalized = (self.area.top + self.area.height - y) / self.area.height;
        self.log_min + normalized * self.log_range()
    }

    pub fn points(&self) -> &[PlotPoint] {
        &self.points
    }

    /// Finds the plotted point closest to the given screen coordinates.
    ///
    /// Distance is `dx² + dy_log²` where the log-value distance is rescaled
    /// by `height / log_range` so both terms share pixel units. Ties go to
    /// the first-encountered point.
    pub fn nearest_point(&self, x: f64, y: f64) -> Option<&PlotPoint> {
        let cursor_log = self.y_to_log_value(y);
        let log_scale = self.area.height / self.log_range();

        let mut best: Option<(&PlotPoint, f64)> = None;
        for point in &self.points {
            let dx = point.x - x;
            let dy_log = (clamp_value(point.value).log10() - cursor_log) * log_scale;
            let dist = dx * dx + dy_log * dy_log;

            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((point, dist)),
            }
        }

        best.map(|(point, _)| point)
    }
}
