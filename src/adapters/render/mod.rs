//! Chart and document renderers. Charts share one geometry so the
//! interactive and static versions of a chart line up.

pub mod html;
pub mod pdf;
pub mod png;

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const CHART_WIDTH: u32 = 800;
pub const CHART_HEIGHT: u32 = 450;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub points: Vec<ChartPoint>,
}

/// 資料座標到像素座標的映射
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    pub fn for_spec(spec: &ChartSpec) -> Self {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;

        for point in &spec.points {
            x_min = x_min.min(point.x);
            x_max = x_max.max(point.x);
            y_min = y_min.min(point.y);
            y_max = y_max.max(point.y);
        }

        if spec.points.is_empty() {
            (x_min, x_max, y_min, y_max) = (0.0, 1.0, 0.0, 1.0);
        }

        // 長條圖從 0 起算，並在兩側留半格
        if spec.kind == ChartKind::Bar {
            y_min = y_min.min(0.0);
            y_max = y_max.max(0.0);
            x_min -= 0.5;
            x_max += 0.5;
        }

        if (x_max - x_min).abs() < f64::EPSILON {
            x_min -= 1.0;
            x_max += 1.0;
        }
        if (y_max - y_min).abs() < f64::EPSILON {
            y_min -= 1.0;
            y_max += 1.0;
        }

        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn x_range(&self) -> Range<f64> {
        self.x_min..self.x_max
    }

    pub fn y_range(&self) -> Range<f64> {
        self.y_min..self.y_max
    }

    pub fn plot_left(&self) -> f64 {
        MARGIN_LEFT
    }

    pub fn plot_right(&self) -> f64 {
        CHART_WIDTH as f64 - MARGIN_RIGHT
    }

    pub fn plot_top(&self) -> f64 {
        MARGIN_TOP
    }

    pub fn plot_bottom(&self) -> f64 {
        CHART_HEIGHT as f64 - MARGIN_BOTTOM
    }

    pub fn px(&self, x: f64) -> f64 {
        let ratio = (x - self.x_min) / (self.x_max - self.x_min);
        self.plot_left() + ratio * (self.plot_right() - self.plot_left())
    }

    pub fn py(&self, y: f64) -> f64 {
        let ratio = (y - self.y_min) / (self.y_max - self.y_min);
        self.plot_bottom() - ratio * (self.plot_bottom() - self.plot_top())
    }

    /// 長條寬度（像素）
    pub fn bar_width(&self) -> f64 {
        let slots = (self.x_max - self.x_min).max(1.0);
        ((self.plot_right() - self.plot_left()) / slots * 0.8).max(1.0)
    }

    pub fn y_ticks(&self, count: usize) -> Vec<f64> {
        let step = (self.y_max - self.y_min) / count.max(1) as f64;
        (0..=count).map(|i| self.y_min + step * i as f64).collect()
    }

    pub fn baseline(&self) -> f64 {
        self.py(0.0_f64.clamp(self.y_min, self.y_max))
    }
}

/// 座標軸刻度的精簡數字格式
pub fn format_tick(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else if abs >= 1.0 || abs == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.4}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: ChartKind, ys: &[f64]) -> ChartSpec {
        ChartSpec {
            kind,
            title: "t".to_string(),
            points: ys
                .iter()
                .enumerate()
                .map(|(i, y)| ChartPoint {
                    label: i.to_string(),
                    x: i as f64,
                    y: *y,
                })
                .collect(),
        }
    }

    #[test]
    fn test_frame_maps_extremes_to_plot_edges() {
        let frame = Frame::for_spec(&spec(ChartKind::Line, &[10.0, 20.0, 30.0]));
        assert_eq!(frame.px(0.0), frame.plot_left());
        assert_eq!(frame.px(2.0), frame.plot_right());
        assert_eq!(frame.py(10.0), frame.plot_bottom());
        assert_eq!(frame.py(30.0), frame.plot_top());
    }

    #[test]
    fn test_bar_frame_includes_zero() {
        let frame = Frame::for_spec(&spec(ChartKind::Bar, &[5.0, 7.0]));
        assert_eq!(frame.baseline(), frame.plot_bottom());
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(2_500_000.0), "2.5M");
        assert_eq!(format_tick(12.0), "12.0");
        assert_eq!(format_tick(0.00123), "0.0012");
    }
}
