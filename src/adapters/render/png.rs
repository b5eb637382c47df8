use super::{format_tick, ChartKind, ChartSpec, Frame, CHART_HEIGHT, CHART_WIDTH};
use crate::utils::error::{AnalysisError, Result};
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::register_font;
use std::io::Cursor;
use std::sync::OnceLock;

const SERIES: RGBColor = RGBColor(59, 111, 216);
const GRID: RGBColor = RGBColor(229, 229, 229);
const AXIS: RGBColor = RGBColor(51, 51, 51);
const FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");
const MAX_LABEL_CHARS: usize = 14;

static FONT_READY: OnceLock<std::result::Result<(), String>> = OnceLock::new();

fn render_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::ExecutionError {
        stage: "chart".to_string(),
        message: format!("PNG rendering failed: {}", e),
    }
}

/// plotters 的 ab_glyph 後端不讀系統字型，要先註冊內嵌字型
fn ensure_font() -> Result<()> {
    FONT_READY
        .get_or_init(|| {
            register_font("sans-serif", FontStyle::Normal, FONT)
                .map_err(|_| "embedded font could not be loaded".to_string())
        })
        .clone()
        .map_err(render_error)
}

fn caption(spec: &ChartSpec) -> &str {
    match spec.title.trim() {
        "" => "Chart",
        title => title,
    }
}

/// x 不是原始數值時（長條圖、字串標籤）以資料點標籤當刻度
fn is_categorical(spec: &ChartSpec) -> bool {
    spec.kind == ChartKind::Bar
        || spec
            .points
            .iter()
            .any(|p| p.label.trim().parse::<f64>().ok() != Some(p.x))
}

fn x_tick_label(spec: &ChartSpec, categorical: bool, x: f64) -> String {
    if !categorical {
        return format_tick(x);
    }
    let Some(point) = spec.points.iter().find(|p| (p.x - x).abs() < 1e-6) else {
        return String::new();
    };
    if point.label.chars().count() > MAX_LABEL_CHARS {
        let short: String = point.label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{}...", short)
    } else {
        point.label.clone()
    }
}

/// 靜態圖：用 plotters 畫進記憶體緩衝區，再編碼成 PNG
pub fn render_chart(spec: &ChartSpec) -> Result<Vec<u8>> {
    if spec.points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(render_error("chart contains non-finite values"));
    }
    ensure_font()?;
    let frame = Frame::for_spec(spec);
    let (x_range, y_range) = (frame.x_range(), frame.y_range());
    let baseline = 0.0_f64.clamp(y_range.start, y_range.end);
    let categorical = is_categorical(spec);
    let mut buffer = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(caption(spec), ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(render_error)?;

        let x_labels = |x: &f64| x_tick_label(spec, categorical, *x);
        let y_labels = |y: &f64| format_tick(*y);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(GRID)
            .light_line_style(WHITE)
            .x_labels(spec.points.len().clamp(2, 12))
            .y_labels(6)
            .x_label_formatter(&x_labels)
            .y_label_formatter(&y_labels)
            .label_style(("sans-serif", 12, &AXIS))
            .draw()
            .map_err(render_error)?;

        match spec.kind {
            ChartKind::Bar => {
                chart
                    .draw_series(spec.points.iter().map(|p| {
                        Rectangle::new([(p.x - 0.4, p.y), (p.x + 0.4, baseline)], SERIES.filled())
                    }))
                    .map_err(render_error)?;
            }
            ChartKind::Line | ChartKind::Scatter => {
                if spec.kind == ChartKind::Line && spec.points.len() > 1 {
                    let path: Vec<(f64, f64)> = spec.points.iter().map(|p| (p.x, p.y)).collect();
                    chart
                        .draw_series(std::iter::once(PathElement::new(path, SERIES.stroke_width(2))))
                        .map_err(render_error)?;
                }
                chart
                    .draw_series(
                        spec.points
                            .iter()
                            .map(|p| Circle::new((p.x, p.y), 3, SERIES.filled())),
                    )
                    .map_err(render_error)?;
            }
        }

        root.present().map_err(render_error)?;
    }

    let image = RgbImage::from_raw(CHART_WIDTH, CHART_HEIGHT, buffer)
        .ok_or_else(|| render_error("pixel buffer has the wrong size"))?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(render_error)?;
    Ok(png.into_inner())
}
