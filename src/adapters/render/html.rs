use super::{format_tick, ChartKind, ChartSpec, Frame, CHART_HEIGHT, CHART_WIDTH};
use htmlescape::encode_minimal;
use std::fmt::Write;

const SERIES_COLOR: &str = "#3b6fd8";

/// 自包含的互動式圖表：SVG + 滑鼠提示，不依賴外部腳本
pub fn render_chart(spec: &ChartSpec) -> String {
    let frame = Frame::for_spec(spec);
    let title = encode_minimal(&spec.title);
    let mut svg = String::new();

    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" role="img" aria-label="{title}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT,
        title = title
    );
    svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);

    // 格線與 y 軸刻度
    for tick in frame.y_ticks(5) {
        let y = frame.py(tick);
        let _ = write!(
            svg,
            r##"<line x1="{x1:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="#e5e5e5"/><text x="{tx:.1}" y="{ty:.1}" font-size="11" text-anchor="end" fill="#555">{label}</text>"##,
            x1 = frame.plot_left(),
            x2 = frame.plot_right(),
            y = y,
            tx = frame.plot_left() - 6.0,
            ty = y + 4.0,
            label = format_tick(tick)
        );
    }

    let _ = write!(
        svg,
        r##"<line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}" stroke="#333"/><line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="#333"/>"##,
        l = frame.plot_left(),
        r = frame.plot_right(),
        t = frame.plot_top(),
        b = frame.plot_bottom()
    );

    match spec.kind {
        ChartKind::Bar => {
            let width = frame.bar_width();
            for point in &spec.points {
                let x = frame.px(point.x) - width / 2.0;
                let top = frame.py(point.y).min(frame.baseline());
                let height = (frame.py(point.y) - frame.baseline()).abs();
                let _ = write!(
                    svg,
                    r#"<rect class="mark" x="{x:.1}" y="{top:.1}" width="{width:.1}" height="{height:.1}" fill="{color}"><title>{tip}</title></rect>"#,
                    color = SERIES_COLOR,
                    tip = tooltip(&point.label, point.y)
                );
            }
        }
        ChartKind::Line | ChartKind::Scatter => {
            if spec.kind == ChartKind::Line && spec.points.len() > 1 {
                let path: Vec<String> = spec
                    .points
                    .iter()
                    .map(|p| format!("{:.1},{:.1}", frame.px(p.x), frame.py(p.y)))
                    .collect();
                let _ = write!(
                    svg,
                    r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                    path.join(" "),
                    SERIES_COLOR
                );
            }
            for point in &spec.points {
                let _ = write!(
                    svg,
                    r#"<circle class="mark" cx="{:.1}" cy="{:.1}" r="4" fill="{}"><title>{}</title></circle>"#,
                    frame.px(point.x),
                    frame.py(point.y),
                    SERIES_COLOR,
                    tooltip(&point.label, point.y)
                );
            }
        }
    }

    // x 軸標籤，點太多時抽樣
    let stride = (spec.points.len() / 10).max(1);
    for point in spec.points.iter().step_by(stride) {
        let label: String = point.label.chars().take(14).collect();
        let _ = write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle" fill="#555">{}</text>"##,
            frame.px(point.x),
            frame.plot_bottom() + 16.0,
            encode_minimal(&label)
        );
    }
    svg.push_str("</svg>");

    let mut rows = String::new();
    for point in &spec.points {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td></tr>",
            encode_minimal(&point.label),
            point.y
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 24px; color: #222; }}
.mark {{ cursor: pointer; }}
.mark:hover {{ fill: #f28e2b; }}
table {{ border-collapse: collapse; font-size: 12px; }}
td {{ border: 1px solid #ddd; padding: 2px 8px; }}
</style>
</head>
<body>
<h2>{title}</h2>
{svg}
<details>
<summary>Data ({count} points)</summary>
<table>{rows}</table>
</details>
</body>
</html>
"#,
        title = title,
        svg = svg,
        count = spec.points.len(),
        rows = rows
    )
}

fn tooltip(label: &str, value: f64) -> String {
    encode_minimal(&format!("{}: {}", label, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::render::ChartPoint;

    #[test]
    fn test_render_bar_chart_escapes_labels() {
        let spec = ChartSpec {
            kind: ChartKind::Bar,
            title: "Volume <USDC/WETH>".to_string(),
            points: vec![
                ChartPoint {
                    label: "USDC".to_string(),
                    x: 0.0,
                    y: 10.0,
                },
                ChartPoint {
                    label: "W&ETH".to_string(),
                    x: 1.0,
                    y: 20.0,
                },
            ],
        };

        let html = render_chart(&spec);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Volume &lt;USDC/WETH&gt;"));
        assert!(html.contains("W&amp;ETH: 20"));
        assert_eq!(html.matches("<rect class=\"mark\"").count(), 2);
    }

    #[test]
    fn test_render_line_chart_has_polyline() {
        let spec = ChartSpec {
            kind: ChartKind::Line,
            title: "TVL".to_string(),
            points: (0..3)
                .map(|i| ChartPoint {
                    label: i.to_string(),
                    x: i as f64,
                    y: (i * i) as f64,
                })
                .collect(),
        };

        let html = render_chart(&spec);
        assert!(html.contains("<polyline"));
        assert_eq!(html.matches("<circle").count(), 3);
    }
}
