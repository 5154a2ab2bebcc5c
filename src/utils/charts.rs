//! SVG Chart Generator
//!
//! Renders per-class signal profiles (mean line with a shaded standard
//! deviation band) as standalone SVG files.

use std::fs;
use std::path::Path;

const CHART_WIDTH: f64 = 1000.0;
const CHART_HEIGHT: f64 = 600.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 90.0;

const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// Series colors, cycled by class order
pub const SERIES_COLORS: [&str; 4] = ["#3498db", "#e74c3c", "#2ecc71", "#9b59b6"];

/// One curve with a symmetric uncertainty band
#[derive(Debug, Clone)]
pub struct BandSeries {
    pub name: String,
    pub x: Vec<f64>,
    pub mean: Vec<f64>,
    /// Half-width of the band at each x
    pub spread: Vec<f64>,
    pub color: String,
}

impl BandSeries {
    fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(self.mean.iter())
            .zip(self.spread.iter())
            .map(|((&x, &m), &s)| (x, m, s))
    }
}

/// Evenly spaced x positions over `[start, end]`
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Render band series to an SVG string
pub fn render_band_chart(title: &str, x_label: &str, y_label: &str, series: &[BandSeries]) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, y_min, y_max) = find_ranges(series);
    let sx = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_width;
    let sy = |y: f64| MARGIN_TOP + plot_height - (y - y_min) / (y_max - y_min) * plot_height;

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0, COLOR_TEXT, escape_xml(title)
    ));

    // Horizontal grid with value ticks
    for i in 0..=5 {
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);
        let y = sy(value);
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT, y, MARGIN_LEFT + plot_width, y, COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.4}</text>"#,
            MARGIN_LEFT - 10.0, y + 4.0, COLOR_TEXT, value
        ));
    }

    // Vertical grid with x ticks
    for i in 0..=10 {
        let value = x_min + (i as f64 / 10.0) * (x_max - x_min);
        let x = sx(value);
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            x, MARGIN_TOP, x, MARGIN_TOP + plot_height, COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
            x, MARGIN_TOP + plot_height + 20.0, COLOR_TEXT, value
        ));
    }

    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT, MARGIN_TOP + plot_height, MARGIN_LEFT + plot_width, MARGIN_TOP + plot_height, COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT, MARGIN_TOP, MARGIN_LEFT, MARGIN_TOP + plot_height, COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0, CHART_HEIGHT - 20.0, COLOR_TEXT, escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0, COLOR_TEXT, CHART_HEIGHT / 2.0, escape_xml(y_label)
    ));

    for band in series {
        let points: Vec<_> = band.points().collect();
        if points.is_empty() {
            continue;
        }

        // Band polygon: upper edge forward, lower edge backward
        let mut polygon = String::new();
        for (x, m, s) in &points {
            polygon.push_str(&format!("{:.2},{:.2} ", sx(*x), sy(m + s)));
        }
        for (x, m, s) in points.iter().rev() {
            polygon.push_str(&format!("{:.2},{:.2} ", sx(*x), sy(m - s)));
        }
        svg.push_str(&format!(
            r#"<polygon points="{}" fill="{}" fill-opacity="0.2" stroke="none"/>"#,
            polygon.trim_end(),
            band.color
        ));

        let mut path = String::new();
        for (i, (x, m, _)) in points.iter().enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            path.push_str(&format!("{} {:.2} {:.2}", cmd, sx(*x), sy(*m)));
        }
        svg.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path, band.color
        ));
    }

    let mut legend_y = MARGIN_TOP + 10.0;
    for band in series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 120.0, legend_y, band.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 100.0, legend_y + 12.0, COLOR_TEXT, escape_xml(&band.name)
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    svg
}

/// Render band series and write them to `output_path`
pub fn generate_band_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[BandSeries],
    output_path: &Path,
) -> std::io::Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, render_band_chart(title, x_label, y_label, series))
}

fn find_ranges(series: &[BandSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for band in series {
        for (x, m, s) in band.points() {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(m - s);
            y_max = y_max.max(m + s);
        }
    }

    if !x_min.is_finite() || !y_min.is_finite() {
        return (0.0, 1.0, 0.0, 1.0);
    }
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    if y_max <= y_min {
        let pad = y_min.abs().max(1.0) * 1e-3;
        y_min -= pad;
        y_max += pad;
    }
    (x_min, x_max, y_min, y_max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
