//! Flow/volume chart rendering
//!
//! Rasterizes a measurement series into a PNG with flow on the left axis,
//! volume on an independent right axis and the maximum-flow point marked.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use tracing::{debug, warn};

use super::error::{ReportError, ReportResult};
use crate::models::MeasurementSample;

// ============================================================================
// Constants
// ============================================================================

/// Native raster size of the chart image
pub const CHART_WIDTH: u32 = 600;
pub const CHART_HEIGHT: u32 = 400;

/// Padding added past the flow time on the x axis
const TIME_AXIS_PADDING: f64 = 10.0;

/// Upper limit on ticks per axis; the step widens tenfold until it fits
const MAX_TICKS: usize = 50;

const COLOR_FLOW: (u8, u8, u8) = (0, 128, 0);       // Green
const COLOR_VOLUME: (u8, u8, u8) = (0, 0, 255);     // Blue
const COLOR_MARKER: (u8, u8, u8) = (255, 0, 0);     // Red
const COLOR_GRID: (u8, u8, u8) = (220, 220, 220);

// ============================================================================
// Types
// ============================================================================

/// A sample after numeric interpretation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub time: f64,
    pub flow: f64,
    pub volume: f64,
}

/// The highlighted maximum-flow sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxFlowPoint {
    pub time: f64,
    pub flow: f64,
}

/// Chart image ready to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    /// `None` when there were no samples
    pub max_flow: Option<MaxFlowPoint>,
    /// False when the image was drawn without any text
    pub labelled: bool,
}

/// Visual configuration for the renderer
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub font_family: String,
    /// Draw axis titles, tick labels and the marker caption
    pub labels: bool,
    pub time_step: f64,
    pub flow_max: f64,
    pub flow_step: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    pub flow_color: (u8, u8, u8),
    pub volume_color: (u8, u8, u8),
    pub marker_color: (u8, u8, u8),
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            font_family: "sans-serif".to_string(),
            labels: true,
            time_step: 10.0,
            flow_max: 100.0,
            flow_step: 10.0,
            volume_max: 100.0,
            volume_step: 20.0,
            flow_color: COLOR_FLOW,
            volume_color: COLOR_VOLUME,
            marker_color: COLOR_MARKER,
        }
    }
}

// ============================================================================
// Sample Interpretation
// ============================================================================

/// Interpret raw samples for plotting.
///
/// Flow and volume fall back to 0 when they are not finite numbers. Time is
/// taken as-is and must parse.
pub fn sanitize_samples(samples: &[MeasurementSample]) -> ReportResult<Vec<ChartPoint>> {
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let time = sample.time.to_finite().ok_or_else(|| {
                ReportError::Render(format!(
                    "sample {} has a non-numeric time value '{}'",
                    index, sample.time
                ))
            })?;

            Ok(ChartPoint {
                time,
                flow: sample.flow.to_finite().unwrap_or(0.0),
                volume: sample.volume.to_finite().unwrap_or(0.0),
            })
        })
        .collect()
}

/// Maximum flow and the time of its first occurrence
pub fn find_max_flow(points: &[ChartPoint]) -> Option<MaxFlowPoint> {
    let mut best: Option<MaxFlowPoint> = None;

    for point in points {
        match best {
            Some(current) if point.flow <= current.flow => {}
            _ => {
                best = Some(MaxFlowPoint {
                    time: point.time,
                    flow: point.flow,
                })
            }
        }
    }

    best
}

/// Upper bound of the time axis for a given flow time
pub fn time_axis_upper_bound(flow_time: f64) -> f64 {
    let upper = flow_time + TIME_AXIS_PADDING;
    if upper.is_finite() {
        upper.max(TIME_AXIS_PADDING)
    } else {
        TIME_AXIS_PADDING
    }
}

/// Effective tick step for `[0, upper]`, widened until at most [`MAX_TICKS`] fit
fn tick_step(upper: f64, step: f64) -> f64 {
    if !(upper.is_finite() && upper > 0.0) || !(step.is_finite() && step > 0.0) {
        return upper.max(1.0);
    }
    let mut step = step;
    while upper / step > (MAX_TICKS - 1) as f64 {
        step *= 10.0;
    }
    step
}

fn key_points(upper: f64, step: f64) -> Vec<f64> {
    let step = tick_step(upper, step);
    let count = (upper / step).floor() as usize;
    (0..=count).map(|i| i as f64 * step).collect()
}

/// Caption drawn next to the maximum-flow marker
pub fn max_flow_caption(max: MaxFlowPoint) -> String {
    format!("Max: {} ml/sec", max.flow)
}

fn rgb(color: (u8, u8, u8)) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

// ============================================================================
// Renderer
// ============================================================================

/// Renders measurement series with a fixed style
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    style: ChartStyle,
}

impl ChartRenderer {
    pub fn new(style: ChartStyle) -> Self {
        Self { style }
    }

    /// Render samples over a time axis of `[0, flow_time + 10]`
    pub fn render(&self, samples: &[MeasurementSample], flow_time: f64) -> ReportResult<RenderedChart> {
        let points = sanitize_samples(samples)?;
        let max_flow = find_max_flow(&points);
        let x_max = time_axis_upper_bound(flow_time);

        let (png, labelled) = if self.style.labels {
            match self.rasterize(&points, max_flow, x_max, true) {
                Ok(png) => (png, true),
                Err(e) => {
                    // Headless hosts often have no system fonts
                    warn!(error = %e, "Chart text rendering failed, drawing without labels");
                    let png = self
                        .rasterize(&points, max_flow, x_max, false)
                        .map_err(ReportError::Render)?;
                    (png, false)
                }
            }
        } else {
            let png = self
                .rasterize(&points, max_flow, x_max, false)
                .map_err(ReportError::Render)?;
            (png, false)
        };

        debug!(
            samples = points.len(),
            x_max,
            labelled,
            png_bytes = png.len(),
            "Rendered flow chart"
        );

        Ok(RenderedChart {
            width: self.style.width,
            height: self.style.height,
            png,
            max_flow,
            labelled,
        })
    }

    fn rasterize(
        &self,
        points: &[ChartPoint],
        max_flow: Option<MaxFlowPoint>,
        x_max: f64,
        labelled: bool,
    ) -> Result<Vec<u8>, String> {
        let style = &self.style;
        let (width, height) = (style.width, style.height);
        let font = style.font_family.as_str();

        let x_keys = key_points(x_max, style.time_step);
        let flow_keys = key_points(style.flow_max, style.flow_step);
        let volume_keys = key_points(style.volume_max, style.volume_step);

        let flow_color = rgb(style.flow_color);
        let volume_color = rgb(style.volume_color);
        let marker_color = rgb(style.marker_color);

        let mut buffer = vec![0u8; (width * height * 3) as usize];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(|e| e.to_string())?;

            let label_area = if labelled { 50 } else { 0 };

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .x_label_area_size(if labelled { 40 } else { 0 })
                .y_label_area_size(label_area)
                .right_y_label_area_size(label_area)
                .build_cartesian_2d(0f64..x_max, 0f64..style.flow_max)
                .map_err(|e| e.to_string())?
                .set_secondary_coord(0f64..x_max, 0f64..style.volume_max);

            if labelled {
                // Label counts equal to the key point counts make plotters
                // settle on exactly the configured steps
                chart
                    .configure_mesh()
                    .x_labels(x_keys.len())
                    .y_labels(flow_keys.len())
                    .x_label_formatter(&|x| format!("{:.0}", x))
                    .y_label_formatter(&|y| format!("{:.0}", y))
                    .bold_line_style(rgb(COLOR_GRID))
                    .light_line_style(WHITE)
                    .x_desc("Time (sec)")
                    .y_desc("Flow (ml/sec)")
                    .label_style((font, 12))
                    .axis_desc_style((font, 14))
                    .draw()
                    .map_err(|e| e.to_string())?;

                // Secondary axes never draw their own grid
                chart
                    .configure_secondary_axes()
                    .y_labels(volume_keys.len())
                    .y_label_formatter(&|y| format!("{:.0}", y))
                    .y_desc("Volume (ml)")
                    .label_style((font, 12))
                    .axis_desc_style((font, 14))
                    .draw()
                    .map_err(|e| e.to_string())?;
            } else {
                let grid = rgb(COLOR_GRID);
                chart
                    .draw_series(x_keys.iter().map(|&x| {
                        PathElement::new(vec![(x, 0.0), (x, style.flow_max)], grid.stroke_width(1))
                    }))
                    .map_err(|e| e.to_string())?;
                chart
                    .draw_series(flow_keys.iter().map(|&y| {
                        PathElement::new(vec![(0.0, y), (x_max, y)], grid.stroke_width(1))
                    }))
                    .map_err(|e| e.to_string())?;
            }

            chart
                .draw_series(LineSeries::new(
                    points.iter().map(|p| (p.time, p.flow)),
                    flow_color.stroke_width(1),
                ))
                .map_err(|e| e.to_string())?;

            chart
                .draw_secondary_series(LineSeries::new(
                    points.iter().map(|p| (p.time, p.volume)),
                    volume_color.stroke_width(1),
                ))
                .map_err(|e| e.to_string())?;

            if let Some(max) = max_flow {
                if labelled {
                    chart
                        .draw_series(std::iter::once(
                            EmptyElement::at((max.time, max.flow))
                                + Circle::new((0, 0), 5, marker_color.filled())
                                + Text::new(
                                    max_flow_caption(max),
                                    (-30, -22),
                                    (font, 14).into_font().color(&marker_color),
                                ),
                        ))
                        .map_err(|e| e.to_string())?;
                } else {
                    chart
                        .draw_series(std::iter::once(Circle::new(
                            (max.time, max.flow),
                            5,
                            marker_color.filled(),
                        )))
                        .map_err(|e| e.to_string())?;
                }
            }

            root.present().map_err(|e| e.to_string())?;
        }

        // Convert RGB buffer to PNG
        let img = RgbImage::from_raw(width, height, buffer)
            .ok_or("Failed to create image from buffer")?;

        let mut png_bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| e.to_string())?;

        Ok(png_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SampleValue;

    fn unlabelled() -> ChartRenderer {
        ChartRenderer::new(ChartStyle {
            labels: false,
            ..Default::default()
        })
    }

    fn happy_samples() -> Vec<MeasurementSample> {
        vec![
            MeasurementSample::new(0.0, 0.0, 0.0),
            MeasurementSample::new(5.0, 40.0, 20.0),
            MeasurementSample::new(10.0, 0.0, 40.0),
        ]
    }

    #[test]
    fn test_sanitize_zeroes_bad_flow_and_volume() {
        let samples = vec![
            MeasurementSample::new(5.0, "NaN", 20.0),
            MeasurementSample::new(6.0, 3.0, "Infinity"),
            MeasurementSample::new("7", "abc", SampleValue::Number(f64::INFINITY)),
        ];
        let points = sanitize_samples(&samples).unwrap();

        assert_eq!(points[0], ChartPoint { time: 5.0, flow: 0.0, volume: 20.0 });
        assert_eq!(points[1], ChartPoint { time: 6.0, flow: 3.0, volume: 0.0 });
        assert_eq!(points[2], ChartPoint { time: 7.0, flow: 0.0, volume: 0.0 });
    }

    #[test]
    fn test_sanitize_rejects_bad_time() {
        let samples = vec![MeasurementSample::new("later", 1.0, 1.0)];
        let err = sanitize_samples(&samples).unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
    }

    #[test]
    fn test_max_flow_takes_first_occurrence() {
        let points = vec![
            ChartPoint { time: 1.0, flow: 10.0, volume: 0.0 },
            ChartPoint { time: 2.0, flow: 30.0, volume: 0.0 },
            ChartPoint { time: 3.0, flow: 30.0, volume: 0.0 },
            ChartPoint { time: 4.0, flow: 5.0, volume: 0.0 },
        ];
        assert_eq!(
            find_max_flow(&points),
            Some(MaxFlowPoint { time: 2.0, flow: 30.0 })
        );
        assert_eq!(find_max_flow(&[]), None);
    }

    #[test]
    fn test_time_axis_bound() {
        assert_eq!(time_axis_upper_bound(10.0), 20.0);
        assert_eq!(time_axis_upper_bound(-50.0), 10.0);
        assert_eq!(time_axis_upper_bound(f64::NAN), 10.0);
    }

    #[test]
    fn test_key_points_follow_step() {
        assert_eq!(key_points(20.0, 10.0), vec![0.0, 10.0, 20.0]);
        assert_eq!(key_points(100.0, 20.0).len(), 6);
        assert_eq!(key_points(25.0, 10.0), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_render_marks_max_flow() {
        let chart = unlabelled().render(&happy_samples(), 10.0).unwrap();

        assert_eq!(chart.max_flow, Some(MaxFlowPoint { time: 5.0, flow: 40.0 }));
        assert_eq!((chart.width, chart.height), (CHART_WIDTH, CHART_HEIGHT));
        assert_eq!(&chart.png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&chart.png).unwrap();
        assert_eq!(decoded.width(), CHART_WIDTH);
        assert_eq!(decoded.height(), CHART_HEIGHT);
    }

    #[test]
    fn test_render_malformed_flow_point() {
        let samples = vec![
            MeasurementSample::new(0.0, 2.0, 0.0),
            MeasurementSample::new(5.0, "NaN", 20.0),
        ];
        let chart = unlabelled().render(&samples, 5.0).unwrap();
        assert_eq!(chart.max_flow, Some(MaxFlowPoint { time: 0.0, flow: 2.0 }));
    }

    #[test]
    fn test_render_empty_series() {
        let chart = unlabelled().render(&[], 0.0).unwrap();
        assert!(chart.max_flow.is_none());
        assert!(!chart.png.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = unlabelled();
        let first = renderer.render(&happy_samples(), 10.0).unwrap();
        let second = renderer.render(&happy_samples(), 10.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_labelled_render_always_produces_an_image() {
        // Falls back to an unlabelled image when no fonts are available
        let chart = ChartRenderer::default().render(&happy_samples(), 10.0).unwrap();
        assert!(!chart.png.is_empty());
        assert_eq!(chart.max_flow, Some(MaxFlowPoint { time: 5.0, flow: 40.0 }));
    }

    #[test]
    fn test_labelled_render_keeps_labels_when_fonts_exist() {
        let renderer = ChartRenderer::default();
        let points = sanitize_samples(&happy_samples()).unwrap();
        let max = find_max_flow(&points);

        // Hosts without system fonts cannot draw text at all
        if renderer.rasterize(&points, max, 20.0, true).is_err() {
            return;
        }

        let chart = renderer.render(&happy_samples(), 10.0).unwrap();
        assert!(chart.labelled);
    }

    #[test]
    fn test_max_flow_caption() {
        assert_eq!(max_flow_caption(MaxFlowPoint { time: 5.0, flow: 40.0 }), "Max: 40 ml/sec");
        assert_eq!(max_flow_caption(MaxFlowPoint { time: 2.0, flow: 12.5 }), "Max: 12.5 ml/sec");
    }

    #[test]
    fn test_key_points_are_capped_for_huge_axes() {
        let keys = key_points(time_axis_upper_bound(1e300), 10.0);
        assert!(keys.len() <= MAX_TICKS);
        assert!(keys.len() >= 2);

        let keys = key_points(1e15, 10.0);
        assert!(keys.len() <= MAX_TICKS);
        assert_eq!(key_points(490.0, 10.0).len(), 50);
    }

    #[test]
    fn test_render_huge_flow_time() {
        let chart = unlabelled().render(&happy_samples(), 1e300).unwrap();
        assert_eq!(chart.max_flow, Some(MaxFlowPoint { time: 5.0, flow: 40.0 }));
    }
}
