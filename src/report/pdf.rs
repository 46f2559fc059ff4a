//! PDF backend
//!
//! Serializes a draw plan onto a single printpdf page. Plan coordinates are
//! points; printpdf takes millimetres, so every position goes through [`pt`].

use std::f32::consts::PI;

use printpdf::*;

use super::chart::RenderedChart;
use super::composer::DrawOp;
use super::error::{ReportError, ReportResult};
use super::layout::{Anchor, PageSpec, Rect};

/// Segments used to approximate a circle outline
const CIRCLE_SEGMENTS: usize = 48;

/// Chart pixels map 1:1 onto points before scaling
const CHART_DPI: f32 = 72.0;

// ============================================================================
// Helpers
// ============================================================================

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

fn rgb_to_printpdf(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

fn add_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    text: &str,
    at: Anchor,
    size: f32,
    color: (u8, u8, u8),
) {
    layer.set_fill_color(rgb_to_printpdf(color.0, color.1, color.2));
    layer.use_text(text, size, pt(at.x), pt(at.y), font);
}

fn add_polyline(
    layer: &PdfLayerReference,
    points: &[Anchor],
    closed: bool,
    color: (u8, u8, u8),
    width: f32,
) {
    layer.set_outline_color(rgb_to_printpdf(color.0, color.1, color.2));
    layer.set_outline_thickness(width);

    let line = Line {
        points: points
            .iter()
            .map(|a| (Point::new(pt(a.x), pt(a.y)), false))
            .collect(),
        is_closed: closed,
    };
    layer.add_line(line);
}

fn circle_points(center: Anchor, radius: f32) -> Vec<Anchor> {
    (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = 2.0 * PI * i as f32 / CIRCLE_SEGMENTS as f32;
            Anchor::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

fn add_chart(layer: &PdfLayerReference, chart: &RenderedChart, rect: Rect) -> ReportResult<()> {
    let dynamic_image = printpdf::image_crate::load_from_memory(&chart.png)
        .map_err(ReportError::render)?;
    let pdf_image = Image::from_dynamic_image(&dynamic_image);

    let transform = ImageTransform {
        translate_x: Some(pt(rect.x)),
        translate_y: Some(pt(rect.y)),
        scale_x: Some(rect.width / chart.width as f32),
        scale_y: Some(rect.height / chart.height as f32),
        dpi: Some(CHART_DPI),
        ..Default::default()
    };

    pdf_image.add_to_layer(layer.clone(), transform);
    Ok(())
}

// ============================================================================
// Page Rendering
// ============================================================================

/// Draw `ops` onto one page and return the PDF bytes
pub fn render_page(
    title: &str,
    page: &PageSpec,
    ops: &[DrawOp],
    chart: &RenderedChart,
) -> ReportResult<Vec<u8>> {
    let (doc, page_index, layer_index) =
        PdfDocument::new(title, pt(page.width), pt(page.height), "Layer 1");

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(ReportError::render)?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(ReportError::render)?;

    let layer = doc.get_page(page_index).get_layer(layer_index);

    for op in ops {
        match op {
            DrawOp::Text { text, at, size, bold, color } => {
                let face = if *bold { &font_bold } else { &font };
                add_text(&layer, face, text, *at, *size, *color);
            }
            DrawOp::Line { segment, thickness, color } => {
                add_polyline(&layer, &[segment.from, segment.to], false, *color, *thickness);
            }
            DrawOp::Circle { center, radius, thickness, color } => {
                add_polyline(&layer, &circle_points(*center, *radius), true, *color, *thickness);
            }
            DrawOp::Chart { rect } => add_chart(&layer, chart, *rect)?,
        }
    }

    doc.save_to_bytes().map_err(ReportError::render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::layout::Segment;

    #[test]
    fn test_circle_points_lie_on_radius() {
        let center = Anchor::new(450.0, 110.0);
        let points = circle_points(center, 25.0);

        assert_eq!(points.len(), CIRCLE_SEGMENTS);
        for p in points {
            let distance = ((p.x - center.x).powi(2) + (p.y - center.y).powi(2)).sqrt();
            assert!((distance - 25.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_render_plan_without_chart() {
        let ops = vec![
            DrawOp::Line {
                segment: Segment::horizontal(50.0, 50.0, 550.0),
                thickness: 1.0,
                color: (0, 0, 0),
            },
            DrawOp::Text {
                text: "UROFLOWMETRY".to_string(),
                at: Anchor::new(200.0, 770.0),
                size: 24.0,
                bold: true,
                color: (0, 0, 0),
            },
        ];
        let chart = RenderedChart {
            width: 600,
            height: 400,
            png: Vec::new(),
            max_flow: None,
            labelled: false,
        };

        let bytes = render_page("Test", &PageSpec::default(), &ops, &chart).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_bad_chart_bytes_fail_cleanly() {
        let ops = vec![DrawOp::Chart {
            rect: Rect { x: 50.0, y: 300.0, width: 480.0, height: 250.0 },
        }];
        let chart = RenderedChart {
            width: 600,
            height: 400,
            png: b"not a png".to_vec(),
            max_flow: None,
            labelled: false,
        };

        let err = render_page("Test", &PageSpec::default(), &ops, &chart).unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
    }
}
