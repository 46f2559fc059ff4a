//! Page layout
//!
//! Pure geometry: every region of the report page is derived from the page
//! size, the margin and the chart's native raster size. Coordinates are PDF
//! points with the origin at the bottom-left corner.

// ============================================================================
// Constants
// ============================================================================

pub const PAGE_WIDTH: f32 = 600.0;
pub const PAGE_HEIGHT: f32 = 850.0;
pub const PAGE_MARGIN: f32 = 50.0;

pub const ROW_HEIGHT: f32 = 20.0;

/// Header key/value entries: name, date of birth, identity
pub const HEADER_FIELDS: usize = 3;

pub const MARKER_COLUMN_WIDTHS: [f32; 4] = [150.0, 100.0, 100.0, 100.0];
pub const MARKER_ROWS: usize = 3;

pub const SUMMARY_ROWS: usize = 3;

/// Amount shaved off the native chart size when placing it on the page
pub const CHART_CROP: (f32, f32) = (120.0, 150.0);

const TITLE_WIDTH: f32 = 200.0;
const STAMP_RADIUS: f32 = 25.0;

// ============================================================================
// Geometry Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin: PAGE_MARGIN,
        }
    }
}

impl PageSpec {
    /// Width of one header column
    pub fn column_width(&self) -> f32 {
        (self.width - 3.0 * self.margin) / 2.0
    }

    pub fn left(&self) -> f32 {
        self.margin
    }

    pub fn right(&self) -> f32 {
        self.width - self.margin
    }

    pub fn top(&self) -> f32 {
        self.height - self.margin
    }
}

/// A text baseline origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Anchor,
    pub to: Anchor,
}

impl Segment {
    pub fn horizontal(y: f32, x1: f32, x2: f32) -> Self {
        Self {
            from: Anchor::new(x1, y),
            to: Anchor::new(x2, y),
        }
    }

    pub fn vertical(x: f32, y1: f32, y2: f32) -> Self {
        Self {
            from: Anchor::new(x, y1),
            to: Anchor::new(x, y2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Bottom, left, top, right
    pub fn edges(&self) -> [Segment; 4] {
        [
            Segment::horizontal(self.y, self.x, self.right()),
            Segment::vertical(self.x, self.y, self.top()),
            Segment::horizontal(self.top(), self.x, self.right()),
            Segment::vertical(self.right(), self.y, self.top()),
        ]
    }
}

// ============================================================================
// Regions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTableLayout {
    pub header_cells: Vec<Anchor>,
    /// One anchor per column for every data row
    pub rows: Vec<Vec<Anchor>>,
    pub grid: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRowSlots {
    pub left_label: Anchor,
    pub left_value: Anchor,
    pub right_label: Anchor,
    pub right_value: Anchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLayout {
    pub heading: Anchor,
    pub rows: Vec<SummaryRowSlots>,
    /// Outer box plus the single divider at the midpoint
    pub frame: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FooterLayout {
    pub heading: Anchor,
    pub rule: Segment,
    pub stamp_center: Anchor,
    pub stamp_radius: f32,
    pub stamp_label: Anchor,
    pub signature: Segment,
    pub license: Anchor,
}

/// Every region of the report page
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page: PageSpec,
    pub border: [Segment; 4],
    pub title: Anchor,
    pub header_cells: Vec<Anchor>,
    pub marker_table: MarkerTableLayout,
    pub chart: Rect,
    pub chart_rule: Segment,
    pub summary: SummaryLayout,
    pub footer: FooterLayout,
}

impl PageLayout {
    /// Lay out a page for a chart of the given native pixel size
    pub fn compute(page: &PageSpec, chart_native: (u32, u32)) -> Self {
        let chart = chart_rect(page, chart_native);

        Self {
            page: *page,
            border: Rect {
                x: page.margin,
                y: page.margin,
                width: page.width - 2.0 * page.margin,
                height: page.height - 2.0 * page.margin,
            }
            .edges(),
            title: Anchor::new((page.width - TITLE_WIDTH) / 2.0, page.top() - 30.0),
            header_cells: header_cells(page),
            marker_table: marker_table(page),
            chart,
            chart_rule: Segment::horizontal(chart.y - 25.0, page.left(), page.right()),
            summary: summary(page, &chart),
            footer: footer(page),
        }
    }
}

fn header_cells(page: &PageSpec) -> Vec<Anchor> {
    let start_y = page.top() - 60.0;
    let left_x = page.margin + 10.0;
    let right_x = page.margin + page.column_width() + 30.0;

    (0..HEADER_FIELDS)
        .map(|i| {
            let x = if i % 2 == 0 { left_x } else { right_x };
            let y = start_y - (i / 2) as f32 * ROW_HEIGHT - 10.0;
            Anchor::new(x, y)
        })
        .collect()
}

fn marker_table(page: &PageSpec) -> MarkerTableLayout {
    let top = page.top() - 140.0;

    let column_x: Vec<f32> = MARKER_COLUMN_WIDTHS
        .iter()
        .scan(0.0, |offset, width| {
            let x = page.margin + 10.0 + *offset;
            *offset += width;
            Some(x)
        })
        .collect();

    let header_cells = column_x.iter().map(|&x| Anchor::new(x, top - 10.0)).collect();

    let rows = (0..MARKER_ROWS)
        .map(|r| {
            let y = top - (r + 1) as f32 * ROW_HEIGHT - 10.0;
            column_x.iter().map(|&x| Anchor::new(x, y)).collect()
        })
        .collect();

    let left = page.margin + 5.0;
    let right = page.right() - 5.0;
    let grid_top = top + 5.0;
    let grid_bottom = top - (MARKER_ROWS + 1) as f32 * ROW_HEIGHT;
    let header_rule = top - 15.0;

    let mut grid = vec![
        Segment::horizontal(grid_top, left, right),
        Segment::horizontal(header_rule, left, right),
    ];
    for r in 1..MARKER_ROWS {
        grid.push(Segment::horizontal(header_rule - r as f32 * ROW_HEIGHT, left, right));
    }
    grid.push(Segment::horizontal(grid_bottom, left, right));

    let mut x = left;
    for width in MARKER_COLUMN_WIDTHS {
        grid.push(Segment::vertical(x, grid_top, grid_bottom));
        x += width;
    }
    grid.push(Segment::vertical(right, grid_top, grid_bottom));

    MarkerTableLayout {
        header_cells,
        rows,
        grid,
    }
}

fn chart_rect(page: &PageSpec, (native_width, native_height): (u32, u32)) -> Rect {
    let native_width = native_width as f32;
    let native_height = native_height as f32;

    Rect {
        x: page.margin,
        y: page.top() - native_height - 100.0,
        width: (native_width - CHART_CROP.0).max(0.0),
        height: (native_height - CHART_CROP.1).max(0.0),
    }
}

fn summary(page: &PageSpec, chart: &Rect) -> SummaryLayout {
    let start = chart.y - 20.0;
    let left = page.left();
    let right = page.right();
    let divider = page.width / 2.0;

    let rows = (0..SUMMARY_ROWS)
        .map(|i| {
            let y = start - (i + 1) as f32 * ROW_HEIGHT - 30.0;
            SummaryRowSlots {
                left_label: Anchor::new(left + 10.0, y),
                left_value: Anchor::new(left + 135.0, y),
                right_label: Anchor::new(left + 255.0, y),
                right_value: Anchor::new(left + 405.0, y),
            }
        })
        .collect();

    let top = start - 25.0;
    let bottom = start - (SUMMARY_ROWS + 1) as f32 * ROW_HEIGHT - 20.0;

    SummaryLayout {
        heading: Anchor::new(left + 160.0, start - 20.0),
        rows,
        frame: vec![
            Segment::horizontal(top, left, right),
            Segment::horizontal(bottom, left, right),
            Segment::vertical(left, top, bottom),
            Segment::vertical(divider, top, bottom),
            Segment::vertical(right, top, bottom),
        ],
    }
}

fn footer(page: &PageSpec) -> FooterLayout {
    let base = page.margin;
    let rule_y = base + 125.0;
    let stamp_center = Anchor::new(page.width - 150.0, base + 60.0);

    FooterLayout {
        heading: Anchor::new(base + 225.0, base + 110.0),
        rule: Segment::horizontal(rule_y, page.left(), page.right()),
        stamp_center,
        stamp_radius: STAMP_RADIUS,
        stamp_label: Anchor::new(stamp_center.x - 15.0, stamp_center.y - 2.0),
        signature: Segment::horizontal(base + 15.0, base + 330.0, base + 470.0),
        license: Anchor::new(base + 60.0, base - 15.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_layout() -> PageLayout {
        PageLayout::compute(&PageSpec::default(), (600, 400))
    }

    #[test]
    fn test_border_is_inset_by_margin() {
        let layout = default_layout();
        let [bottom, left, top, right] = layout.border;

        assert_eq!(bottom, Segment::horizontal(50.0, 50.0, 550.0));
        assert_eq!(left, Segment::vertical(50.0, 50.0, 800.0));
        assert_eq!(top, Segment::horizontal(800.0, 50.0, 550.0));
        assert_eq!(right, Segment::vertical(550.0, 50.0, 800.0));
    }

    #[test]
    fn test_title_and_header_positions() {
        let layout = default_layout();
        assert_eq!(layout.title, Anchor::new(200.0, 770.0));

        assert_eq!(PageSpec::default().column_width(), 225.0);
        assert_eq!(
            layout.header_cells,
            vec![
                Anchor::new(60.0, 730.0),
                Anchor::new(305.0, 730.0),
                Anchor::new(60.0, 710.0),
            ]
        );
    }

    #[test]
    fn test_marker_table_grid() {
        let table = default_layout().marker_table;

        let header_x: Vec<f32> = table.header_cells.iter().map(|a| a.x).collect();
        assert_eq!(header_x, vec![60.0, 210.0, 310.0, 410.0]);
        assert!(table.header_cells.iter().all(|a| a.y == 650.0));

        let row_y: Vec<f32> = table.rows.iter().map(|r| r[0].y).collect();
        assert_eq!(row_y, vec![630.0, 610.0, 590.0]);
        assert!(table.rows.iter().all(|r| r.len() == MARKER_COLUMN_WIDTHS.len()));

        let horizontals: Vec<f32> = table
            .grid
            .iter()
            .filter(|s| s.from.y == s.to.y)
            .map(|s| s.from.y)
            .collect();
        assert_eq!(horizontals, vec![665.0, 645.0, 625.0, 605.0, 580.0]);

        let verticals: Vec<f32> = table
            .grid
            .iter()
            .filter(|s| s.from.x == s.to.x)
            .map(|s| s.from.x)
            .collect();
        assert_eq!(verticals, vec![55.0, 205.0, 305.0, 405.0, 545.0]);
    }

    #[test]
    fn test_chart_is_cropped_from_native_size() {
        let layout = default_layout();
        assert_eq!(
            layout.chart,
            Rect { x: 50.0, y: 300.0, width: 480.0, height: 250.0 }
        );
        assert_eq!(layout.chart_rule, Segment::horizontal(275.0, 50.0, 550.0));
        // Chart sits below the marker table
        assert!(layout.chart.top() <= 580.0);
    }

    #[test]
    fn test_summary_box_has_one_divider() {
        let summary = default_layout().summary;
        assert_eq!(summary.heading, Anchor::new(210.0, 260.0));

        let first = summary.rows[0];
        assert_eq!(first.left_label, Anchor::new(60.0, 230.0));
        assert_eq!(first.left_value, Anchor::new(185.0, 230.0));
        assert_eq!(first.right_label, Anchor::new(305.0, 230.0));
        assert_eq!(first.right_value, Anchor::new(455.0, 230.0));
        assert_eq!(summary.rows[2].left_label.y, 190.0);

        let verticals: Vec<f32> = summary
            .frame
            .iter()
            .filter(|s| s.from.x == s.to.x)
            .map(|s| s.from.x)
            .collect();
        assert_eq!(verticals, vec![50.0, 300.0, 550.0]);
        assert!(summary.frame.contains(&Segment::horizontal(255.0, 50.0, 550.0)));
        assert!(summary.frame.contains(&Segment::horizontal(180.0, 50.0, 550.0)));
    }

    #[test]
    fn test_footer_positions() {
        let footer = default_layout().footer;
        assert_eq!(footer.heading, Anchor::new(275.0, 160.0));
        assert_eq!(footer.rule, Segment::horizontal(175.0, 50.0, 550.0));
        assert_eq!(footer.stamp_center, Anchor::new(450.0, 110.0));
        assert_eq!(footer.stamp_label, Anchor::new(435.0, 108.0));
        assert_eq!(footer.signature, Segment::horizontal(65.0, 380.0, 520.0));
        assert_eq!(footer.license, Anchor::new(110.0, 35.0));
    }

    #[test]
    fn test_layout_is_pure() {
        assert_eq!(default_layout(), default_layout());
    }
}
