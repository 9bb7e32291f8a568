//! Terminal-cell view onto the chart scene.
//!
//! The offset axis always fits the pane. The sequence axis has a fixed number
//! of cells per grid slot and scrolls.

use ratatui::layout::Rect;

use crate::geometry::{Orientation, Plot, Point2, GRID_UNIT, PRINT_EXTENT};
use crate::render::sequence_extent_for;

/// Columns per grid slot when the sequence runs left to right
const COLUMNS_PER_SLOT: f64 = 8.0;

/// Rows per grid slot when the sequence runs top to bottom
const ROWS_PER_SLOT: f64 = 4.0;

/// Chart pane position and scroll state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub area: Rect,
    pub orientation: Orientation,
    /// Scene units scrolled off the start of the sequence axis
    pub scroll: f64,
}

impl Viewport {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            area: Rect::default(),
            orientation,
            scroll: 0.0,
        }
    }

    pub fn resize(&mut self, area: Rect) {
        self.area = area;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.scroll = 0.0;
    }

    fn sequence_cells(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => f64::from(self.area.width),
            Orientation::Vertical => f64::from(self.area.height),
        }
    }

    fn offset_cells(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => f64::from(self.area.height),
            Orientation::Vertical => f64::from(self.area.width),
        }
    }

    /// Scene units covered by one cell along the sequence axis
    pub fn sequence_per_cell(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => GRID_UNIT / COLUMNS_PER_SLOT,
            Orientation::Vertical => GRID_UNIT / ROWS_PER_SLOT,
        }
    }

    /// Scene units covered by one cell along the offset axis
    pub fn offset_per_cell(&self) -> f64 {
        PRINT_EXTENT / self.offset_cells().max(1.0)
    }

    /// Length of the sequence axis that fits in the pane
    pub fn visible_sequence(&self) -> f64 {
        self.sequence_cells() * self.sequence_per_cell()
    }

    /// Drawing surface for a flow of `count` points
    pub fn plot(&self, count: usize) -> Plot {
        let sequence = sequence_extent_for(count, self.visible_sequence());
        match self.orientation {
            Orientation::Horizontal => Plot::new(self.orientation, sequence, PRINT_EXTENT),
            Orientation::Vertical => Plot::new(self.orientation, PRINT_EXTENT, sequence),
        }
    }

    /// Scene position at the centre of a terminal cell inside the pane
    pub fn screen_to_scene(&self, column: u16, row: u16) -> Option<Point2> {
        let area = self.area;
        if column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return None;
        }
        let col = f64::from(column - area.x) + 0.5;
        let row = f64::from(row - area.y) + 0.5;
        Some(match self.orientation {
            Orientation::Horizontal => Point2::new(
                self.scroll + col * self.sequence_per_cell(),
                row * self.offset_per_cell(),
            ),
            Orientation::Vertical => Point2::new(
                col * self.offset_per_cell(),
                self.scroll + row * self.sequence_per_cell(),
            ),
        })
    }

    /// Visible scene bounds as `(x, y)` ranges
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let seq = [self.scroll, self.scroll + self.visible_sequence()];
        match self.orientation {
            Orientation::Horizontal => (seq, [0.0, PRINT_EXTENT]),
            Orientation::Vertical => ([0.0, PRINT_EXTENT], seq),
        }
    }

    fn max_scroll(&self, plot: &Plot) -> f64 {
        (plot.sequence_extent() - self.visible_sequence()).max(0.0)
    }

    /// Scroll by `slots` grid units, clamped to the plot
    pub fn pan(&mut self, slots: f64, plot: &Plot) {
        self.scroll = (self.scroll + slots * GRID_UNIT).clamp(0.0, self.max_scroll(plot));
    }

    /// Scroll the least amount that keeps `sequence` a grid unit clear of the
    /// pane edges
    pub fn scroll_into_view(&mut self, sequence: f64, plot: &Plot) {
        let visible = self.visible_sequence();
        if visible <= GRID_UNIT * 2.0 {
            self.scroll = (sequence - visible / 2.0).clamp(0.0, self.max_scroll(plot));
            return;
        }
        if sequence - GRID_UNIT < self.scroll {
            self.scroll = sequence - GRID_UNIT;
        } else if sequence + GRID_UNIT > self.scroll + visible {
            self.scroll = sequence + GRID_UNIT - visible;
        }
        self.scroll = self.scroll.clamp(0.0, self.max_scroll(plot));
    }
}
