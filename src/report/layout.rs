//! Flowing page layout: paragraphs, headings, tables and page breaks
//!
//! Produces a list of drawing operations per page. Coordinates are points
//! with the origin at the bottom-left corner. Table rows taller than the
//! space left are split line by line across pages, so no text is placed
//! outside the margins.

use super::fonts::{Font, ReportFonts};
use super::RenderError;

/// A4 in points
pub const PAGE_WIDTH: f64 = 595.28;
pub const PAGE_HEIGHT: f64 = 841.89;
/// 18 mm
pub const MARGIN: f64 = 51.02;
pub const CONTENT_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;

const CELL_PAD_X: f64 = 4.0;
const CELL_PAD_Y: f64 = 3.0;
const HEADER_GRAY: f64 = 0.95;
const GRID_GRAY: f64 = 0.8;
const GRID_WIDTH: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f64,
        y: f64,
        font: Font,
        size: f64,
        text: String,
    },
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        gray: f64,
    },
    StrokeRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        gray: f64,
        line_width: f64,
    },
}

pub type Page = Vec<Op>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub width: f64,
    pub align: Align,
}

impl Column {
    pub fn left(width: f64) -> Self {
        Self { width, align: Align::Left }
    }

    pub fn right(width: f64) -> Self {
        Self { width, align: Align::Right }
    }
}

/// Greedy word wrap. Words wider than the line are split by character.
pub fn wrap(fonts: &ReportFonts, text: &str, font: Font, size: f64, max_width: f64) -> Vec<String> {
    let width = |s: &str| fonts.text_width(s, font, size);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };
        if width(&candidate) <= max_width {
            line = candidate;
            continue;
        }

        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        for ch in word.chars() {
            line.push(ch);
            if width(&line) > max_width && line.chars().count() > 1 {
                line.pop();
                lines.push(std::mem::take(&mut line));
                line.push(ch);
            }
        }
    }

    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

pub struct Layout<'a> {
    fonts: &'a ReportFonts,
    pages: Vec<Page>,
    current: Page,
    y: f64,
}

impl<'a> Layout<'a> {
    pub fn new(fonts: &'a ReportFonts) -> Self {
        Self {
            fonts,
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    /// Start a new page. A page with nothing drawn on it is not emitted.
    pub fn page_break(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure(&mut self, height: f64) {
        if self.y - height < MARGIN {
            self.page_break();
        }
    }

    pub fn spacer(&mut self, height: f64) {
        self.y -= height;
        if self.y < MARGIN {
            self.page_break();
        }
    }

    fn draw_text(&mut self, x: f64, y: f64, text: &str, font: Font, size: f64) {
        let text = self.fonts.face(font).prepare(text).into_owned();
        self.current.push(Op::Text { x, y, font, size, text });
    }

    /// Wrapped text at full content width
    pub fn paragraph(&mut self, text: &str, font: Font, size: f64, leading: f64) {
        for line in wrap(self.fonts, text, font, size, CONTENT_WIDTH) {
            self.ensure(leading);
            self.y -= leading;
            self.draw_text(MARGIN, self.y + (leading - size) / 2.0, &line, font, size);
        }
    }

    pub fn heading(&mut self, text: &str, size: f64) {
        let leading = size * 1.4;
        // Keep a heading together with at least two body lines
        self.ensure(leading + 28.0);
        self.spacer(4.0);
        self.paragraph(text, Font::Bold, size, leading);
        self.spacer(4.0);
    }

    /// Grid table with a shaded header row repeated after page breaks
    pub fn table(
        &mut self,
        columns: &[Column],
        header: &[&str],
        rows: &[Vec<String>],
        size: f64,
    ) -> Result<(), RenderError> {
        let leading = size * 1.3;
        let header_cells: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        let header_lines = self.wrap_cells(columns, &header_cells, Font::Bold, size);
        let header_height = block_height(&header_lines, leading);

        // Header plus one body line
        self.ensure(header_height + leading + 2.0 * CELL_PAD_Y);
        self.table_row(columns, &header_lines, Font::Bold, size, leading, true);

        // A row that fits on an empty page moves there whole; a taller one
        // is split line by line. `fresh` marks a page holding only the header.
        let usable = PAGE_HEIGHT - 2.0 * MARGIN - header_height;
        let mut fresh = false;
        for row in rows {
            let mut lines = self.wrap_cells(columns, row, Font::Regular, size);
            let split = block_height(&lines, leading) > usable;

            loop {
                let room = ((self.y - MARGIN - 2.0 * CELL_PAD_Y) / leading + 1e-9).floor();
                let room = if room > 0.0 { room as usize } else { 0 };

                if line_count(&lines) <= room {
                    self.table_row(columns, &lines, Font::Regular, size, leading, false);
                    fresh = false;
                    break;
                }

                if room > 0 && (split || fresh) {
                    let rest: Vec<Vec<String>> = lines.iter_mut().map(|cell| split_off(cell, room)).collect();
                    self.table_row(columns, &lines, Font::Regular, size, leading, false);
                    lines = rest;
                } else if fresh {
                    return Err(RenderError::Layout(
                        "table header leaves no room for rows".to_string(),
                    ));
                }

                self.page_break();
                self.table_row(columns, &header_lines, Font::Bold, size, leading, true);
                fresh = true;
            }
        }
        Ok(())
    }

    fn wrap_cells(&self, columns: &[Column], cells: &[String], font: Font, size: f64) -> Vec<Vec<String>> {
        columns
            .iter()
            .zip(cells)
            .map(|(col, cell)| wrap(self.fonts, cell, font, size, col.width - 2.0 * CELL_PAD_X))
            .collect()
    }

    fn table_row(
        &mut self,
        columns: &[Column],
        cells: &[Vec<String>],
        font: Font,
        size: f64,
        leading: f64,
        shaded: bool,
    ) {
        let height = block_height(cells, leading);
        let top = self.y;
        let bottom = top - height;
        let total: f64 = columns.iter().map(|c| c.width).sum();

        if shaded {
            self.current.push(Op::FillRect {
                x: MARGIN,
                y: bottom,
                width: total,
                height,
                gray: HEADER_GRAY,
            });
        }

        let mut x = MARGIN;
        for (col, lines) in columns.iter().zip(cells) {
            self.current.push(Op::StrokeRect {
                x,
                y: bottom,
                width: col.width,
                height,
                gray: GRID_GRAY,
                line_width: GRID_WIDTH,
            });
            let mut baseline = top - CELL_PAD_Y - size;
            for line in lines {
                let tx = match col.align {
                    Align::Left => x + CELL_PAD_X,
                    Align::Right => x + col.width - CELL_PAD_X - self.fonts.text_width(line, font, size),
                };
                self.draw_text(tx, baseline, line, font, size);
                baseline -= leading;
            }
            x += col.width;
        }

        self.y = bottom;
    }

    /// Flush and return every page
    pub fn finish(mut self) -> Vec<Page> {
        self.page_break();
        self.pages
    }
}

fn line_count(cells: &[Vec<String>]) -> usize {
    cells.iter().map(Vec::len).max().unwrap_or(1).max(1)
}

fn block_height(cells: &[Vec<String>], leading: f64) -> f64 {
    line_count(cells) as f64 * leading + 2.0 * CELL_PAD_Y
}

/// Keep the first `at` lines in `cell` and return the rest
fn split_off(cell: &mut Vec<String>, at: usize) -> Vec<String> {
    if cell.len() > at {
        cell.split_off(at)
    } else {
        Vec::new()
    }
}
