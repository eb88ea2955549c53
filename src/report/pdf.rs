//! PDF rendering of the consulting report
//!
//! Sections are laid out into drawing operations first, then emitted
//! through `printpdf`.

use super::fonts::{Font, FontFace, ReportFonts};
use super::layout::{Column, Layout, Op, Page, CONTENT_WIDTH, PAGE_HEIGHT, PAGE_WIDTH};
use super::{format_money, RenderError, ReportDocument, ReportRenderer};
use crate::config::AppConfig;
use log::{debug, info};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Pt,
};
use std::io::Cursor;

const BODY_SIZE: f64 = 10.5;
const BODY_LEADING: f64 = 14.0;
const H1_SIZE: f64 = 18.0;
const H2_SIZE: f64 = 13.0;
const TABLE_SIZE: f64 = 8.0;

const COVER_DISCLAIMER: &str = "This report is an estimate based on the information provided and \
    published standards. Depreciation, tax credits and reductions, the owner's salary/dividend \
    structure, family employees and expense strategy are not reflected. Final tax filings and \
    decisions require review by a tax professional.";

const INTERPRETATION_NOTE: &str = "Reading guide: 'Saving potential' is a simplified estimate of \
    the difference in tax and health-insurance burden after converting to a corporation. Actual \
    effects vary with industry, expense treatment, owner salary/dividends and payroll structure \
    (estimate).";

const CONCLUSION: [&str; 2] = [
    "\u{2022} Designing conversion timing, the owner's salary/dividend structure, documentation \
     and expense processes, and diligent-filing readiness together makes it possible to capture \
     savings while managing risk (based on estimates).",
    "\u{2022} Recommended next steps: (1) review costs and documentation  (2) detailed simulation \
     of owner income and insurance  (3) finalize the corporate conversion roadmap",
];

const CLOSING_NOTE: &str = "Reflecting sales, cost of goods, payroll and fixed costs (rent, \
    leases, interest, depreciation) makes this report considerably more persuasive.";

/// A4 report. Embeds the configured TrueType font, or falls back to the
/// built-in Helvetica pair.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    fonts: ReportFonts,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::with_fonts(ReportFonts::helvetica())
    }

    pub fn with_fonts(fonts: ReportFonts) -> Self {
        Self { fonts }
    }

    /// Load `REPORT_FONT_PATH` / `REPORT_FONT_BOLD_PATH` when set. A
    /// configured font that cannot be read is an error, not a fallback.
    pub fn from_config(config: &AppConfig) -> Result<Self, RenderError> {
        match &config.report_font {
            Some(regular) => {
                let fonts = ReportFonts::from_files(regular, config.report_font_bold.as_deref())?;
                info!("report font: {}", regular.display());
                Ok(Self::with_fonts(fonts))
            }
            None => {
                info!("report font: built-in Helvetica (Latin text only)");
                Ok(Self::new())
            }
        }
    }

    pub fn fonts(&self) -> &ReportFonts {
        &self.fonts
    }

    fn cover(&self, layout: &mut Layout<'_>, doc: &ReportDocument) {
        layout.paragraph("Confidential", Font::Regular, BODY_SIZE, BODY_LEADING);
        layout.spacer(6.0);
        layout.paragraph(&doc.title, Font::Bold, H1_SIZE, H1_SIZE * 1.25);
        layout.paragraph(
            &format!("Client: {}", doc.client_email),
            Font::Regular,
            BODY_SIZE,
            BODY_LEADING,
        );
        layout.paragraph(
            &format!("Date: {}", doc.generated_at.format("%Y-%m-%d")),
            Font::Regular,
            BODY_SIZE,
            BODY_LEADING,
        );
        layout.spacer(12.0);
        layout.paragraph(COVER_DISCLAIMER, Font::Regular, BODY_SIZE, BODY_LEADING);
        layout.page_break();
    }

    fn executive_summary(&self, layout: &mut Layout<'_>, doc: &ReportDocument) {
        layout.heading("1) Executive Summary", H2_SIZE);
        for para in doc.narrative.paragraphs() {
            layout.paragraph(para, Font::Regular, BODY_SIZE, BODY_LEADING);
        }
        layout.spacer(10.0);
    }

    fn input_summary(&self, layout: &mut Layout<'_>, doc: &ReportDocument) -> Result<(), RenderError> {
        let inputs = &doc.inputs;
        let rows = vec![
            vec!["Expected sales this year".to_string(), format!("{} KRW", format_money(inputs.sales))],
            vec!["Employees (excluding owner)".to_string(), inputs.employees.to_string()],
            vec!["Industry code".to_string(), inputs.industry_code.clone()],
            vec!["Income rate (%)".to_string(), format!("{:.2} %", inputs.income_rate)],
            vec!["Owner insurance class".to_string(), inputs.insurance_class.label().to_string()],
            vec!["Current concerns / risks".to_string(), inputs.concerns.clone()],
        ];
        let label_width = 130.0;
        let columns = [Column::left(label_width), Column::left(CONTENT_WIDTH - label_width)];

        layout.heading("2) Input Summary", H2_SIZE);
        layout.table(&columns, &["Item", "Value"], &rows, 9.0)?;
        layout.spacer(12.0);
        Ok(())
    }

    fn projection(&self, layout: &mut Layout<'_>, doc: &ReportDocument) -> Result<(), RenderError> {
        let header = [
            "Year",
            "Revenue",
            "Income rate (%)",
            "Profit",
            "Individual tax",
            "Entity tax",
            "Health insurance",
            "Saving potential",
        ];
        let columns = [
            Column::left(36.0),
            Column::right(72.0),
            Column::right(46.0),
            Column::right(64.0),
            Column::right(64.0),
            Column::right(60.0),
            Column::right(62.0),
            Column::right(CONTENT_WIDTH - 404.0),
        ];
        let rows: Vec<Vec<String>> = doc
            .projection
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.year.to_string(),
                    format_money(r.revenue),
                    format!("{:.2}", r.income_rate),
                    format_money(r.profit),
                    format_money(r.individual_tax),
                    format_money(r.entity_tax),
                    format_money(r.insurance),
                    format_money(r.conversion_delta),
                ]
            })
            .collect();

        layout.heading("3) Five-Year Projection (estimate)", H2_SIZE);
        layout.table(&columns, &header, &rows, TABLE_SIZE)?;
        layout.spacer(10.0);
        layout.paragraph(INTERPRETATION_NOTE, Font::Regular, BODY_SIZE, BODY_LEADING);
        layout.page_break();
        Ok(())
    }

    fn conclusion(&self, layout: &mut Layout<'_>) {
        layout.heading("4) Conclusion and Next Steps", H2_SIZE);
        for para in CONCLUSION {
            layout.paragraph(para, Font::Regular, BODY_SIZE, BODY_LEADING);
        }
        layout.spacer(12.0);
        layout.paragraph(CLOSING_NOTE, Font::Regular, BODY_SIZE, BODY_LEADING);
    }

    /// Lay out every section into pages of drawing operations
    pub(crate) fn layout(&self, doc: &ReportDocument) -> Result<Vec<Page>, RenderError> {
        let mut layout = Layout::new(&self.fonts);
        self.cover(&mut layout, doc);
        self.executive_summary(&mut layout, doc);
        self.input_summary(&mut layout, doc)?;
        self.projection(&mut layout, doc)?;
        self.conclusion(&mut layout);
        Ok(layout.finish())
    }
}

impl ReportRenderer for PdfRenderer {
    fn render(&self, doc: &ReportDocument) -> Result<Vec<u8>, RenderError> {
        let pages = self.layout(doc)?;
        debug!("report laid out on {} pages", pages.len());
        emit(&doc.title, &pages, &self.fonts)
    }
}

fn pdf_error(e: printpdf::Error) -> RenderError {
    RenderError::Pdf(format!("{e:?}"))
}

fn add_font(pdf: &PdfDocumentReference, face: &FontFace, bold: bool) -> Result<IndirectFontRef, RenderError> {
    match face {
        FontFace::Helvetica { .. } => pdf.add_builtin_font(if bold {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        }),
        FontFace::Embedded(font) => pdf.add_external_font(Cursor::new(font.bytes())),
    }
    .map_err(pdf_error)
}

fn mm(points: f64) -> Mm {
    Mm::from(Pt(points as f32))
}

fn rect_points(x: f64, y: f64, width: f64, height: f64) -> Vec<(Point, bool)> {
    [(x, y), (x, y + height), (x + width, y + height), (x + width, y)]
        .into_iter()
        .map(|(px, py)| (Point::new(mm(px), mm(py)), false))
        .collect()
}

fn draw(layer: &PdfLayerReference, op: &Op, regular: &IndirectFontRef, bold: &IndirectFontRef) {
    match op {
        Op::Text { x, y, font, size, text } => {
            let font_ref = match font {
                Font::Regular => regular,
                Font::Bold => bold,
            };
            layer.use_text(text.as_str(), *size as f32, mm(*x), mm(*y), font_ref);
        }
        Op::FillRect { x, y, width, height, gray } => {
            layer.set_fill_color(Color::Greyscale(Greyscale::new(*gray as f32, None)));
            layer.add_polygon(Polygon {
                rings: vec![rect_points(*x, *y, *width, *height)],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
            layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
        }
        Op::StrokeRect {
            x,
            y,
            width,
            height,
            gray,
            line_width,
        } => {
            layer.set_outline_color(Color::Greyscale(Greyscale::new(*gray as f32, None)));
            layer.set_outline_thickness(*line_width as f32);
            layer.add_line(Line {
                points: rect_points(*x, *y, *width, *height),
                is_closed: true,
            });
        }
    }
}

/// Write laid-out pages as an A4 PDF
fn emit(title: &str, pages: &[Page], fonts: &ReportFonts) -> Result<Vec<u8>, RenderError> {
    let (pdf, first_page, first_layer) = PdfDocument::new(title, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Report");
    let regular = add_font(&pdf, fonts.face(Font::Regular), false)?;
    let bold = add_font(&pdf, fonts.face(Font::Bold), true)?;

    for (i, page) in pages.iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = pdf.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Report");
            pdf.get_page(page_index).get_layer(layer_index)
        };
        for op in page {
            draw(&layer, op, &regular, &bold);
        }
    }

    pdf.save_to_bytes().map_err(pdf_error)
}
