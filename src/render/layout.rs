//! Data-bound page layout and flowed pagination.
//!
//! A [`Template`] is a list of sections; each section is one logical page of
//! the document and always starts on a fresh physical A4 page. Blocks are
//! broken into units (a wrapped line, a table row, a signature block) and
//! units are flowed down the page. When the next unit does not fit, a
//! continuation page is opened, so long lists spill onto extra pages instead
//! of being clipped. Every unit is placed exactly once.

use tracing::debug;

use super::metrics::{line_height_mm, sanitize, text_width_mm, wrap, Font};

// ============================================================================
// Constants
// ============================================================================

/// A4 dimensions in mm
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

pub const MARGIN_MM: f32 = 18.0;
pub const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// Letterhead band at the top of every page
const HEADER_HEIGHT_MM: f32 = 20.0;
/// Page number band at the bottom of every page
const FOOTER_HEIGHT_MM: f32 = 10.0;

pub const BODY_TOP_MM: f32 = MARGIN_MM + HEADER_HEIGHT_MM;
pub const BODY_BOTTOM_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM - FOOTER_HEIGHT_MM;

/// Font sizes in points
const LETTERHEAD_FONT_SIZE: f32 = 14.0;
const TITLE_FONT_SIZE: f32 = 15.0;
const HEADING_FONT_SIZE: f32 = 11.5;
pub const NORMAL_FONT_SIZE: f32 = 10.0;
const SMALL_FONT_SIZE: f32 = 8.0;

/// Label column of key/value blocks
const FIELD_LABEL_WIDTH_MM: f32 = 55.0;
/// Indent for the text of numbered items
const LIST_INDENT_MM: f32 = 9.0;
const CELL_PADDING_MM: f32 = 1.5;

/// Signature slot size
pub const SIGNATURE_WIDTH_MM: f32 = 48.0;
pub const SIGNATURE_HEIGHT_MM: f32 = 18.0;
const SIGNATURE_BLOCK_HEIGHT_MM: f32 = 36.0;

// ============================================================================
// Template model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub title: String,
    /// Share of the content width
    pub ratio: f32,
    pub align: Align,
}

impl Column {
    pub fn left(title: impl Into<String>, ratio: f32) -> Self {
        Self {
            title: title.into(),
            ratio,
            align: Align::Left,
        }
    }

    pub fn right(title: impl Into<String>, ratio: f32) -> Self {
        Self {
            title: title.into(),
            ratio,
            align: Align::Right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub footer: Option<Vec<String>>,
}

/// One signing party in a signature block.
#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub caption: String,
    pub name: String,
    /// Whether the buyer's signature raster goes above this party's line.
    pub buyer_signature: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Paragraph(String),
    /// Label/value rows
    Fields(Vec<(String, String)>),
    Table(Table),
    /// Enumerated list, numbered from 1
    Numbered(Vec<String>),
    Signatures(Vec<Party>),
    Spacer(f32),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub blocks: Vec<Block>,
}

impl Section {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub title: String,
    pub letterhead: String,
    pub letterhead_detail: String,
    /// Printed next to the page number
    pub footer_note: String,
    pub sections: Vec<Section>,
}

impl Template {
    /// Whether any section carries a slot for the buyer's signature.
    #[must_use]
    pub fn wants_buyer_signature(&self) -> bool {
        self.sections.iter().any(|section| {
            section.blocks.iter().any(|block| {
                matches!(block, Block::Signatures(parties) if parties.iter().any(|p| p.buyer_signature))
            })
        })
    }
}

// ============================================================================
// Positioned output
// ============================================================================

/// Drawing operation. `y` is measured down from the top edge of the page;
/// text `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        text: String,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
        gray: f32,
    },
    SignatureSlot {
        x: f32,
        y_top: f32,
        width: f32,
        height: f32,
    },
}

impl Op {
    fn shifted(&self, dy: f32) -> Self {
        match self {
            Self::Text {
                x,
                y,
                size,
                font,
                text,
            } => Self::Text {
                x: *x,
                y: y + dy,
                size: *size,
                font: *font,
                text: text.clone(),
            },
            Self::Line {
                x1,
                y1,
                x2,
                y2,
                thickness,
                gray,
            } => Self::Line {
                x1: *x1,
                y1: y1 + dy,
                x2: *x2,
                y2: y2 + dy,
                thickness: *thickness,
                gray: *gray,
            },
            Self::SignatureSlot {
                x,
                y_top,
                width,
                height,
            } => Self::SignatureSlot {
                x: *x,
                y_top: y_top + dy,
                width: *width,
                height: *height,
            },
        }
    }
}

/// One physical page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based physical page number
    pub number: usize,
    /// Index of the logical section this page belongs to
    pub section: usize,
    pub ops: Vec<Op>,
}

impl Page {
    /// Body text in drawing order, excluding letterhead and footer.
    #[must_use]
    pub fn body_text(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Text { y, text, .. } if *y > BODY_TOP_MM && *y <= BODY_BOTTOM_MM => {
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn signature_slots(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::SignatureSlot { .. }))
            .count()
    }
}

// ============================================================================
// Units
// ============================================================================

/// The smallest piece that is never split across pages.
struct Unit {
    height: f32,
    /// Headings stay on the same page as what follows them.
    keep_with_next: bool,
    /// Ops relative to the unit's top edge
    ops: Vec<Op>,
}

impl Unit {
    fn new(height: f32) -> Self {
        Self {
            height,
            keep_with_next: false,
            ops: Vec::new(),
        }
    }

    fn text(&mut self, x: f32, top: f32, size: f32, font: Font, text: &str) {
        self.ops.push(Op::Text {
            x,
            y: top + baseline_offset(size),
            size,
            font,
            text: text.to_string(),
        });
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32, thickness: f32, gray: f32) {
        self.ops.push(Op::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            thickness,
            gray,
        });
    }
}

fn baseline_offset(size: f32) -> f32 {
    line_height_mm(size) * 0.75
}

fn block_units(block: &Block) -> Vec<Unit> {
    match block {
        Block::Title(text) => {
            let text = sanitize(text);
            let lh = line_height_mm(TITLE_FONT_SIZE);
            let mut unit = Unit::new(lh + 4.0);
            let width = text_width_mm(&text, TITLE_FONT_SIZE, Font::Bold);
            let x = MARGIN_MM + ((CONTENT_WIDTH_MM - width) / 2.0).max(0.0);
            unit.text(x, 1.0, TITLE_FONT_SIZE, Font::Bold, &text);
            unit.keep_with_next = true;
            vec![unit]
        }
        Block::Heading(text) => {
            let lh = line_height_mm(HEADING_FONT_SIZE);
            wrap(&sanitize(text), CONTENT_WIDTH_MM, HEADING_FONT_SIZE, Font::Bold)
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let top_gap = if i == 0 { 3.0 } else { 0.0 };
                    let mut unit = Unit::new(lh + top_gap);
                    unit.text(MARGIN_MM, top_gap, HEADING_FONT_SIZE, Font::Bold, line);
                    unit.keep_with_next = true;
                    unit
                })
                .collect()
        }
        Block::Paragraph(text) => paragraph_units(text),
        Block::Fields(fields) => fields.iter().map(|(k, v)| field_unit(k, v)).collect(),
        Block::Table(table) => table_units(table),
        Block::Numbered(items) => items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| numbered_units(i + 1, item))
            .collect(),
        Block::Signatures(parties) => vec![signature_unit(parties)],
        Block::Spacer(height) => vec![Unit::new(*height)],
    }
}

fn paragraph_units(text: &str) -> Vec<Unit> {
    let lh = line_height_mm(NORMAL_FONT_SIZE);
    let mut units = Vec::new();
    for raw_line in text.split('\n') {
        for line in wrap(&sanitize(raw_line), CONTENT_WIDTH_MM, NORMAL_FONT_SIZE, Font::Regular) {
            let mut unit = Unit::new(lh);
            unit.text(MARGIN_MM, 0.0, NORMAL_FONT_SIZE, Font::Regular, &line);
            units.push(unit);
        }
    }
    if let Some(last) = units.last_mut() {
        last.height += 2.0;
    }
    units
}

fn field_unit(label: &str, value: &str) -> Unit {
    let lh = line_height_mm(NORMAL_FONT_SIZE);
    let value_x = MARGIN_MM + FIELD_LABEL_WIDTH_MM;
    let labels = wrap(
        &sanitize(label),
        FIELD_LABEL_WIDTH_MM - 3.0,
        NORMAL_FONT_SIZE,
        Font::Bold,
    );
    let values = wrap(
        &sanitize(value),
        CONTENT_WIDTH_MM - FIELD_LABEL_WIDTH_MM,
        NORMAL_FONT_SIZE,
        Font::Regular,
    );
    let rows = labels.len().max(values.len());
    let mut unit = Unit::new(rows as f32 * lh + 1.0);
    for (i, line) in labels.iter().enumerate() {
        unit.text(MARGIN_MM, i as f32 * lh, NORMAL_FONT_SIZE, Font::Bold, line);
    }
    for (i, line) in values.iter().enumerate() {
        unit.text(value_x, i as f32 * lh, NORMAL_FONT_SIZE, Font::Regular, line);
    }
    unit
}

fn table_units(table: &Table) -> Vec<Unit> {
    let total_ratio: f32 = table.columns.iter().map(|c| c.ratio).sum::<f32>().max(f32::EPSILON);
    let widths: Vec<f32> = table
        .columns
        .iter()
        .map(|c| CONTENT_WIDTH_MM * c.ratio / total_ratio)
        .collect();
    let right = MARGIN_MM + CONTENT_WIDTH_MM;

    let titles: Vec<String> = table.columns.iter().map(|c| c.title.clone()).collect();
    let mut header = table_row(table, &widths, &titles, Font::Bold);
    header.rule(MARGIN_MM, right, 0.0, 0.6, 0.0);
    header.rule(MARGIN_MM, right, header.height, 0.6, 0.0);
    header.keep_with_next = true;

    let mut units = vec![header];
    for row in &table.rows {
        let mut unit = table_row(table, &widths, row, Font::Regular);
        unit.rule(MARGIN_MM, right, unit.height, 0.3, 0.75);
        units.push(unit);
    }
    if let Some(footer) = &table.footer {
        let mut unit = table_row(table, &widths, footer, Font::Bold);
        unit.rule(MARGIN_MM, right, unit.height, 0.6, 0.0);
        units.push(unit);
    }
    if let Some(last) = units.last_mut() {
        last.height += 3.0;
    }
    units
}

fn table_row(table: &Table, widths: &[f32], cells: &[String], font: Font) -> Unit {
    let lh = line_height_mm(NORMAL_FONT_SIZE);
    let wrapped: Vec<Vec<String>> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            wrap(
                &sanitize(cell),
                width - 2.0 * CELL_PADDING_MM,
                NORMAL_FONT_SIZE,
                font,
            )
        })
        .collect();
    let rows = wrapped.iter().map(Vec::len).max().unwrap_or(1);
    let mut unit = Unit::new(rows as f32 * lh + 2.0 * CELL_PADDING_MM);

    let mut x = MARGIN_MM;
    for ((lines, width), column) in wrapped.iter().zip(widths).zip(&table.columns) {
        for (i, line) in lines.iter().enumerate() {
            let line_x = match column.align {
                Align::Left => x + CELL_PADDING_MM,
                Align::Right => {
                    x + width - CELL_PADDING_MM - text_width_mm(line, NORMAL_FONT_SIZE, font)
                }
            };
            unit.text(
                line_x,
                CELL_PADDING_MM + i as f32 * lh,
                NORMAL_FONT_SIZE,
                font,
                line,
            );
        }
        x += width;
    }
    unit
}

fn numbered_units(number: usize, item: &str) -> Vec<Unit> {
    let lh = line_height_mm(NORMAL_FONT_SIZE);
    let lines = wrap(
        &sanitize(item),
        CONTENT_WIDTH_MM - LIST_INDENT_MM,
        NORMAL_FONT_SIZE,
        Font::Regular,
    );
    let count = lines.len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut unit = Unit::new(lh);
            if i == 0 {
                unit.text(
                    MARGIN_MM,
                    0.0,
                    NORMAL_FONT_SIZE,
                    Font::Regular,
                    &format!("{number}."),
                );
            }
            unit.text(MARGIN_MM + LIST_INDENT_MM, 0.0, NORMAL_FONT_SIZE, Font::Regular, line);
            if i + 1 == count {
                unit.height += 1.5;
            }
            unit
        })
        .collect()
}

fn signature_unit(parties: &[Party]) -> Unit {
    let mut unit = Unit::new(SIGNATURE_BLOCK_HEIGHT_MM);
    let count = parties.len().max(1) as f32;
    let column_width = CONTENT_WIDTH_MM / count;
    let line_y = 6.0 + SIGNATURE_HEIGHT_MM + 1.0;

    for (i, party) in parties.iter().enumerate() {
        let x = MARGIN_MM + i as f32 * column_width;
        if party.buyer_signature {
            unit.ops.push(Op::SignatureSlot {
                x,
                y_top: 6.0,
                width: SIGNATURE_WIDTH_MM,
                height: SIGNATURE_HEIGHT_MM,
            });
        }
        unit.rule(x, x + SIGNATURE_WIDTH_MM + 12.0, line_y, 0.4, 0.0);
        unit.text(x, line_y + 1.0, NORMAL_FONT_SIZE, Font::Bold, &sanitize(&party.caption));
        unit.text(x, line_y + 5.5, NORMAL_FONT_SIZE, Font::Regular, &sanitize(&party.name));
    }
    unit
}

// ============================================================================
// Pagination
// ============================================================================

fn page_frame(template: &Template) -> Vec<Op> {
    let mut frame = Unit::new(HEADER_HEIGHT_MM);
    let letterhead = sanitize(&template.letterhead);
    let width = text_width_mm(&letterhead, LETTERHEAD_FONT_SIZE, Font::Bold);
    frame.text(
        MARGIN_MM + ((CONTENT_WIDTH_MM - width) / 2.0).max(0.0),
        0.0,
        LETTERHEAD_FONT_SIZE,
        Font::Bold,
        &letterhead,
    );
    let detail = sanitize(&template.letterhead_detail);
    let detail_width = text_width_mm(&detail, SMALL_FONT_SIZE, Font::Regular);
    frame.text(
        MARGIN_MM + ((CONTENT_WIDTH_MM - detail_width) / 2.0).max(0.0),
        7.5,
        SMALL_FONT_SIZE,
        Font::Regular,
        &detail,
    );
    frame.rule(MARGIN_MM, MARGIN_MM + CONTENT_WIDTH_MM, 13.0, 0.8, 0.0);
    frame.ops.iter().map(|op| op.shifted(MARGIN_MM)).collect()
}

fn footer_ops(template: &Template, number: usize, total: usize) -> Vec<Op> {
    let y = PAGE_HEIGHT_MM - MARGIN_MM;
    let label = format!("Page {number} of {total}");
    let label_width = text_width_mm(&label, SMALL_FONT_SIZE, Font::Regular);
    let mut ops = vec![
        Op::Line {
            x1: MARGIN_MM,
            y1: y - 5.0,
            x2: MARGIN_MM + CONTENT_WIDTH_MM,
            y2: y - 5.0,
            thickness: 0.3,
            gray: 0.6,
        },
        Op::Text {
            x: MARGIN_MM + CONTENT_WIDTH_MM - label_width,
            y,
            size: SMALL_FONT_SIZE,
            font: Font::Regular,
            text: label,
        },
    ];
    if !template.footer_note.is_empty() {
        ops.push(Op::Text {
            x: MARGIN_MM,
            y,
            size: SMALL_FONT_SIZE,
            font: Font::Regular,
            text: sanitize(&template.footer_note),
        });
    }
    ops
}

/// Lays the template out on A4 pages, in section order.
#[must_use]
pub fn paginate(template: &Template) -> Vec<Page> {
    let frame = page_frame(template);
    let body_height = BODY_BOTTOM_MM - BODY_TOP_MM;
    let mut pages: Vec<Page> = Vec::new();

    for (section_index, section) in template.sections.iter().enumerate() {
        let units: Vec<Unit> = section.blocks.iter().flat_map(block_units).collect();
        let mut page = Page {
            number: pages.len() + 1,
            section: section_index,
            ops: frame.clone(),
        };
        let mut cursor = BODY_TOP_MM;
        let mut index = 0;

        while index < units.len() {
            // A heading pulls the units it is glued to onto its page.
            let mut end = index;
            while units[end].keep_with_next && end + 1 < units.len() {
                end += 1;
            }
            let mut group_height: f32 = units[index..=end].iter().map(|u| u.height).sum();
            if group_height > body_height {
                end = index;
                group_height = units[index].height;
            }

            if cursor + group_height > BODY_BOTTOM_MM && cursor > BODY_TOP_MM {
                debug!(page = page.number, section = section_index, "Page full, continuing");
                let next_number = page.number + 1;
                pages.push(std::mem::replace(
                    &mut page,
                    Page {
                        number: next_number,
                        section: section_index,
                        ops: frame.clone(),
                    },
                ));
                cursor = BODY_TOP_MM;
            }

            for unit in &units[index..=end] {
                page.ops.extend(unit.ops.iter().map(|op| op.shifted(cursor)));
                cursor += unit.height;
            }
            index = end + 1;
        }
        pages.push(page);
    }

    let total = pages.len();
    for page in &mut pages {
        page.ops.extend(footer_ops(template, page.number, total));
    }
    pages
}
