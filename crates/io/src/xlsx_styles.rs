//! Template formatting reader.
//!
//! calamine only surfaces values, so the look of a template is read straight
//! from the xlsx package: `xl/styles.xml` gives the cell formats (cellXfs),
//! and each worksheet part gives per-cell style ids, merged ranges, column
//! widths and row heights.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tallygrid_engine::cell::{
    BorderStyle, CellBorders, CellFormat, HorizontalAlign, NumberFormat, VerticalAlign,
};
use tallygrid_engine::sheet::MergedRange;
use zip::ZipArchive;

use crate::error::XlsxError;

/// Layout and style references of one worksheet part.
#[derive(Debug, Default)]
pub struct SheetFormatting {
    /// (row, col, style id), zero-based. Style id 0 (the default) is omitted.
    pub cell_styles: Vec<(usize, usize, usize)>,
    pub merged: Vec<MergedRange>,
    pub col_widths: Vec<(usize, f64)>,
    pub row_heights: Vec<(usize, f64)>,
}

/// Formatting recovered from a template package.
#[derive(Debug, Default)]
pub struct TemplateFormatting {
    /// Resolved cellXfs, indexed by style id
    pub styles: Vec<CellFormat>,
    /// One entry per requested sheet name, same order
    pub sheets: Vec<SheetFormatting>,
}

impl TemplateFormatting {
    pub fn style(&self, id: usize) -> Option<&CellFormat> {
        self.styles.get(id)
    }
}

/// Read formatting for `sheet_names` from xlsx bytes.
///
/// Sheets whose part cannot be located get empty formatting. A package with
/// no styles part yields no styles.
pub fn read_formatting(bytes: &[u8], sheet_names: &[String]) -> Result<TemplateFormatting, XlsxError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| XlsxError::Package(e.to_string()))?;

    let styles = match read_part(&mut archive, "xl/styles.xml") {
        Some(xml) => parse_styles(&xml),
        None => Vec::new(),
    };

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let paths = worksheet_paths(&workbook_xml, &rels_xml, sheet_names);

    let sheets = paths
        .iter()
        .zip(sheet_names)
        .map(|(path, name)| {
            match path.as_deref().and_then(|p| read_part(&mut archive, p)) {
                Some(xml) => parse_sheet(&xml),
                None => {
                    log::debug!("sheet '{name}': worksheet part not found, formatting skipped");
                    SheetFormatting::default()
                }
            }
        })
        .collect();

    Ok(TemplateFormatting { styles, sheets })
}

// ============================================================================
// styles.xml
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Font {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    name: Option<String>,
    size: Option<f64>,
    color: Option<u32>,
}

#[derive(Debug, Default)]
struct Xf {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    h_align: Option<HorizontalAlign>,
    v_align: Option<VerticalAlign>,
    wrap_text: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
}

/// Accumulates the styles.xml sections while the reader walks the document.
#[derive(Default)]
struct StylesParser {
    section: Option<Section>,
    num_fmts: HashMap<u16, String>,
    fonts: Vec<Font>,
    fills: Vec<Option<u32>>,
    borders: Vec<CellBorders>,
    xfs: Vec<Xf>,
    font: Font,
    fill: Option<u32>,
    solid_fill: bool,
    border: CellBorders,
    xf: Xf,
}

impl StylesParser {
    fn open(&mut self, e: &BytesStart, empty: bool) {
        let name = e.local_name();
        let Some(section) = self.section else {
            if !empty {
                self.section = match name.as_ref() {
                    b"numFmts" => Some(Section::NumFmts),
                    b"fonts" => Some(Section::Fonts),
                    b"fills" => Some(Section::Fills),
                    b"borders" => Some(Section::Borders),
                    b"cellXfs" => Some(Section::CellXfs),
                    _ => None,
                };
            }
            return;
        };

        match (section, name.as_ref()) {
            (Section::NumFmts, b"numFmt") => {
                if let (Some(id), Some(code)) = (attr_parse::<u16>(e, b"numFmtId"), attr(e, b"formatCode")) {
                    self.num_fmts.insert(id, code);
                }
            }

            (Section::Fonts, b"font") => self.font = Font::default(),
            (Section::Fonts, b"b") => self.font.bold = flag_val(e),
            (Section::Fonts, b"i") => self.font.italic = flag_val(e),
            (Section::Fonts, b"strike") => self.font.strikethrough = flag_val(e),
            (Section::Fonts, b"u") => self.font.underline = attr(e, b"val").as_deref() != Some("none"),
            (Section::Fonts, b"sz") => self.font.size = attr_parse(e, b"val"),
            (Section::Fonts, b"name") => self.font.name = attr(e, b"val"),
            (Section::Fonts, b"color") => self.font.color = color(e),

            (Section::Fills, b"fill") => {
                self.fill = None;
                self.solid_fill = false;
            }
            (Section::Fills, b"patternFill") => {
                self.solid_fill = attr(e, b"patternType").as_deref() == Some("solid");
            }
            (Section::Fills, b"fgColor") if self.solid_fill => self.fill = color(e),

            (Section::Borders, b"border") => self.border = CellBorders::default(),
            (Section::Borders, side @ (b"top" | b"right" | b"bottom" | b"left")) => {
                let style = attr(e, b"style").as_deref().and_then(border_style);
                match side {
                    b"top" => self.border.top = style,
                    b"right" => self.border.right = style,
                    b"bottom" => self.border.bottom = style,
                    _ => self.border.left = style,
                }
            }

            (Section::CellXfs, b"xf") => {
                self.xf = Xf {
                    num_fmt_id: attr_parse(e, b"numFmtId"),
                    font_id: attr_parse(e, b"fontId"),
                    fill_id: attr_parse(e, b"fillId"),
                    border_id: attr_parse(e, b"borderId"),
                    ..Xf::default()
                };
            }
            (Section::CellXfs, b"alignment") => {
                self.xf.h_align = attr(e, b"horizontal").as_deref().and_then(horizontal_align);
                self.xf.v_align = attr(e, b"vertical").as_deref().and_then(vertical_align);
                self.xf.wrap_text = attr(e, b"wrapText").as_deref().map_or(false, is_true);
            }
            _ => {}
        }

        // A self-closing entry is complete as soon as it opens
        if empty {
            self.close(name.as_ref());
        }
    }

    fn close(&mut self, name: &[u8]) {
        match (self.section, name) {
            (_, b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs") => self.section = None,
            (Some(Section::Fonts), b"font") => self.fonts.push(std::mem::take(&mut self.font)),
            (Some(Section::Fills), b"fill") => self.fills.push(self.fill.take()),
            (Some(Section::Borders), b"border") => {
                self.borders.push(std::mem::take(&mut self.border));
            }
            (Some(Section::CellXfs), b"xf") => self.xfs.push(std::mem::take(&mut self.xf)),
            _ => {}
        }
    }

    fn finish(self) -> Vec<CellFormat> {
        let default_font = self.fonts.first().cloned().unwrap_or_default();
        self.xfs
            .iter()
            .map(|xf| resolve_xf(xf, &self.num_fmts, &self.fonts, &default_font, &self.fills, &self.borders))
            .collect()
    }
}

/// Parse styles.xml into one `CellFormat` per cellXfs entry.
fn parse_styles(xml: &str) -> Vec<CellFormat> {
    let mut parser = StylesParser::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => parser.open(&e, false),
            Ok(Event::Empty(e)) => parser.open(&e, true),
            Ok(Event::End(e)) => parser.close(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!("styles.xml: {e}; keeping {} formats read so far", parser.xfs.len());
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    parser.finish()
}

fn resolve_xf(
    xf: &Xf,
    num_fmts: &HashMap<u16, String>,
    fonts: &[Font],
    default_font: &Font,
    fills: &[Option<u32>],
    borders: &[CellBorders],
) -> CellFormat {
    let mut format = CellFormat {
        number_format: xf.num_fmt_id.and_then(|id| number_format(id, num_fmts)),
        h_align: xf.h_align,
        v_align: xf.v_align,
        wrap_text: xf.wrap_text,
        ..CellFormat::default()
    };

    if let Some(font) = xf.font_id.and_then(|id| fonts.get(id)) {
        format.bold = font.bold;
        format.italic = font.italic;
        format.underline = font.underline;
        format.strikethrough = font.strikethrough;
        // The workbook default font is implied; only deviations are kept
        if font.color != default_font.color {
            format.font_color = font.color;
        }
        if font.name != default_font.name {
            format.font_name = font.name.clone();
        }
        if font.size != default_font.size {
            format.font_size = font.size;
        }
    }
    format.fill_color = xf.fill_id.and_then(|id| fills.get(id).copied().flatten());
    if let Some(border) = xf.border_id.and_then(|id| borders.get(id)) {
        format.borders = *border;
    }
    format
}

/// Custom codes come from `<numFmts>`; ids below 164 are Excel built-ins.
fn number_format(id: u16, custom: &HashMap<u16, String>) -> Option<NumberFormat> {
    if let Some(code) = custom.get(&id) {
        return Some(NumberFormat::Custom(code.clone()));
    }
    match id {
        0 => None,
        1..=163 => Some(NumberFormat::Builtin(id as u8)),
        _ => None,
    }
}

fn border_style(name: &str) -> Option<BorderStyle> {
    Some(match name {
        "thin" => BorderStyle::Thin,
        "medium" => BorderStyle::Medium,
        "dashed" => BorderStyle::Dashed,
        "dotted" => BorderStyle::Dotted,
        "thick" => BorderStyle::Thick,
        "double" => BorderStyle::Double,
        "hair" => BorderStyle::Hair,
        "mediumDashed" => BorderStyle::MediumDashed,
        "dashDot" => BorderStyle::DashDot,
        "mediumDashDot" => BorderStyle::MediumDashDot,
        "dashDotDot" => BorderStyle::DashDotDot,
        "mediumDashDotDot" => BorderStyle::MediumDashDotDot,
        "slantDashDot" => BorderStyle::SlantDashDot,
        _ => return None,
    })
}

fn horizontal_align(name: &str) -> Option<HorizontalAlign> {
    Some(match name {
        "left" => HorizontalAlign::Left,
        "center" => HorizontalAlign::Center,
        "right" => HorizontalAlign::Right,
        "fill" => HorizontalAlign::Fill,
        "justify" => HorizontalAlign::Justify,
        "centerContinuous" => HorizontalAlign::CenterAcross,
        "distributed" => HorizontalAlign::Distributed,
        _ => return None,
    })
}

fn vertical_align(name: &str) -> Option<VerticalAlign> {
    Some(match name {
        "top" => VerticalAlign::Top,
        "center" => VerticalAlign::Center,
        // bottom is Excel's default
        "bottom" => return None,
        "justify" => VerticalAlign::Justify,
        "distributed" => VerticalAlign::Distributed,
        _ => return None,
    })
}

// ============================================================================
// Colors
// ============================================================================

/// `rgb` wins over `theme`, which wins over `indexed`. Tints are ignored.
fn color(e: &BytesStart) -> Option<u32> {
    if let Some(rgb) = attr(e, b"rgb") {
        return argb(&rgb);
    }
    if let Some(idx) = attr_parse::<u8>(e, b"theme") {
        return theme_color(idx);
    }
    attr_parse::<u8>(e, b"indexed").and_then(indexed_color)
}

/// `AARRGGBB` or `RRGGBB` -> `0xRRGGBB`.
fn argb(hex: &str) -> Option<u32> {
    let hex = hex.trim_start_matches('#');
    let rgb = match hex.len() {
        8 => &hex[2..],
        6 => hex,
        _ => return None,
    };
    u32::from_str_radix(rgb, 16).ok()
}

/// Default Office theme
fn theme_color(idx: u8) -> Option<u32> {
    Some(match idx {
        0 => 0xFFFFFF,
        1 => 0x000000,
        2 => 0xE7E6E6,
        3 => 0x44546A,
        4 => 0x4472C4,
        5 => 0xED7D31,
        6 => 0xA5A5A5,
        7 => 0xFFC000,
        8 => 0x5B9BD5,
        9 => 0x70AD47,
        _ => return None,
    })
}

/// Legacy palette; 64 is the system foreground and has no fixed color.
fn indexed_color(idx: u8) -> Option<u32> {
    const PALETTE: [u32; 56] = [
        0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
        0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
        0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
        0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
        0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
        0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
        0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333,
    ];
    match idx {
        0..=7 => PALETTE.get(idx as usize).copied(),
        8..=63 => PALETTE.get(idx as usize - 8).copied(),
        _ => None,
    }
}

// ============================================================================
// Worksheet parts
// ============================================================================

fn parse_sheet(xml: &str) -> SheetFormatting {
    let mut formatting = SheetFormatting::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"c" => {
                    let style = attr_parse::<usize>(&e, b"s").filter(|&s| s > 0);
                    let cell = attr(&e, b"r").as_deref().and_then(parse_cell_ref);
                    if let (Some(style), Some((row, col))) = (style, cell) {
                        formatting.cell_styles.push((row, col, style));
                    }
                }
                b"row" => {
                    let row = attr_parse::<usize>(&e, b"r").and_then(|r| r.checked_sub(1));
                    let custom = attr(&e, b"customHeight").as_deref().map_or(false, is_true);
                    if let (true, Some(row), Some(height)) = (custom, row, attr_parse::<f64>(&e, b"ht")) {
                        formatting.row_heights.push((row, height));
                    }
                }
                b"col" => {
                    let min = attr_parse::<usize>(&e, b"min").and_then(|c| c.checked_sub(1));
                    let max = attr_parse::<usize>(&e, b"max").and_then(|c| c.checked_sub(1));
                    let custom = attr(&e, b"customWidth").as_deref().map_or(false, is_true);
                    if let (true, Some(min), Some(max), Some(width)) =
                        (custom, min, max, attr_parse::<f64>(&e, b"width"))
                    {
                        // `max` is often 16384 for "all remaining columns"
                        for col in min..=max.min(min + 255) {
                            formatting.col_widths.push((col, width));
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr(&e, b"ref").as_deref().and_then(parse_range_ref) {
                        formatting.merged.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!("worksheet xml: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    formatting
}

/// `"B5"` -> (4, 1). Absolute markers (`$`) are ignored.
pub fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let r = r.replace('$', "");
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// `"A2:C2"` -> merged range.
pub fn parse_range_ref(r: &str) -> Option<MergedRange> {
    let (start, end) = r.split_once(':')?;
    let (first_row, first_col) = parse_cell_ref(start)?;
    let (last_row, last_col) = parse_cell_ref(end)?;
    Some(MergedRange { first_row, first_col, last_row, last_col })
}

// ============================================================================
// Package helpers
// ============================================================================

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    match file.read_to_string(&mut content) {
        Ok(_) => Some(content),
        Err(e) => {
            log::debug!("cannot read '{path}': {e}");
            None
        }
    }
}

/// Worksheet part path for each sheet name, via workbook.xml and its rels.
fn worksheet_paths(workbook_xml: &str, rels_xml: &str, sheet_names: &[String]) -> Vec<Option<String>> {
    let mut rid_by_name: HashMap<String, String> = HashMap::new();
    for e in elements(workbook_xml, b"sheet") {
        if let (Some(name), Some(rid)) = (attr(&e, b"name"), attr(&e, b"id")) {
            rid_by_name.insert(name, rid);
        }
    }

    let mut target_by_rid: HashMap<String, String> = HashMap::new();
    for e in elements(rels_xml, b"Relationship") {
        if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
            target_by_rid.insert(id, target);
        }
    }

    sheet_names
        .iter()
        .map(|name| {
            let target = target_by_rid.get(rid_by_name.get(name)?)?;
            Some(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{target}"),
            })
        })
        .collect()
}

/// All elements named `local` in a document, start or empty.
fn elements(xml: &str, local: &[u8]) -> Vec<BytesStart<'static>> {
    let mut found = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == local => {
                found.push(e.into_owned());
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    found
}

/// Attribute value by local name, XML entities unescaped.
fn attr(e: &BytesStart, local: &[u8]) -> Option<String> {
    let raw = e
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)?;
    let value = String::from_utf8_lossy(&raw.value).into_owned();
    Some(match quick_xml::escape::unescape(&value) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => value,
    })
}

fn attr_parse<T: std::str::FromStr>(e: &BytesStart, local: &[u8]) -> Option<T> {
    attr(e, local)?.trim().parse().ok()
}

/// `<b/>` means on; `<b val="0"/>` means off.
fn flag_val(e: &BytesStart) -> bool {
    attr(e, b"val").as_deref().map_or(true, is_true)
}

fn is_true(value: &str) -> bool {
    value == "1" || value == "true"
}
