//! Minimal SpreadsheetML writer: one worksheet, inline strings, a fixed
//! style table. Output goes through a temporary file that is renamed into
//! place, so a failed write never leaves a partial workbook behind.
use crate::error::SheetError;
use crate::helpers::xml::XmlPart;
use crate::helpers::zip::ZipWriterHelper;
use crate::spreadsheet::cell::to_excel_serial;
use crate::spreadsheet::reference::index_to_reference;
use chrono::NaiveDateTime;
use std::path::Path;
use zip::ZipWriter;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// Number format of timestamp cells
pub(crate) const DATETIME_FORMAT: &str = "dd-mmm-yyyy hh:mm:ss";
/// Number format of reading cells
pub(crate) const READING_FORMAT: &str = "0.0";

/// Cell styles of the fixed style table, in `cellXfs` order
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum CellStyle {
    Plain,
    /// Bold, centered, wrapped, thin border
    Header,
    /// Centered, wrapped, thin border
    Unit,
    /// Date-time number format, centered, thin border
    Timestamp,
    /// One-decimal number format, centered, thin border
    Reading,
}

impl CellStyle {
    fn index(&self) -> usize {
        match self {
            Self::Plain => 0,
            Self::Header => 1,
            Self::Unit => 2,
            Self::Timestamp => 3,
            Self::Reading => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CellValue {
    Text(String),
    DateTime(NaiveDateTime),
    Number(f64),
}

/// A worksheet to be written: column widths and rows of styled cells
#[derive(Debug, Default)]
pub(crate) struct OutputSheet {
    pub(crate) name: String,
    /// Width of each column from column A on
    pub(crate) widths: Vec<f64>,
    pub(crate) rows: Vec<Vec<Option<(CellValue, CellStyle)>>>,
}

/// Writes `sheet` as the only worksheet of a new workbook at `path`.
pub(crate) fn write_workbook(path: &Path, sheet: &OutputSheet) -> Result<(), SheetError> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".trend-sheet-")
        .suffix(".tmp")
        .tempfile_in(directory)?;

    let mut zip = ZipWriter::new(file);
    zip.put_part("[Content_Types].xml", &content_types()?)?;
    zip.put_part("_rels/.rels", &package_relationships()?)?;
    zip.put_part("xl/workbook.xml", &workbook(&sheet.name)?)?;
    zip.put_part("xl/_rels/workbook.xml.rels", &workbook_relationships()?)?;
    zip.put_part("xl/styles.xml", &styles()?)?;
    zip.put_part("xl/worksheets/sheet1.xml", &worksheet(sheet)?)?;
    let file = zip.finish()?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

fn content_types() -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    part.empty("Default", &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")])?;
    part.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    part.empty("Override", &[("PartName", "/xl/workbook.xml"), ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml")])?;
    part.empty("Override", &[("PartName", "/xl/worksheets/sheet1.xml"), ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml")])?;
    part.empty("Override", &[("PartName", "/xl/styles.xml"), ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml")])?;
    part.close("Types")?;
    Ok(part.into_bytes())
}

fn package_relationships() -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?;
    part.empty("Relationship", &[("Id", "rId1"), ("Type", REL_OFFICE_DOCUMENT), ("Target", "xl/workbook.xml")])?;
    part.close("Relationships")?;
    Ok(part.into_bytes())
}

fn workbook(sheet_name: &str) -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)])?;
    part.empty("workbookPr", &[("date1904", "false")])?;
    part.open("sheets", &[])?;
    part.empty("sheet", &[("name", sheet_name), ("sheetId", "1"), ("r:id", "rId1")])?;
    part.close("sheets")?;
    part.close("workbook")?;
    Ok(part.into_bytes())
}

fn workbook_relationships() -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?;
    part.empty("Relationship", &[("Id", "rId1"), ("Type", REL_WORKSHEET), ("Target", "worksheets/sheet1.xml")])?;
    part.empty("Relationship", &[("Id", "rId2"), ("Type", REL_STYLES), ("Target", "styles.xml")])?;
    part.close("Relationships")?;
    Ok(part.into_bytes())
}

fn styles() -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("styleSheet", &[("xmlns", NS_MAIN)])?;

    part.open("numFmts", &[("count", "2")])?;
    part.empty("numFmt", &[("numFmtId", "164"), ("formatCode", DATETIME_FORMAT)])?;
    part.empty("numFmt", &[("numFmtId", "165"), ("formatCode", READING_FORMAT)])?;
    part.close("numFmts")?;

    part.open("fonts", &[("count", "2")])?;
    for bold in [false, true] {
        part.open("font", &[])?;
        if bold {
            part.empty("b", &[])?;
        }
        part.empty("sz", &[("val", "11")])?;
        part.empty("name", &[("val", "Calibri")])?;
        part.close("font")?;
    }
    part.close("fonts")?;

    // The first two fills are reserved by Excel
    part.open("fills", &[("count", "2")])?;
    for pattern in ["none", "gray125"] {
        part.open("fill", &[])?;
        part.empty("patternFill", &[("patternType", pattern)])?;
        part.close("fill")?;
    }
    part.close("fills")?;

    part.open("borders", &[("count", "2")])?;
    part.open("border", &[])?;
    for side in ["left", "right", "top", "bottom", "diagonal"] {
        part.empty(side, &[])?;
    }
    part.close("border")?;
    part.open("border", &[])?;
    for side in ["left", "right", "top", "bottom"] {
        part.open(side, &[("style", "thin")])?;
        part.empty("color", &[("auto", "1")])?;
        part.close(side)?;
    }
    part.empty("diagonal", &[])?;
    part.close("border")?;
    part.close("borders")?;

    part.open("cellStyleXfs", &[("count", "1")])?;
    part.empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")])?;
    part.close("cellStyleXfs")?;

    // (numFmtId, fontId, wrapText), in CellStyle order after Plain
    let bordered = [("0", "1", true), ("0", "0", true), ("164", "0", false), ("165", "0", false)];
    part.open("cellXfs", &[("count", "5")])?;
    part.empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0"), ("xfId", "0")])?;
    for (format_id, font_id, wrap) in bordered {
        part.open("xf", &[
            ("numFmtId", format_id),
            ("fontId", font_id),
            ("fillId", "0"),
            ("borderId", "1"),
            ("xfId", "0"),
            ("applyNumberFormat", "1"),
            ("applyFont", "1"),
            ("applyBorder", "1"),
            ("applyAlignment", "1"),
        ])?;
        let mut alignment = vec![("horizontal", "center"), ("vertical", "center")];
        if wrap {
            alignment.push(("wrapText", "1"));
        }
        part.empty("alignment", &alignment)?;
        part.close("xf")?;
    }
    part.close("cellXfs")?;

    part.open("cellStyles", &[("count", "1")])?;
    part.empty("cellStyle", &[("name", "Normal"), ("xfId", "0"), ("builtinId", "0")])?;
    part.close("cellStyles")?;

    part.close("styleSheet")?;
    Ok(part.into_bytes())
}

fn worksheet(sheet: &OutputSheet) -> Result<Vec<u8>, SheetError> {
    let mut part = XmlPart::new()?;
    part.open("worksheet", &[("xmlns", NS_MAIN)])?;

    if !sheet.widths.is_empty() {
        part.open("cols", &[])?;
        for (index, width) in sheet.widths.iter().enumerate() {
            let col = (index + 1).to_string();
            let width = width.to_string();
            part.empty("col", &[("min", col.as_str()), ("max", col.as_str()), ("width", width.as_str()), ("customWidth", "1")])?;
        }
        part.close("cols")?;
    }

    part.open("sheetData", &[])?;
    for (row, cells) in sheet.rows.iter().enumerate() {
        let row_number = (row + 1).to_string();
        part.open("row", &[("r", row_number.as_str())])?;
        for (col, cell) in cells.iter().enumerate() {
            if let Some((value, style)) = cell {
                write_cell(&mut part, &index_to_reference(row, col), value, *style)?;
            }
        }
        part.close("row")?;
    }
    part.close("sheetData")?;

    part.close("worksheet")?;
    Ok(part.into_bytes())
}

fn write_cell(part: &mut XmlPart, reference: &str, value: &CellValue, style: CellStyle) -> Result<(), SheetError> {
    let style = style.index().to_string();
    match value {
        CellValue::Number(number) if number.is_finite() => write_number(part, reference, &style, *number),
        CellValue::Number(_) => Ok(()),
        CellValue::Text(text) => write_inline_string(part, reference, &style, text),
        CellValue::DateTime(datetime) => match to_excel_serial(datetime) {
            Some(serial) => write_number(part, reference, &style, serial),
            // Dates before 1900-03-01 have no unambiguous serial
            None => write_inline_string(part, reference, &style, &datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
        },
    }
}

fn write_number(part: &mut XmlPart, reference: &str, style: &str, number: f64) -> Result<(), SheetError> {
    part.open("c", &[("r", reference), ("s", style)])?;
    part.text("v", &[], &number.to_string())?;
    part.close("c")
}

fn write_inline_string(part: &mut XmlPart, reference: &str, style: &str, text: &str) -> Result<(), SheetError> {
    part.open("c", &[("r", reference), ("s", style), ("t", "inlineStr")])?;
    part.open("is", &[])?;
    part.text("t", &[], text)?;
    part.close("is")?;
    part.close("c")
}
