//! Excel (.xlsx) writer for single-sheet tables

use super::{content_types, escape_xml, root_relationships, write_package};
use crate::error::Result;

const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Font 0 is regular, font 1 bold; style 1 refers to the bold font
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

#[derive(Debug, Clone)]
struct Row {
    cells: Vec<Cell>,
    bold: bool,
}

/// Builds a one-sheet workbook row by row
#[derive(Debug, Clone)]
pub struct XlsxBuilder {
    sheet_name: String,
    rows: Vec<Row>,
    widths: Vec<(usize, f64)>,
    merges: Vec<String>,
}

impl XlsxBuilder {
    pub fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_title(sheet_name),
            rows: Vec::new(),
            widths: Vec::new(),
            merges: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<Cell>) -> &mut Self {
        self.rows.push(Row { cells, bold: false });
        self
    }

    pub fn bold_row(&mut self, cells: Vec<Cell>) -> &mut Self {
        self.rows.push(Row { cells, bold: true });
        self
    }

    pub fn blank_row(&mut self) -> &mut Self {
        self.row(Vec::new())
    }

    /// Width of the zero-based column `col`, in characters
    pub fn column_width(&mut self, col: usize, width: f64) -> &mut Self {
        self.widths.push((col, width));
        self
    }

    /// Merge `first..=last` columns of the zero-based row `row`
    pub fn merge_row(&mut self, row: usize, first: usize, last: usize) -> &mut Self {
        self.merges.push(format!(
            "{}:{}",
            cell_ref(row, first),
            cell_ref(row, last)
        ));
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize the workbook into .xlsx bytes
    pub fn build(&self) -> Result<Vec<u8>> {
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            escape_xml(&self.sheet_name)
        );

        let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#
            .to_string();

        write_package(&[
            (
                "[Content_Types].xml",
                content_types(&[
                    ("/xl/workbook.xml", WORKBOOK_CONTENT_TYPE),
                    ("/xl/worksheets/sheet1.xml", WORKSHEET_CONTENT_TYPE),
                    ("/xl/styles.xml", STYLES_CONTENT_TYPE),
                ]),
            ),
            ("_rels/.rels", root_relationships("xl/workbook.xml")),
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", workbook_rels),
            ("xl/styles.xml", STYLES_XML.to_string()),
            ("xl/worksheets/sheet1.xml", self.sheet_xml()),
        ])
    }

    fn sheet_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if !self.widths.is_empty() {
            let mut widths = self.widths.clone();
            widths.sort_by_key(|(col, _)| *col);
            xml.push_str("<cols>");
            for (col, width) in widths {
                xml.push_str(&format!(
                    r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
                    col + 1,
                    width
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (r, row) in self.rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            let style = if row.bold { r#" s="1""# } else { "" };
            for (c, cell) in row.cells.iter().enumerate() {
                let reference = cell_ref(r, c);
                match cell {
                    Cell::Text(text) => xml.push_str(&format!(
                        r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        reference,
                        style,
                        escape_xml(text)
                    )),
                    Cell::Number(value) => xml.push_str(&format!(
                        r#"<c r="{}"{}><v>{}</v></c>"#,
                        reference, style, value
                    )),
                    Cell::Empty => {}
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");

        if !self.merges.is_empty() {
            xml.push_str(&format!(r#"<mergeCells count="{}">"#, self.merges.len()));
            for range in &self.merges {
                xml.push_str(&format!(r#"<mergeCell ref="{}"/>"#, range));
            }
            xml.push_str("</mergeCells>");
        }

        xml.push_str("</worksheet>");
        xml
    }
}

/// Spreadsheet column letters for a zero-based index (0 -> A, 26 -> AA)
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Sheet titles are limited to 31 characters and a restricted character set
fn sheet_title(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}
