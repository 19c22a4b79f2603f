//! Word (.docx) writer

use super::{content_types, escape_xml, root_relationships, write_package};
use crate::error::Result;

const DOCUMENT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

/// Builds a simple Word document paragraph by paragraph
#[derive(Debug, Default, Clone)]
pub struct DocxBuilder {
    body: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Large bold centered line
    pub fn title(&mut self, text: &str) -> &mut Self {
        self.push(text, Some("center"), &["<w:b/>", "<w:sz w:val=\"48\"/>"], None)
    }

    /// Italic centered line
    pub fn subtitle(&mut self, text: &str) -> &mut Self {
        self.push(text, Some("center"), &["<w:i/>"], None)
    }

    /// Bold heading; level 1 is larger than level 2 and below
    pub fn heading(&mut self, text: &str, level: u8) -> &mut Self {
        let size = if level <= 1 {
            "<w:sz w:val=\"32\"/>"
        } else {
            "<w:sz w:val=\"26\"/>"
        };
        self.push(text, None, &["<w:b/>", size], None)
    }

    /// Body paragraph; single newlines become line breaks
    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        self.push(text, None, &[], None)
    }

    /// Indented bullet line
    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.push(&format!("\u{2022} {}", text), None, &[], Some(360))
    }

    /// Empty paragraph used as spacing
    pub fn spacer(&mut self) -> &mut Self {
        self.body.push("<w:p/>".to_string());
        self
    }

    /// Add markdown-ish text: blank-line separated blocks, `#` or `**bold**`
    /// blocks become level 2 headings, `-`/`*` lines become bullets
    pub fn rich_text(&mut self, text: &str) -> &mut Self {
        for block in text.split("\n\n") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }

            if block.starts_with('#') {
                self.heading(block.trim_start_matches('#').trim(), 2);
            } else if block.len() > 4 && block.starts_with("**") && block.ends_with("**") {
                self.heading(block.trim_matches('*').trim(), 2);
            } else if block
                .lines()
                .all(|line| line.trim_start().starts_with("- ") || line.trim_start().starts_with("* "))
            {
                for line in block.lines() {
                    self.bullet(line.trim_start()[2..].trim());
                }
            } else {
                self.paragraph(block);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Serialize the document into .docx bytes
    pub fn build(&self) -> Result<Vec<u8>> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
            self.body.concat()
        );

        write_package(&[
            (
                "[Content_Types].xml",
                content_types(&[("/word/document.xml", DOCUMENT_CONTENT_TYPE)]),
            ),
            ("_rels/.rels", root_relationships("word/document.xml")),
            ("word/document.xml", document),
        ])
    }

    fn push(
        &mut self,
        text: &str,
        justify: Option<&str>,
        run_props: &[&str],
        indent: Option<u32>,
    ) -> &mut Self {
        let mut paragraph = String::from("<w:p>");

        if justify.is_some() || indent.is_some() {
            paragraph.push_str("<w:pPr>");
            if let Some(left) = indent {
                paragraph.push_str(&format!("<w:ind w:left=\"{}\"/>", left));
            }
            if let Some(jc) = justify {
                paragraph.push_str(&format!("<w:jc w:val=\"{}\"/>", jc));
            }
            paragraph.push_str("</w:pPr>");
        }

        paragraph.push_str("<w:r>");
        if !run_props.is_empty() {
            paragraph.push_str("<w:rPr>");
            paragraph.push_str(&run_props.concat());
            paragraph.push_str("</w:rPr>");
        }
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                paragraph.push_str("<w:br/>");
            }
            paragraph.push_str(&format!(
                "<w:t xml:space=\"preserve\">{}</w:t>",
                escape_xml(line)
            ));
        }
        paragraph.push_str("</w:r></w:p>");

        self.body.push(paragraph);
        self
    }
}
