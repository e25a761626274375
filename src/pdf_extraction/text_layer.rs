// Positioned text layer built from `pdftotext -bbox-layout`
//
// pdftotext emits XHTML with one <page> per page, <line> elements and one
// <word xMin yMin xMax yMax> per word, in points with a top-left origin.
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use std::process::Command;

use crate::config::PopplerConfig;
use crate::types::{BoundingBox, Result, ScanError};

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPage {
    pub width: f32,
    pub height: f32,
    pub lines: Vec<TextLine>,
}

impl TextPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            lines: Vec::new(),
        }
    }

    /// Text of the words whose centre lies inside `clip`. Words on one line
    /// are joined with a space, lines with a newline.
    pub fn text_in(&self, clip: &BoundingBox) -> String {
        let mut out: Vec<String> = Vec::new();

        for line in &self.lines {
            let words: Vec<&str> = line
                .words
                .iter()
                .filter(|w| {
                    let (cx, cy) = w.bbox.center();
                    clip.contains_point(cx, cy)
                })
                .map(|w| w.text.as_str())
                .collect();

            if !words.is_empty() {
                out.push(words.join(" "));
            }
        }

        out.join("\n")
    }
}

/// All pages of a document's text layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    pub pages: Vec<TextPage>,
}

impl TextLayer {
    /// Run pdftotext over the whole document once.
    pub fn from_pdf(pdf_path: &Path, poppler: &PopplerConfig) -> Result<Self> {
        let output = Command::new(poppler.tool("pdftotext"))
            .arg("-bbox-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf_path)
            .arg("-")
            .output()
            .map_err(|e| ScanError::TextLayer(format!("failed to run pdftotext: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::TextLayer(format!("pdftotext failed: {}", stderr.trim())));
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn parse(xhtml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xhtml);
        reader.config_mut().trim_text(true);

        let mut layer = TextLayer::default();
        let mut word: Option<Word> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"page" => layer
                        .pages
                        .push(TextPage::new(attr_coord(&e, "width")?, attr_coord(&e, "height")?)),
                    b"line" => current_page(&mut layer)?.lines.push(TextLine::default()),
                    b"word" => {
                        current_page(&mut layer)?;
                        word = Some(Word {
                            text: String::new(),
                            bbox: BoundingBox::new(
                                attr_coord(&e, "xMin")?,
                                attr_coord(&e, "yMin")?,
                                attr_coord(&e, "xMax")?,
                                attr_coord(&e, "yMax")?,
                            ),
                        });
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(word) = word.as_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| ScanError::TextLayer(format!("bad word text: {}", e)))?;
                        word.text.push_str(&text);
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"word" => {
                    if let Some(done) = word.take() {
                        let page = current_page(&mut layer)?;
                        // -bbox (without -layout) has no <line> wrappers
                        if page.lines.is_empty() {
                            page.lines.push(TextLine::default());
                        }
                        if let Some(line) = page.lines.last_mut() {
                            line.words.push(done);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ScanError::TextLayer(format!(
                        "malformed XHTML at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        Ok(layer)
    }

    pub fn page(&self, index: usize) -> Option<&TextPage> {
        self.pages.get(index)
    }
}

fn current_page(layer: &mut TextLayer) -> Result<&mut TextPage> {
    layer
        .pages
        .last_mut()
        .ok_or_else(|| ScanError::TextLayer("text element outside of <page>".into()))
}

fn attr_coord(element: &BytesStart<'_>, name: &str) -> Result<f32> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| ScanError::TextLayer(format!("bad attribute list: {}", e)))?
        .ok_or_else(|| {
            ScanError::TextLayer(format!(
                "<{}> without {}",
                String::from_utf8_lossy(element.name().as_ref()),
                name
            ))
        })?;
    let value = attr
        .unescape_value()
        .map_err(|e| ScanError::TextLayer(format!("bad {} value: {}", name, e)))?;
    parse_coord(&value)
}

fn parse_coord(value: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|_| ScanError::TextLayer(format!("bad coordinate '{}'", value)))
}
