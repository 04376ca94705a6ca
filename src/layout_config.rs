//! Layout config – the frozen, serialisable description of every page,
//! produced by pagination and consumed by the PDF renderer.
//!
//! Everything the renderer needs is in here (positions in points from the
//! page's top-left corner, pre-wrapped text lines, image data URIs), so a
//! `LayoutConfig` can be snapshotted as JSON and rendered later.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    pub text_align: TextAlign,
    pub underline: bool,
    /// List bullet/number drawn in the gutter left of the box ("•", "1.").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (alignment).
    pub x_offset: f32,
    /// Y offset from the top of the box.
    pub y_offset: f32,
    /// Measured width of the line, in points.
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// `data:` URI of the image.
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// An empty A4 portrait document.
    pub fn a4(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            // 210mm × 297mm
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            pages: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::layout(format!("layout snapshot: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::layout(format!("layout snapshot: {e}")))
    }

    /// Every box on every page, depth first.
    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.pages.iter().flat_map(|p| p.boxes.iter().flat_map(LayoutBox::descendants))
    }

    /// All text lines in reading order, one string per line.
    pub fn text_lines(&self) -> Vec<&str> {
        self.boxes()
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(|l| l.text.as_str()))
            .collect()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// This box followed by all of its descendants, depth first.
    pub fn descendants(&self) -> Box<dyn Iterator<Item = &LayoutBox> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(LayoutBox::descendants)))
    }
}
