//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.

use crate::dom::{body_children, find_element, parse_html, DomNode, Tag};
use crate::error::Result;
use crate::fonts::FontMetrics;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::pagination::{paginate, PAGE_MARGIN_PT};
use crate::render::render_pdf;
use crate::style::build_styled_tree;

/// Title used when neither the config nor the markup provides one.
pub const DEFAULT_TITLE: &str = "Document";

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata. `None` uses the
    /// markup's `<title>`.
    pub title: Option<String>,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: None,
            page_width: 595.28,
            page_height: 841.89,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
        }
    }
}

impl PipelineConfig {
    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }

    /// US Letter portrait (8.5in × 11in).
    pub fn letter() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// The configured title, else the non-blank `<title>` text, else
/// [`DEFAULT_TITLE`].
pub fn document_title(dom: &[DomNode], config: &PipelineConfig) -> String {
    match &config.title {
        Some(title) => title.clone(),
        None => find_element(dom, &Tag::Title)
            .map(|t| t.text_content().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    }
}

/// Markup → paginated layout, without producing PDF bytes.
pub fn layout_document(xhtml: &str, config: &PipelineConfig) -> Result<LayoutConfig> {
    let dom = parse_html(xhtml)?;
    let title = document_title(&dom, config);

    let dom_nodes = body_children(&dom);
    let styled = build_styled_tree(&dom_nodes, None)?;
    log::trace!("styled {} top-level nodes", styled.len());

    let fonts = FontMetrics::new();
    let eff_w = config.effective_width();
    let eff_h = config.effective_height();
    let boxes = compute_layout(&styled, eff_w, config.page_margin, &fonts)?;
    paginate(&boxes, &title, eff_w, eff_h, config.page_margin, &fonts)
}

/// Full pipeline: markup → PDF bytes.
pub fn render_document(xhtml: &str, config: &PipelineConfig) -> Result<Vec<u8>> {
    let layout = layout_document(xhtml, config)?;
    render_pdf(&layout)
}
