//! Layout engine – uses Taffy to compute flexbox layout from a styled DOM
//! tree, then converts the result into positioned boxes in document
//! coordinates.
//!
//! Block elements whose content is purely inline (text, `span`, `strong`,
//! `br`, …) get a single text leaf holding the merged run, word-wrapped to
//! the width the block will have. Text and image leaves inside a centred or
//! right-aligned column are aligned with `align-self`.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::data_uri;
use crate::dom::Tag;
use crate::error::{Error, Result};
use crate::fonts::{wrap_text, FontMetrics};
use crate::style::{self, ComputedStyle, Edges, StyledNode};

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    None,
    /// Pre-wrapped lines.
    Text { lines: Vec<String> },
    /// `data:` URI of a decoded, validated image.
    Image { src: String },
    /// List item marker, drawn in the gutter.
    ListItem { marker: String },
}

impl PositionedBox {
    pub fn is_image(&self) -> bool {
        matches!(self.content, BoxContent::Image { .. })
    }
}

fn taffy_err(e: taffy::TaffyError) -> Error {
    Error::layout(format!("layout engine: {e}"))
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontMetrics,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontMetrics) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
        }
    }

    /// `width` is the estimated width of the containing block, used for
    /// word-wrapping and percentage sizes.
    fn build_node(
        &mut self,
        node: &StyledNode,
        width: f32,
        align: Option<taffy::AlignItems>,
    ) -> Result<Option<NodeId>> {
        match node {
            StyledNode::Text { text, style } => {
                let text = text.replace(|c: char| c == '\n' || c == '\r', " ");
                self.build_text_leaf(&text, style.text_run(), width, align)
            }
            StyledNode::Element {
                tag: Tag::Img,
                style,
                ..
            } => self.build_image(style, node.attr("src"), width, align).map(Some),
            // A line break between blocks has nothing to break.
            StyledNode::Element { tag: Tag::Br, .. } => Ok(None),
            StyledNode::Element {
                tag,
                style,
                children,
                ..
            } => self.build_element(tag, style, children, width).map(Some),
        }
    }

    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        available: f32,
    ) -> Result<NodeId> {
        let outer = style
            .width
            .resolve(available)
            .unwrap_or(available - style.margin.left - style.margin.right);
        let inner = (outer - style.horizontal_insets()).max(0.0);
        let align = leaf_alignment(style);

        let child_nodes = if all_inline(children) {
            self.build_inline_run(children, style, inner, align)?
                .into_iter()
                .collect()
        } else {
            let child_width = child_build_width(style, children, inner);
            self.build_flow(Some(tag), style, children, child_width, align)?
        };

        let node = self
            .taffy
            .new_with_children(to_taffy(style), &child_nodes)
            .map_err(taffy_err)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// Build block children in order. Each run of adjacent inline nodes
    /// becomes one anonymous text leaf.
    fn build_flow(
        &mut self,
        list: Option<&Tag>,
        block: &ComputedStyle,
        children: &[StyledNode],
        width: f32,
        align: Option<taffy::AlignItems>,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();
        let mut list_counter = 0u32;
        let mut rest = children;
        while let Some(first) = rest.first() {
            let run_len = rest
                .iter()
                .take_while(|c| all_inline(std::slice::from_ref(*c)))
                .count();
            if run_len > 0 {
                let (run, tail) = rest.split_at(run_len);
                ids.extend(self.build_inline_run(run, block, width, align)?);
                rest = tail;
                continue;
            }
            rest = &rest[1..];

            let Some(child_id) = self.build_node(first, width, align)? else {
                continue;
            };
            // Bullets and numbers are drawn in the list's left gutter.
            if let (Some(list), StyledNode::Element { tag: Tag::Li, .. }) = (list, first) {
                if let Some(marker) = list_marker(list, &mut list_counter) {
                    self.node_content
                        .insert(child_id, BoxContent::ListItem { marker });
                }
            }
            ids.push(child_id);
        }
        Ok(ids)
    }

    fn build_inline_run(
        &mut self,
        run: &[StyledNode],
        block: &ComputedStyle,
        width: f32,
        align: Option<taffy::AlignItems>,
    ) -> Result<Option<NodeId>> {
        let mut text = String::new();
        for node in run {
            collect_inline_text(node, &mut text);
        }
        let run_style = dominant_style(run, block).text_run();
        self.build_text_leaf(&text, run_style, width, align)
    }

    fn build_text_leaf(
        &mut self,
        text: &str,
        style: ComputedStyle,
        max_width: f32,
        align: Option<taffy::AlignItems>,
    ) -> Result<Option<NodeId>> {
        let mut lines = wrap_text(text, style.font_size, style.is_bold(), max_width, self.fonts);
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        let leading_blank = lines.iter().take_while(|l| l.is_empty()).count();
        lines.drain(..leading_blank);
        if lines.is_empty() {
            return Ok(None);
        }

        let text_width = lines
            .iter()
            .map(|l| self.fonts.measure_text_width(l, style.font_size, style.is_bold()))
            .fold(0.0f32, f32::max);
        let line_height = self.fonts.line_height_px(style.font_size, style.line_height);

        let leaf = Style {
            size: Size {
                width: taffy::Dimension::Length(text_width.ceil()),
                height: taffy::Dimension::Length(lines.len() as f32 * line_height),
            },
            flex_shrink: 0.0,
            align_self: align,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(leaf).map_err(taffy_err)?;
        self.node_styles.insert(node, style);
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(Some(node))
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        src: Option<&str>,
        available: f32,
        align: Option<taffy::AlignItems>,
    ) -> Result<NodeId> {
        let src = src.ok_or_else(|| Error::layout("<img> has no src"))?;
        let bytes = data_uri::decode(src).map_err(Error::layout)?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| Error::layout(format!("cannot decode <img> data: {e}")))?;
        let (width, height) = image_size(style, img.width(), img.height(), available);
        log::trace!(
            "image {}x{} px laid out at {width:.1}x{height:.1} pt",
            img.width(),
            img.height()
        );

        let leaf = Style {
            size: Size {
                width: taffy::Dimension::Length(width),
                height: taffy::Dimension::Length(height),
            },
            margin: margin_rect(style.margin),
            flex_shrink: 0.0,
            align_self: align,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(leaf).map_err(taffy_err)?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(
            node,
            BoxContent::Image {
                src: src.to_string(),
            },
        );
        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox> {
        let layout = self.taffy.layout(node).map_err(taffy_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(taffy_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.node_styles.get(&node).cloned().unwrap_or_default(),
            content: self
                .node_content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            children,
        })
    }
}

// ---------------------------------------------------------------------------
// Inline runs
// ---------------------------------------------------------------------------

/// True when every child is text or an inline element with inline content.
fn all_inline(children: &[StyledNode]) -> bool {
    children.iter().all(|c| match c {
        StyledNode::Text { .. } => true,
        StyledNode::Element {
            style, children, ..
        } => style.display == style::Display::Inline && all_inline(children),
    })
}

/// Source line breaks are whitespace; only `<br>` forces a new line.
fn collect_inline_text(node: &StyledNode, out: &mut String) {
    match node {
        StyledNode::Text { text, .. } => out.extend(text.chars().map(|c| match c {
            '\n' | '\r' => ' ',
            c => c,
        })),
        StyledNode::Element { tag: Tag::Br, .. } => out.push('\n'),
        StyledNode::Element { children, .. } => {
            for child in children {
                collect_inline_text(child, out);
            }
        }
    }
}

fn has_visible_text(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { text, .. } => !text.trim().is_empty(),
        StyledNode::Element { children, .. } => children.iter().any(has_visible_text),
    }
}

/// A run keeps the block's font unless all of its text sits inside a single
/// inline element (`<p><strong>…</strong></p>`), whose font then wins.
fn dominant_style<'s>(children: &'s [StyledNode], block: &'s ComputedStyle) -> &'s ComputedStyle {
    let mut carriers = children.iter().filter(|c| has_visible_text(c));
    match (carriers.next(), carriers.next()) {
        (
            Some(StyledNode::Element {
                style, children, ..
            }),
            None,
        ) => dominant_style(children, style),
        _ => block,
    }
}

fn list_marker(list: &Tag, counter: &mut u32) -> Option<String> {
    match list {
        Tag::Ul => Some("\u{2022}".to_string()),
        Tag::Ol => {
            *counter += 1;
            Some(format!("{counter}."))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Style conversion
// ---------------------------------------------------------------------------

/// Estimated width handed to each child for wrapping: flex rows, table rows
/// and grids share the inner width between their element children.
fn child_build_width(style: &ComputedStyle, children: &[StyledNode], inner: f32) -> f32 {
    let boxes = children
        .iter()
        .filter(|c| matches!(c, StyledNode::Element { .. }))
        .count()
        .max(1);
    let columns = match style.display {
        style::Display::TableRow => boxes,
        style::Display::Flex if style.flex_direction == style::FlexDirection::Row => boxes,
        style::Display::Grid => style.grid_columns.max(1),
        _ => 1,
    };
    let gaps = style.gap * (columns - 1) as f32;
    ((inner - gaps) / columns as f32).max(1.0)
}

/// Alignment for leaves placed in a container with this style. Only column
/// containers align horizontally through `align-self`.
fn leaf_alignment(container: &ComputedStyle) -> Option<taffy::AlignItems> {
    let column = match container.display {
        style::Display::Flex => container.flex_direction == style::FlexDirection::Column,
        style::Display::Grid | style::Display::TableRow | style::Display::Inline => false,
        _ => true,
    };
    if !column {
        return None;
    }
    match container.text_align {
        style::TextAlign::Left => None,
        style::TextAlign::Center => Some(taffy::AlignItems::Center),
        style::TextAlign::Right => Some(taffy::AlignItems::End),
    }
}

fn to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style {
        size: Size {
            width: dimension(s.width),
            height: dimension(s.height),
        },
        // Let flexible items compress below their natural content size.
        min_size: Size {
            width: if s.flex_shrink > 0.0 || s.flex_grow > 0.0 {
                taffy::Dimension::Length(0.0)
            } else {
                dimension(s.min_width)
            },
            height: taffy::Dimension::Auto,
        },
        max_size: Size {
            width: dimension(s.max_width),
            height: taffy::Dimension::Auto,
        },
        flex_grow: s.flex_grow,
        flex_shrink: s.flex_shrink,
        margin: margin_rect(s.margin),
        padding: Rect {
            top: LengthPercentage::Length(s.padding.top),
            right: LengthPercentage::Length(s.padding.right),
            bottom: LengthPercentage::Length(s.padding.bottom),
            left: LengthPercentage::Length(s.padding.left),
        },
        border: Rect {
            top: LengthPercentage::Length(s.border_width),
            right: LengthPercentage::Length(s.border_width),
            bottom: LengthPercentage::Length(s.border_width),
            left: LengthPercentage::Length(s.border_width),
        },
        gap: Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        },
        ..Default::default()
    };

    match s.display {
        style::Display::Flex => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.flex_wrap = match s.flex_wrap {
                style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::End => taffy::JustifyContent::End,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
                style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::End => taffy::AlignItems::End,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Grid => {
            ts.display = taffy::Display::Grid;
            ts.grid_template_columns =
                vec![taffy::TrackSizingFunction::from_flex(1.0); s.grid_columns.max(1)];
        }
        // HTML table model on top of flexbox: rows stack, cells share a row
        // equally.
        style::Display::Table => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
            ts.min_size.width = taffy::Dimension::Length(0.0);
        }
        style::Display::TableRow => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.align_items = Some(taffy::AlignItems::Stretch);
            ts.size.width = taffy::Dimension::Percent(1.0);
            ts.min_size.width = taffy::Dimension::Length(0.0);
        }
        style::Display::TableCell => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
            ts.flex_grow = 1.0;
            ts.flex_shrink = 1.0;
            ts.flex_basis = taffy::Dimension::Length(0.0);
            ts.min_size.width = taffy::Dimension::Length(0.0);
        }
        style::Display::Block | style::Display::ListItem | style::Display::InlineBlock => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
        }
        style::Display::Inline => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.flex_wrap = taffy::FlexWrap::Wrap;
        }
        style::Display::None => ts.display = taffy::Display::None,
    }
    ts
}

fn dimension(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn margin_rect(m: Edges) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(m.top),
        right: LengthPercentageAuto::Length(m.right),
        bottom: LengthPercentageAuto::Length(m.bottom),
        left: LengthPercentageAuto::Length(m.left),
    }
}

/// Size of an image in points. Missing dimensions follow the aspect ratio;
/// with neither given, 1 px = 1 pt, shrunk to fit the available width.
fn image_size(style: &ComputedStyle, px_w: u32, px_h: u32, available: f32) -> (f32, f32) {
    let (px_w, px_h) = (px_w.max(1) as f32, px_h.max(1) as f32);
    let aspect = px_w / px_h;
    let height = match style.height {
        style::Dimension::Px(h) => Some(h),
        _ => None,
    };
    match (style.width.resolve(available), height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w / aspect),
        (None, Some(h)) => (h * aspect, h),
        (None, None) if px_w > available && available > 0.0 => (available, available / aspect),
        (None, None) => (px_w, px_h),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled tree, returning the top-level positioned
/// boxes in document coordinates (x already includes the page margin).
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    page_width: f32,
    page_margin: f32,
    fonts: &FontMetrics,
) -> Result<Vec<PositionedBox>> {
    let content_width = (page_width - 2.0 * page_margin).max(1.0);
    let mut builder = LayoutBuilder::new(fonts);

    let body_style = ComputedStyle::default();
    let child_ids = builder.build_flow(None, &body_style, styled_nodes, content_width, None)?;

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(content_width),
            height: taffy::Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(taffy_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(taffy_err)?;

    let root_box = builder.extract(root, page_margin, 0.0)?;
    log::trace!("laid out {} top-level boxes", root_box.children.len());
    Ok(root_box.children)
}
