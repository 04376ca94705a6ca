//! Pagination – splits positioned boxes into pages.
//!
//! Handles:
//! - page boundaries for any page size
//! - page-break-before / page-break-after hints
//! - table row splitting across pages
//! - splitting paragraphs taller than a page at line boundaries

use crate::error::{Error, Result};
use crate::fonts::FontMetrics;
use crate::layout::{BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::style;

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Recursively expand any pure-container box whose height exceeds a single
/// page so its children can be split across pages individually. Text boxes
/// that are still too tall are cut into page-sized slices of lines.
fn flatten_for_pagination(
    boxes: &[PositionedBox],
    content_height: f32,
    fonts: &FontMetrics,
) -> Result<Vec<PositionedBox>> {
    let mut result = Vec::new();
    for pbox in boxes {
        if pbox.height <= content_height {
            result.push(pbox.clone());
            continue;
        }
        match &pbox.content {
            BoxContent::None if !pbox.children.is_empty() => {
                result.extend(flatten_for_pagination(&pbox.children, content_height, fonts)?);
            }
            BoxContent::Text { lines } => {
                result.extend(split_text_box(pbox, lines, content_height, fonts));
            }
            BoxContent::Image { .. } => {
                return Err(Error::layout(format!(
                    "image of {:.0} pt does not fit on a page with {:.0} pt of content height",
                    pbox.height, content_height
                )));
            }
            _ => result.push(pbox.clone()),
        }
    }
    Ok(result)
}

fn split_text_box(
    pbox: &PositionedBox,
    lines: &[String],
    content_height: f32,
    fonts: &FontMetrics,
) -> Vec<PositionedBox> {
    let line_height = fonts.line_height_px(pbox.style.font_size, pbox.style.line_height);
    let per_page = ((content_height / line_height).floor() as usize).max(1);
    lines
        .chunks(per_page)
        .enumerate()
        .map(|(i, chunk)| PositionedBox {
            y: pbox.y + (i * per_page) as f32 * line_height,
            height: chunk.len() as f32 * line_height,
            content: BoxContent::Text {
                lines: chunk.to_vec(),
            },
            ..pbox.clone()
        })
        .collect()
}

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    title: &str,
    page_width: f32,
    page_height: f32,
    page_margin: f32,
    fonts: &FontMetrics,
) -> Result<LayoutConfig> {
    let mut config = LayoutConfig {
        title: title.to_string(),
        page_width_pt: page_width,
        page_height_pt: page_height,
        pages: Vec::new(),
    };

    let content_height = page_height - 2.0 * page_margin;
    if content_height <= 0.0 {
        return Err(Error::layout(format!(
            "page margin {page_margin} pt leaves no room on a {page_height} pt page"
        )));
    }

    // Expand oversized wrapper divs so their children can paginate individually.
    let flat = flatten_for_pagination(boxes, content_height, fonts)?;

    let mut current_page = PageLayout {
        page_index: 0,
        boxes: Vec::new(),
    };

    // Document-space y at which the current page begins. Every
    // PositionedBox.y is an absolute document coordinate, so
    // `pbox.y - page_start_doc_y` is the y-on-page.
    let mut page_start_doc_y = 0.0f32;

    for pbox in &flat {
        if pbox.style.page_break_before && !current_page.boxes.is_empty() {
            config.pages.push(current_page);
            current_page = PageLayout {
                page_index: config.pages.len(),
                boxes: Vec::new(),
            };
            page_start_doc_y = pbox.y;
        }

        let y_on_page = (pbox.y - page_start_doc_y).max(0.0);
        let box_bottom = y_on_page + pbox.height;

        if box_bottom > content_height && !current_page.boxes.is_empty() {
            if is_table_like(pbox) && !pbox.style.page_break_inside_avoid {
                split_table_box(
                    pbox,
                    &mut config,
                    &mut current_page,
                    &mut page_start_doc_y,
                    content_height,
                    page_margin,
                    fonts,
                );
                continue;
            }
            config.pages.push(current_page);
            current_page = PageLayout {
                page_index: config.pages.len(),
                boxes: Vec::new(),
            };
            page_start_doc_y = pbox.y;
        }

        let y_on_page = (pbox.y - page_start_doc_y).max(0.0);
        current_page
            .boxes
            .push(positioned_to_layout_box(pbox, page_margin, y_on_page, fonts));

        if pbox.style.page_break_after {
            config.pages.push(current_page);
            current_page = PageLayout {
                page_index: config.pages.len(),
                boxes: Vec::new(),
            };
            page_start_doc_y = pbox.y + pbox.height;
        }
    }

    if !current_page.boxes.is_empty() {
        config.pages.push(current_page);
    }
    if config.pages.is_empty() {
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: Vec::new(),
        });
    }
    log::debug!("paginated \"{}\" into {} page(s)", config.title, config.pages.len());
    Ok(config)
}

fn is_table_like(pbox: &PositionedBox) -> bool {
    matches!(
        pbox.style.display,
        style::Display::Table | style::Display::Grid
    ) && !pbox.children.is_empty()
}

fn split_table_box(
    pbox: &PositionedBox,
    config: &mut LayoutConfig,
    current_page: &mut PageLayout,
    page_start_doc_y: &mut f32,
    content_height: f32,
    page_margin: f32,
    fonts: &FontMetrics,
) {
    for row in &pbox.children {
        let y_on_page = (row.y - *page_start_doc_y).max(0.0);
        if y_on_page + row.height > content_height && !current_page.boxes.is_empty() {
            config.pages.push(std::mem::replace(
                current_page,
                PageLayout {
                    page_index: config.pages.len(),
                    boxes: Vec::new(),
                },
            ));
            *page_start_doc_y = row.y;
        }
        let y = (row.y - *page_start_doc_y).max(0.0);
        current_page
            .boxes
            .push(positioned_to_layout_box(row, page_margin, y, fonts));
    }
}

/// Convert a PositionedBox to a LayoutBox with page-absolute coordinates.
/// Taffy already folds margins into `pbox.y`.
fn positioned_to_layout_box(
    pbox: &PositionedBox,
    page_margin: f32,
    y_on_page: f32,
    fonts: &FontMetrics,
) -> LayoutBox {
    build_layout_box(pbox, pbox.x, page_margin + y_on_page, fonts)
}

/// Recursively build a LayoutBox tree where every box carries page-absolute
/// coordinates (origin = top-left of the physical page).
///
/// Children keep their offset from the parent:
/// `child_abs_y = parent_abs_y + (child.y - parent.y)`.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32, fonts: &FontMetrics) -> LayoutBox {
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);
    let s = &pbox.style;

    if !s.background_color.is_transparent() {
        lb.background_color = Some(s.background_color.to_array());
    }
    if s.border_width > 0.5 && !s.border_color.is_transparent() {
        lb.border = Some(BorderStyle {
            width: s.border_width,
            color: s.border_color.to_array(),
        });
    }

    match &pbox.content {
        BoxContent::Text { lines } => {
            let line_height = fonts.line_height_px(s.font_size, s.line_height);
            let align = text_align(s.text_align);
            let text_lines = lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let width = fonts.measure_text_width(line, s.font_size, s.is_bold());
                    let x_offset = match align {
                        TextAlign::Left => 0.0,
                        TextAlign::Center => ((pbox.width - width) / 2.0).max(0.0),
                        TextAlign::Right => (pbox.width - width).max(0.0),
                    };
                    TextLine {
                        text: line.clone(),
                        x_offset,
                        y_offset: i as f32 * line_height,
                        width,
                    }
                })
                .collect();
            lb.text = Some(text_content(s, text_lines, line_height, align, None));
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::ListItem { marker } => {
            // No lines of its own: the item's text lives in child boxes and
            // the marker is drawn in the gutter.
            let line_height = fonts.line_height_px(s.font_size, s.line_height);
            lb.text = Some(text_content(
                s,
                Vec::new(),
                line_height,
                TextAlign::Left,
                Some(marker.clone()),
            ));
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children
            .push(build_layout_box(child, child.x, child_abs_y, fonts));
    }
    lb
}

fn text_content(
    s: &style::ComputedStyle,
    lines: Vec<TextLine>,
    line_height: f32,
    text_align: TextAlign,
    list_marker: Option<String>,
) -> TextContent {
    TextContent {
        lines,
        font_size: s.font_size,
        bold: s.is_bold(),
        italic: s.font_style == style::FontStyle::Italic,
        color: s.color.to_array(),
        line_height,
        text_align,
        underline: s.text_decoration == style::TextDecoration::Underline,
        list_marker,
    }
}

fn text_align(align: style::TextAlign) -> TextAlign {
    match align {
        style::TextAlign::Left => TextAlign::Left,
        style::TextAlign::Center => TextAlign::Center,
        style::TextAlign::Right => TextAlign::Right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;
    use crate::style::build_styled_tree;

    fn paginate_html(html: &str, page_height: f32) -> Result<LayoutConfig> {
        let fonts = FontMetrics::new();
        let dom = parse_html(html)?;
        let styled = build_styled_tree(&dom, None)?;
        let boxes = compute_layout(&styled, 595.0, PAGE_MARGIN_PT, &fonts)?;
        paginate(&boxes, "Test", 595.0, page_height, PAGE_MARGIN_PT, &fonts)
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>", 842.0).unwrap();
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.title, "Test");
        let first = &config.pages[0].boxes[0];
        assert_eq!((first.x, first.y), (PAGE_MARGIN_PT, PAGE_MARGIN_PT));
        assert_eq!(config.text_lines(), vec!["Short text"]);
    }

    #[test]
    fn multiple_pages() {
        let html: String = (0..60)
            .map(|i| format!("<p>Paragraph {i} with some text</p>"))
            .collect();
        let config = paginate_html(&html, 842.0).unwrap();
        assert!(config.pages.len() > 1, "got {} pages", config.pages.len());
        for page in &config.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= 842.0 - PAGE_MARGIN_PT + 0.5);
            }
        }
        let texts = config.text_lines();
        assert_eq!(texts.len(), 60);
        assert_eq!(texts[59], "Paragraph 59 with some text");
    }

    #[test]
    fn explicit_page_breaks() {
        let config = paginate_html(
            r#"<p class="break-after">One</p><p>Two</p><p style="page-break-before: always">Three</p>"#,
            842.0,
        )
        .unwrap();
        assert_eq!(config.pages.len(), 3);
    }

    #[test]
    fn long_tables_split_by_row() {
        let rows: String = (0..80)
            .map(|i| format!("<tr><th>Row {i}</th><td>value</td></tr>"))
            .collect();
        let config = paginate_html(&format!("<p>Intro</p><table>{rows}</table>"), 842.0).unwrap();
        assert!(config.pages.len() > 1);
        let texts = config.text_lines();
        assert!(texts.contains(&"Row 0") && texts.contains(&"Row 79"));
    }

    #[test]
    fn tall_paragraph_is_split_at_lines() {
        let text = "word ".repeat(3000);
        let config = paginate_html(&format!("<p>{text}</p>"), 300.0).unwrap();
        assert!(config.pages.len() > 2);
        let words: usize = config
            .text_lines()
            .iter()
            .map(|l| l.split_whitespace().count())
            .sum();
        assert_eq!(words, 3000);
    }

    #[test]
    fn centred_lines_get_an_offset() {
        let config = paginate_html(
            r#"<div class="w-full text-center"><p>Short</p><p>A much much longer line</p></div>"#,
            842.0,
        )
        .unwrap();
        let lines: Vec<&TextLine> = config
            .boxes()
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.width > 0.0));
    }

    #[test]
    fn zero_content_height_is_rejected() {
        assert!(matches!(paginate_html("<p>x</p>", 60.0), Err(Error::Layout(_))));
    }
}
