//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{BTreeSet, HashMap};

use printpdf::*;

use crate::data_uri;
use crate::error::{Error, Result};
use crate::fonts::FontMetrics;
use crate::layout_config::{LayoutBox, LayoutConfig};

/// Points to millimetres.
const PT_TO_MM: f32 = 0.352778;

/// Gap between a list marker and the item's text.
const MARKER_GAP: f32 = 6.0;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Every image is embedded once as an XObject however often it is drawn.
/// An image that cannot be decoded fails the whole render.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>> {
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);

    // ── Register images ───────────────────────────────────────────────────
    let srcs: BTreeSet<&str> = config
        .boxes()
        .filter_map(|b| b.image.as_ref())
        .map(|img| img.src.as_str())
        .collect();

    let mut images: HashMap<String, ImageResource> = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in srcs {
        let bytes = data_uri::decode(src).map_err(Error::layout)?;
        let decoded = ::image::load_from_memory(&bytes)
            .map_err(|e| Error::layout(format!("cannot decode image: {e}")))?;
        let raw = RawImage::decode_from_bytes(&bytes, &mut warnings)
            .map_err(|e| Error::layout(format!("cannot embed image: {e}")))?;
        let xobj_id = doc.add_image(&raw);
        images.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width: decoded.width(),
                px_height: decoded.height(),
            },
        );
    }
    if !warnings.is_empty() {
        log::debug!("{} warning(s) while embedding images", warnings.len());
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let fonts = FontMetrics::new();
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, &images, &fonts);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    let page_count = pages.len();

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    log::debug!(
        "rendered \"{}\": {page_count} page(s), {} image(s), {} bytes",
        config.title,
        images.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0x9F range; printpdf passes
    // these bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a box in PDF space, counter-clockwise from bottom-left.
fn corners(lbox: &LayoutBox, pdf_top: f32) -> Vec<LinePoint> {
    let (x1, x2) = (lbox.x, lbox.x + lbox.width);
    let (y1, y2) = (pdf_top - lbox.height, pdf_top);
    vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)]
}

fn write_text(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, font: BuiltinFont, color: [f32; 4]) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
    fonts: &FontMetrics,
) {
    // PDF origin is bottom-left, layout origin is top-left.
    let pdf_y = page_height - lbox.y;

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: corners(lbox, pdf_y),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: corners(lbox, pdf_y),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        let font = match (text.bold, text.italic) {
            (true, true) => BuiltinFont::HelveticaBoldOblique,
            (true, false) => BuiltinFont::HelveticaBold,
            (false, true) => BuiltinFont::HelveticaOblique,
            (false, false) => BuiltinFont::Helvetica,
        };
        // Half-leading above the glyphs, then the ascender.
        let baseline = (text.line_height - text.font_size) / 2.0 + fonts.ascender_px(text.font_size);

        for tline in &text.lines {
            if tline.text.is_empty() {
                continue;
            }
            let text_x = lbox.x + tline.x_offset;
            let text_y = pdf_y - tline.y_offset - baseline;
            write_text(ops, &tline.text, text_x, text_y, text.font_size, font, text.color);

            if text.underline {
                let underline_y = text_y - text.font_size * 0.1;
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::SetOutlineColor {
                    col: rgb(text.color),
                });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: vec![
                            point(text_x, underline_y),
                            point(text_x + tline.width, underline_y),
                        ],
                        is_closed: false,
                    },
                });
            }
        }

        if let Some(marker) = &text.list_marker {
            let marker_width = fonts.measure_text_width(marker, text.font_size, false);
            write_text(
                ops,
                marker,
                lbox.x - marker_width - MARKER_GAP,
                pdf_y - baseline,
                text.font_size,
                BuiltinFont::Helvetica,
                text.color,
            );
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = img.width / res.px_width.max(1) as f32;
            let scale_y = img.height / res.px_height.max(1) as f32;
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(page_height - lbox.y - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images, fonts);
    }
}
