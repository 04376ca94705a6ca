//! Style resolver – maps inline `style` attributes and utility classes to a
//! flat [`ComputedStyle`] consumed by the layout engine.
//!
//! Unknown properties and classes are ignored. A known property with a value
//! we cannot interpret is an error, so a typo in a template surfaces instead
//! of silently rendering something else.

use crate::dom::{DomNode, ElementNode, Tag};
use crate::error::{Error, Result};

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    pub grid_columns: usize,

    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub max_width: Dimension,

    // Spacing, in points.
    pub margin: Edges,
    pub padding: Edges,

    pub border_width: f32,
    pub border_color: Color,

    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,

    pub background_color: Color,

    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_columns: 1,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            max_width: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            text_decoration: TextDecoration::None,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Style for a run of text inside `self`: text properties only, no box.
    pub fn text_run(&self) -> Self {
        Self {
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_style: self.font_style,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            text_decoration: self.text_decoration,
            display: Display::Inline,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    /// Horizontal space taken by padding and border.
    pub fn horizontal_insets(&self) -> f32 {
        self.padding.left + self.padding.right + 2.0 * self.border_width
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block's width.
    pub fn resolve(self, container: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v),
            Dimension::Percent(p) => Some(container * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn vertical(v: f32) -> Self {
        Self {
            top: v,
            bottom: v,
            ..Self::default()
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#hex`, `rgb(r, g, b)` or a colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        if let Some(args) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<u8> = args
                .split(',')
                .map(|p| p.trim().parse::<u8>().ok())
                .collect::<Option<_>>()?;
            return match parts[..] {
                [r, g, b] => Some(Self::rgb(r, g, b)),
                _ => None,
            };
        }
        let lower = value.to_ascii_lowercase();
        if lower == "transparent" {
            return Some(Self::TRANSPARENT);
        }
        lookup(NAMED_COLORS, &lower)
    }
}

fn lookup(table: &[(&str, [u8; 3])], name: &str) -> Option<Color> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, [r, g, b])| Color::rgb(r, g, b))
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("maroon", [128, 0, 0]),
    ("orange", [255, 165, 0]),
];

/// Utility-class palette: `text-*`, `bg-*` and `border-*` accept these.
const PALETTE: &[(&str, [u8; 3])] = &[
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("gray-100", [243, 244, 246]),
    ("gray-200", [229, 231, 235]),
    ("gray-300", [209, 213, 219]),
    ("gray-500", [107, 114, 128]),
    ("gray-700", [55, 65, 81]),
    ("gray-900", [17, 24, 39]),
    ("red-500", [239, 68, 68]),
    ("red-700", [185, 28, 28]),
    ("green-500", [34, 197, 94]),
    ("green-700", [21, 128, 61]),
    ("blue-500", [59, 130, 246]),
    ("blue-700", [29, 78, 216]),
    ("blue-900", [26, 54, 93]),
    ("yellow-500", [234, 179, 8]),
];

const LINK_BLUE: [u8; 3] = [29, 78, 216];
const RULE_GRAY: [u8; 3] = [209, 213, 219];
const HEADER_CELL_GRAY: [u8; 3] = [237, 237, 237];

fn shade([r, g, b]: [u8; 3]) -> Color {
    Color::rgb(r, g, b)
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> Result<ComputedStyle> {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = p.font_weight;
        style.font_style = p.font_style;
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
        style.text_decoration = p.text_decoration;
    }
    apply_tag_defaults(&mut style, &element.tag);

    for class in element.classes() {
        apply_utility_class(&mut style, class);
    }
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline)?;
    }
    Ok(style)
}

/// Default styles based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let heading = |s: &mut ComputedStyle, size: f32, space: f32| {
        s.font_size = size;
        s.font_weight = FontWeight::Bold;
        s.line_height = 1.2;
        s.margin = Edges::vertical(space);
    };
    match tag {
        Tag::H1 => heading(s, 26.0, 12.0),
        Tag::H2 => heading(s, 20.0, 10.0),
        Tag::H3 => heading(s, 16.0, 8.0),
        Tag::H4 => heading(s, 13.0, 6.0),
        Tag::P => s.margin.bottom = 8.0,
        Tag::Ul | Tag::Ol => {
            s.margin.bottom = 8.0;
            s.padding.left = 24.0;
        }
        Tag::Li => {
            s.display = Display::ListItem;
            s.margin.bottom = 4.0;
        }
        Tag::Table => {
            s.display = Display::Table;
            s.margin.bottom = 8.0;
        }
        Tag::Thead | Tag::Tbody | Tag::Tr => s.display = Display::TableRow,
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding = Edges {
                top: 4.0,
                right: 8.0,
                bottom: 4.0,
                left: 8.0,
            };
            s.border_width = 1.0;
            s.border_color = shade(RULE_GRAY);
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Left;
                s.background_color = shade(HEADER_CELL_GRAY);
            }
        }
        Tag::Strong | Tag::B => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Em | Tag::I => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::U => {
            s.display = Display::Inline;
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::A => {
            s.display = Display::Inline;
            s.color = shade(LINK_BLUE);
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Img => s.display = Display::InlineBlock,
        Tag::Hr => {
            s.height = Dimension::Px(1.0);
            s.background_color = shade(RULE_GRAY);
            s.margin = Edges::vertical(8.0);
        }
        Tag::Html | Tag::Body | Tag::Div | Tag::Section | Tag::Header | Tag::Footer => {}
        // Head content and anything we do not know how to draw.
        Tag::Head
        | Tag::Title
        | Tag::Meta
        | Tag::Link
        | Tag::Style
        | Tag::Script
        | Tag::Base
        | Tag::Other(_) => s.display = Display::None,
    }
}

/// Apply a single utility class. Unknown classes are ignored.
fn apply_utility_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "flex" => s.display = Display::Flex,
        "grid" => s.display = Display::Grid,
        "block" => s.display = Display::Block,
        "inline" => s.display = Display::Inline,
        "inline-block" => s.display = Display::InlineBlock,
        "hidden" => s.display = Display::None,

        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-wrap" => s.flex_wrap = FlexWrap::Wrap,
        "flex-nowrap" => s.flex_wrap = FlexWrap::NoWrap,
        "grow" | "flex-grow" => s.flex_grow = 1.0,
        "shrink-0" => s.flex_shrink = 0.0,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }

        "justify-start" => s.justify_content = JustifyContent::Start,
        "justify-end" => s.justify_content = JustifyContent::End,
        "justify-center" => s.justify_content = JustifyContent::Center,
        "justify-between" => s.justify_content = JustifyContent::SpaceBetween,
        "justify-around" => s.justify_content = JustifyContent::SpaceAround,
        "justify-evenly" => s.justify_content = JustifyContent::SpaceEvenly,

        "items-start" => s.align_items = AlignItems::Start,
        "items-end" => s.align_items = AlignItems::End,
        "items-center" => s.align_items = AlignItems::Center,
        "items-stretch" => s.align_items = AlignItems::Stretch,

        "font-bold" => s.font_weight = FontWeight::Bold,
        "font-normal" => s.font_weight = FontWeight::Normal,
        "italic" => s.font_style = FontStyle::Italic,
        "not-italic" => s.font_style = FontStyle::Normal,
        "underline" => s.text_decoration = TextDecoration::Underline,
        "no-underline" => s.text_decoration = TextDecoration::None,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "text-xs" => s.font_size = 9.0,
        "text-sm" => s.font_size = 10.5,
        "text-base" => s.font_size = 12.0,
        "text-lg" => s.font_size = 14.0,
        "text-xl" => s.font_size = 16.0,
        "text-2xl" => s.font_size = 20.0,
        "text-3xl" => s.font_size = 24.0,

        "w-full" => s.width = Dimension::Percent(100.0),
        "w-auto" => s.width = Dimension::Auto,
        "w-1/2" => s.width = Dimension::Percent(50.0),
        "w-1/3" => s.width = Dimension::Percent(100.0 / 3.0),
        "w-2/3" => s.width = Dimension::Percent(200.0 / 3.0),
        "w-1/4" => s.width = Dimension::Percent(25.0),
        "w-3/4" => s.width = Dimension::Percent(75.0),

        "break-before" => s.page_break_before = true,
        "break-after" | "page-break" => s.page_break_after = true,
        "break-inside-avoid" => s.page_break_inside_avoid = true,

        _ => apply_parametric_class(s, class),
    }
}

/// `p-4`, `mt-2`, `gap-3`, `grid-cols-2`, `w-64`, `text-gray-500`, …
/// One spacing unit is 4 points.
fn apply_parametric_class(s: &mut ComputedStyle, class: &str) {
    if let Some(color) = class.strip_prefix("text-").and_then(palette) {
        s.color = color;
        return;
    }
    if let Some(color) = class.strip_prefix("bg-").and_then(palette) {
        s.background_color = color;
        return;
    }
    if let Some(color) = class.strip_prefix("border-").and_then(palette) {
        s.border_color = color;
        if s.border_width == 0.0 {
            s.border_width = 1.0;
        }
        return;
    }
    if class == "border" {
        s.border_width = 1.0;
        return;
    }
    if let Some(n) = class
        .strip_prefix("grid-cols-")
        .and_then(|n| n.parse::<usize>().ok())
    {
        s.display = Display::Grid;
        s.grid_columns = n.max(1);
        return;
    }

    let Some((prefix, amount)) = class.rsplit_once('-') else {
        return;
    };
    let Ok(units) = amount.parse::<f32>() else {
        return;
    };
    let v = units * 4.0;
    match prefix {
        "p" => s.padding = Edges::all(v),
        "px" => {
            s.padding.left = v;
            s.padding.right = v;
        }
        "py" => {
            s.padding.top = v;
            s.padding.bottom = v;
        }
        "pt" => s.padding.top = v,
        "pr" => s.padding.right = v,
        "pb" => s.padding.bottom = v,
        "pl" => s.padding.left = v,
        "m" => s.margin = Edges::all(v),
        "mx" => {
            s.margin.left = v;
            s.margin.right = v;
        }
        "my" => {
            s.margin.top = v;
            s.margin.bottom = v;
        }
        "mt" => s.margin.top = v,
        "mr" => s.margin.right = v,
        "mb" => s.margin.bottom = v,
        "ml" => s.margin.left = v,
        "gap" => s.gap = v,
        "w" => s.width = Dimension::Px(v),
        "h" => s.height = Dimension::Px(v),
        _ => {}
    }
}

fn palette(name: &str) -> Option<Color> {
    lookup(PALETTE, name)
}

// ---------------------------------------------------------------------------
// Inline style parsing
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) -> Result<()> {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let val = val.trim().trim_end_matches("!important").trim();
        if prop.is_empty() {
            continue;
        }
        let applied = apply_css_property(s, &prop, val);
        if applied.is_none() {
            return Err(Error::layout(format!(
                "unsupported value {val:?} for CSS property {prop}"
            )));
        }
    }
    Ok(())
}

/// Apply one declaration. `None` means the property is known but the value
/// is not; unknown properties are accepted and ignored.
fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) -> Option<()> {
    let font_size = s.font_size;
    let length = |v: &str| parse_length(v, font_size);
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "grid" => Display::Grid,
                "block" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "none" => Display::None,
                _ => return None,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "row" => FlexDirection::Row,
                "column" => FlexDirection::Column,
                _ => return None,
            }
        }
        "flex-wrap" => {
            s.flex_wrap = match val {
                "wrap" => FlexWrap::Wrap,
                "nowrap" => FlexWrap::NoWrap,
                _ => return None,
            }
        }
        "flex-grow" => s.flex_grow = val.parse().ok()?,
        "flex-shrink" => s.flex_shrink = val.parse().ok()?,
        "justify-content" => {
            s.justify_content = match val {
                "flex-start" | "start" => JustifyContent::Start,
                "flex-end" | "end" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => return None,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                "stretch" => AlignItems::Stretch,
                _ => return None,
            }
        }
        "gap" => s.gap = length(val)?,
        "font-size" => s.font_size = length(val)?,
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                "normal" | "lighter" | "100" | "200" | "300" | "400" | "500" => FontWeight::Normal,
                _ => return None,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                "normal" => FontStyle::Normal,
                _ => return None,
            }
        }
        "text-decoration" => {
            s.text_decoration = match val {
                "underline" => TextDecoration::Underline,
                "none" => TextDecoration::None,
                _ => return None,
            }
        }
        "color" => s.color = Color::parse(val)?,
        "background-color" | "background" => s.background_color = Color::parse(val)?,
        "text-align" => {
            s.text_align = match val {
                "left" | "start" | "justify" => TextAlign::Left,
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => return None,
            }
        }
        "line-height" => {
            s.line_height = match val.parse::<f32>() {
                Ok(factor) => factor,
                Err(_) => length(val)? / font_size.max(1.0),
            }
        }
        "width" => s.width = parse_dimension(val, font_size)?,
        "height" => s.height = parse_dimension(val, font_size)?,
        "min-width" => s.min_width = parse_dimension(val, font_size)?,
        "max-width" => s.max_width = parse_dimension(val, font_size)?,
        "margin" => s.margin = parse_edges(val, font_size)?,
        "padding" => s.padding = parse_edges(val, font_size)?,
        "margin-top" => s.margin.top = margin_length(val, font_size)?,
        "margin-right" => s.margin.right = margin_length(val, font_size)?,
        "margin-bottom" => s.margin.bottom = margin_length(val, font_size)?,
        "margin-left" => s.margin.left = margin_length(val, font_size)?,
        "padding-top" => s.padding.top = length(val)?,
        "padding-right" => s.padding.right = length(val)?,
        "padding-bottom" => s.padding.bottom = length(val)?,
        "padding-left" => s.padding.left = length(val)?,
        "border-width" => s.border_width = length(val)?,
        "border-color" => s.border_color = Color::parse(val)?,
        "border" => {
            // e.g. `1px solid #ccc`, `none`
            for part in val.split_whitespace() {
                if let Some(w) = length(part) {
                    s.border_width = w;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                } else if part == "none" {
                    s.border_width = 0.0;
                } else if !matches!(part, "solid" | "dashed" | "dotted") {
                    return None;
                }
            }
        }
        "page-break-before" | "break-before" => s.page_break_before = page_break(val)?,
        "page-break-after" | "break-after" => s.page_break_after = page_break(val)?,
        "page-break-inside" | "break-inside" => {
            s.page_break_inside_avoid = match val {
                "avoid" | "avoid-page" => true,
                "auto" => false,
                _ => return None,
            }
        }
        other => log::trace!("ignoring CSS property {other}"),
    }
    Some(())
}

fn page_break(val: &str) -> Option<bool> {
    match val {
        "always" | "page" => Some(true),
        "auto" | "avoid" => Some(false),
        _ => None,
    }
}

/// `12px`, `9pt`, `1.5em`, `0` or a bare number (points).
fn parse_length(val: &str, font_size: f32) -> Option<f32> {
    let val = val.trim();
    let (number, scale) = if let Some(n) = val.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = val.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = val.strip_suffix("em") {
        (n, font_size)
    } else {
        (val, 1.0)
    };
    let v = number.trim().parse::<f32>().ok()?;
    v.is_finite().then_some(v * scale)
}

/// Margins additionally accept `auto`, laid out as zero.
fn margin_length(val: &str, font_size: f32) -> Option<f32> {
    if val == "auto" {
        Some(0.0)
    } else {
        parse_length(val, font_size)
    }
}

fn parse_dimension(val: &str, font_size: f32) -> Option<Dimension> {
    if val == "auto" {
        Some(Dimension::Auto)
    } else if let Some(p) = val.strip_suffix('%') {
        p.trim().parse::<f32>().ok().map(Dimension::Percent)
    } else {
        parse_length(val, font_size).map(Dimension::Px)
    }
}

fn parse_edges(val: &str, font_size: f32) -> Option<Edges> {
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| margin_length(p, font_size))
        .collect::<Option<_>>()?;
    let (top, right, bottom, left) = match parts[..] {
        [a] => (a, a, a, a),
        [v, h] => (v, h, v, h),
        [t, h, b] => (t, h, b, h),
        [t, r, b, l] => (t, r, b, l),
        _ => return None,
    };
    Some(Edges {
        top,
        right,
        bottom,
        left,
    })
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (image `src`, …).
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            StyledNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            StyledNode::Text { .. } => None,
        }
    }
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
///
/// `thead` and `tbody` are flattened into their table so rows are direct
/// children; hidden elements are dropped.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
) -> Result<Vec<StyledNode>> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) if matches!(e.tag, Tag::Thead | Tag::Tbody) => {
                result.extend(build_styled_tree(&e.children, parent_style)?);
            }
            DomNode::Element(e) => {
                let style = resolve_style(e, parent_style)?;
                if style.display == Display::None {
                    continue;
                }
                let children = build_styled_tree(&e.children, Some(&style))?;
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            DomNode::Text(text) if !text.is_empty() => {
                let style = parent_style
                    .map(ComputedStyle::text_run)
                    .unwrap_or_else(|| ComputedStyle::default().text_run());
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
            DomNode::Text(_) => {}
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn styled(html: &str) -> Vec<StyledNode> {
        build_styled_tree(&parse_html(html).unwrap(), None).unwrap()
    }

    #[test]
    fn utility_padding_and_colour() {
        let mut s = ComputedStyle::default();
        apply_utility_class(&mut s, "p-4");
        apply_utility_class(&mut s, "text-gray-500");
        assert_eq!(s.padding, Edges::all(16.0));
        assert_eq!(s.color, Color::rgb(107, 114, 128));
    }

    #[test]
    fn inline_style_overrides_tag_defaults() {
        let nodes = styled(r#"<h1 style="font-size: 18pt; color: #ff0000; margin: 0 auto">x</h1>"#);
        let s = nodes[0].style();
        assert_eq!(s.font_size, 18.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
        assert_eq!(s.margin, Edges::default());
        assert!(s.is_bold());
    }

    #[test]
    fn unknown_properties_are_ignored() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-family: Georgia; transition: all 1s").unwrap();
        assert_eq!(s, ComputedStyle::default());
    }

    #[test]
    fn bad_values_for_known_properties_fail() {
        for decl in ["width: wide", "color: #12", "display: table-ish", "margin: 1 2 3 4 5"] {
            let mut s = ComputedStyle::default();
            assert!(
                matches!(apply_inline_style(&mut s, decl), Err(Error::Layout(_))),
                "{decl} should be rejected"
            );
        }
    }

    #[test]
    fn colour_forms() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("rgb(26, 54, 93)"), Some(Color::rgb(26, 54, 93)));
        assert_eq!(Color::parse("Navy"), Some(Color::rgb(0, 0, 128)));
        assert_eq!(Color::parse("#ff8800").map(|c| (c.g * 255.0).round()), Some(136.0));
        assert!(Color::parse("rgb(1,2)").is_none());
    }

    #[test]
    fn text_properties_inherit() {
        let nodes = styled(r#"<div class="text-center font-bold"><p>x</p></div>"#);
        let StyledNode::Element { children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(children[0].style().text_align, TextAlign::Center);
        assert!(children[0].style().is_bold());
        // ...but box properties do not.
        assert_eq!(children[0].style().padding, Edges::default());
    }

    #[test]
    fn table_sections_are_flattened_and_head_is_hidden() {
        let nodes = styled("<title>t</title><table><thead><tr><th>a</tr><tbody><tr><td>1</table>");
        assert_eq!(nodes.len(), 1);
        let StyledNode::Element { tag, children, .. } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(*tag, Tag::Table);
        assert_eq!(children.len(), 2);
        assert!(children
            .iter()
            .all(|c| matches!(c, StyledNode::Element { tag: Tag::Tr, .. })));
    }
}
