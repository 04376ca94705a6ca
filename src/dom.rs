//! HTML parser – converts loosely formed HTML into a DOM tree.
//!
//! The parser is tolerant in the way template output needs: tag and
//! attribute names are case-insensitive, attribute values may be unquoted,
//! void elements need no closing slash, and the usual implied end tags are
//! honoured (`<p>` before a block, `<li>` before the next item, table cells
//! and rows). Stray end tags are dropped and anything left open is closed at
//! the end of input.
//!
//! Input it cannot make sense of (a tag or quote still open at end of input,
//! an unterminated comment, an invalid character reference) is reported as
//! [`Error::MalformedMarkup`] with the line and column of the problem.

use crate::error::{Error, Result};

/// Deepest element nesting accepted before the input is rejected.
pub const MAX_DEPTH: usize = 512;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Element names the renderer knows about. Anything else is kept as
/// [`Tag::Other`] so it survives normalisation untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Meta,
    Link,
    Style,
    Script,
    Base,
    Body,
    Div,
    Section,
    Header,
    Footer,
    P,
    H1,
    H2,
    H3,
    H4,
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    B,
    Em,
    I,
    U,
    A,
    Br,
    Hr,
    Img,
    Other(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "base" => Tag::Base,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "header" => Tag::Header,
            "footer" => Tag::Footer,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "u" => Tag::U,
            "a" => Tag::A,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Lower-case element name.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Title => "title",
            Tag::Meta => "meta",
            Tag::Link => "link",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Base => "base",
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::Header => "header",
            Tag::Footer => "footer",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Strong => "strong",
            Tag::B => "b",
            Tag::Em => "em",
            Tag::I => "i",
            Tag::U => "u",
            Tag::A => "a",
            Tag::Br => "br",
            Tag::Hr => "hr",
            Tag::Img => "img",
            Tag::Other(name) => name,
        }
    }

    /// Elements that never have content or an end tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Meta | Tag::Link | Tag::Base | Tag::Br | Tag::Hr | Tag::Img => true,
            Tag::Other(name) => matches!(
                name.as_str(),
                "area" | "col" | "embed" | "input" | "param" | "source" | "track" | "wbr"
            ),
            _ => false,
        }
    }

    /// Elements whose content is character data, not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script)
    }

    /// Elements that belong in `<head>`.
    pub fn is_head_content(&self) -> bool {
        matches!(
            self,
            Tag::Title | Tag::Meta | Tag::Link | Tag::Style | Tag::Base | Tag::Script
        )
    }

    /// Inline phrasing elements (laid out inside a line of text).
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::A | Tag::Br
        )
    }

    /// Block-level starts that implicitly end an open `<p>`.
    fn closes_paragraph(&self) -> bool {
        match self {
            Tag::Div
            | Tag::Section
            | Tag::Header
            | Tag::Footer
            | Tag::P
            | Tag::H1
            | Tag::H2
            | Tag::H3
            | Tag::H4
            | Tag::Ul
            | Tag::Ol
            | Tag::Table
            | Tag::Hr => true,
            Tag::Other(name) => matches!(
                name.as_str(),
                "address"
                    | "article"
                    | "aside"
                    | "blockquote"
                    | "dl"
                    | "fieldset"
                    | "figure"
                    | "form"
                    | "h5"
                    | "h6"
                    | "main"
                    | "nav"
                    | "pre"
            ),
            _ => false,
        }
    }

    pub fn is_table_part(&self) -> bool {
        matches!(
            self,
            Tag::Table | Tag::Thead | Tag::Tbody | Tag::Tr | Tag::Td | Tag::Th
        )
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes (in source order), and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set `name`, replacing an existing value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – a single pass over the input with a stack of open elements
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level DOM nodes.
pub fn parse_html(html: &str) -> Result<Vec<DomNode>> {
    let mut parser = Parser::new(html);
    parser.run()?;
    Ok(parser.finish())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    open: Vec<ElementNode>,
    roots: Vec<DomNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        // A byte-order mark is an encoding signature, not content.
        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        Self {
            input,
            pos: 0,
            open: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("<![CDATA[") {
                self.parse_cdata()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                // Doctype and processing instructions carry no content.
                self.skip_past('>', "unterminated declaration")?;
            } else if self.starts_with("</") {
                self.parse_end_tag()?;
            } else if self.starts_with("<") && self.peek_is_tag_start() {
                self.parse_start_tag()?;
            } else {
                self.parse_text()?;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<DomNode> {
        self.pop_to(0);
        self.roots
    }

    // -- tree building ------------------------------------------------------

    fn append(&mut self, node: DomNode) {
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        // Adjacent text merges so dropped tags leave no seams.
        if let DomNode::Text(text) = &node {
            if let Some(DomNode::Text(prev)) = siblings.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        siblings.push(node);
    }

    /// Close open elements until only `depth` remain.
    fn pop_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(elem) = self.open.pop() {
                self.append(DomNode::Element(elem));
            }
        }
    }

    /// Index of the nearest open element matching `target`, searching from
    /// the innermost outwards and giving up at any `boundary` element.
    fn find_open(&self, target: impl Fn(&Tag) -> bool, boundary: impl Fn(&Tag) -> bool) -> Option<usize> {
        for (i, elem) in self.open.iter().enumerate().rev() {
            if target(&elem.tag) {
                return Some(i);
            }
            if boundary(&elem.tag) {
                return None;
            }
        }
        None
    }

    fn close_implied(&mut self, tag: &Tag) {
        let scope = |t: &Tag| matches!(t, Tag::Html | Tag::Table | Tag::Td | Tag::Th);

        if tag.closes_paragraph() {
            if let Some(i) = self.find_open(|t| *t == Tag::P, scope) {
                self.pop_to(i);
            }
        }
        match tag {
            Tag::Li => {
                if let Some(i) = self.find_open(
                    |t| *t == Tag::Li,
                    |t| matches!(t, Tag::Ul | Tag::Ol) || scope(t),
                ) {
                    self.pop_to(i);
                }
            }
            Tag::Td | Tag::Th => {
                if let Some(i) = self.find_open(
                    |t| matches!(t, Tag::Td | Tag::Th),
                    |t| matches!(t, Tag::Tr | Tag::Table),
                ) {
                    self.pop_to(i);
                }
            }
            Tag::Tr => {
                if let Some(i) = self.find_open(|t| *t == Tag::Tr, |t| *t == Tag::Table) {
                    self.pop_to(i);
                }
            }
            Tag::Thead | Tag::Tbody => {
                if let Some(i) = self.find_open(
                    |t| matches!(t, Tag::Thead | Tag::Tbody),
                    |t| *t == Tag::Table,
                ) {
                    self.pop_to(i);
                }
            }
            Tag::Body => {
                if let Some(i) = self.find_open(|t| *t == Tag::Head, |_| false) {
                    self.pop_to(i);
                }
            }
            _ => {}
        }
    }

    fn open_element(&mut self, elem: ElementNode, self_closing: bool, at: usize) -> Result<()> {
        // A second <html> or <body> only contributes attributes.
        if matches!(elem.tag, Tag::Html | Tag::Body) {
            let tag = elem.tag.clone();
            if let Some(existing) = self.open.iter_mut().find(|e| e.tag == tag) {
                for (k, v) in elem.attributes {
                    if existing.attr(&k).is_none() {
                        existing.attributes.push((k, v));
                    }
                }
                return Ok(());
            }
        }

        self.close_implied(&elem.tag);

        if elem.tag.is_void() || self_closing {
            self.append(DomNode::Element(elem));
            return Ok(());
        }
        // Document wrappers do not count towards the limit.
        let wrapper = |t: &Tag| matches!(t, Tag::Html | Tag::Head | Tag::Body);
        let depth = self.open.iter().filter(|e| !wrapper(&e.tag)).count();
        if !wrapper(&elem.tag) && depth >= MAX_DEPTH {
            return Err(Error::malformed(
                self.input.as_bytes(),
                at,
                format!("elements nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.open.push(elem);
        Ok(())
    }

    fn close_element(&mut self, name: &str) {
        let tag = Tag::from_name(name);
        if tag.is_void() {
            return;
        }
        if let Some(i) = self.find_open(|t| *t == tag, |_| false) {
            self.pop_to(i);
        }
        // Otherwise a stray end tag: dropped.
    }

    // -- tokens -------------------------------------------------------------

    fn parse_text(&mut self) -> Result<()> {
        let start = self.pos;
        // A '<' that does not start markup is literal text.
        if self.starts_with("<") {
            self.pos += 1;
        }
        while !self.eof() && !self.starts_with("<") {
            self.advance_char();
        }
        let text = decode_entities(&self.input[start..self.pos])
            .map_err(|(offset, reason)| self.error_at(start + offset, reason))?;
        self.append(DomNode::Text(text));
        Ok(())
    }

    fn parse_cdata(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += "<![CDATA[".len();
        let end = self
            .find("]]>")
            .ok_or_else(|| self.error_at(start, "unterminated CDATA section"))?;
        let text = self.input[self.pos..end].to_string();
        self.pos = end + 3;
        self.append(DomNode::Text(text));
        Ok(())
    }

    fn parse_start_tag(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1; // '<'
        let name = self.parse_name();
        let mut elem = ElementNode::new(Tag::from_name(&name));
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(self.error_at(start, format!("unterminated <{name}> tag")));
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            let attr_start = self.pos;
            let key = self.parse_attr_name().to_ascii_lowercase();
            if key.is_empty() {
                // Stray character such as a lone '/' or quote.
                self.advance_char();
                continue;
            }
            self.skip_whitespace();
            let value = if self.starts_with("=") {
                self.pos += 1;
                self.skip_whitespace();
                self.parse_attr_value(attr_start)?
            } else {
                // Boolean attribute: XHTML spells it out.
                key.clone()
            };
            // First occurrence wins.
            if elem.attr(&key).is_none() {
                elem.attributes.push((key, value));
            }
        }

        if elem.tag.is_raw_text() && !self_closing {
            self.parse_raw_text(elem, start)
        } else if elem.tag == Tag::Title && !self_closing {
            self.parse_title(elem, start)
        } else {
            self.open_element(elem, self_closing, start)
        }
    }

    fn parse_end_tag(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 2; // '</'
        let name = self.parse_name();
        self.skip_past('>', "unterminated end tag")
            .map_err(|_| self.error_at(start, format!("unterminated </{name}> tag")))?;
        if !name.is_empty() {
            self.close_element(&name);
        }
        Ok(())
    }

    /// `<style>` / `<script>`: copy everything up to the matching end tag.
    fn parse_raw_text(&mut self, mut elem: ElementNode, start: usize) -> Result<()> {
        let end = self.find_end_tag(elem.tag.name()).ok_or_else(|| {
            self.error_at(start, format!("unterminated <{}> element", elem.tag.name()))
        })?;
        let raw = &self.input[self.pos..end];
        let content = strip_cdata(raw).unwrap_or(raw);
        if !content.is_empty() {
            elem.children.push(DomNode::Text(content.to_string()));
        }
        self.pos = end;
        self.skip_past('>', "unterminated end tag")?;
        self.open_element(elem, true, start)
    }

    /// `<title>`: text only, but character references still apply.
    fn parse_title(&mut self, mut elem: ElementNode, start: usize) -> Result<()> {
        let end = self
            .find_end_tag("title")
            .ok_or_else(|| self.error_at(start, "unterminated <title> element"))?;
        let text_start = self.pos;
        let text = decode_entities(&self.input[text_start..end])
            .map_err(|(offset, reason)| self.error_at(text_start + offset, reason))?;
        if !text.is_empty() {
            elem.children.push(DomNode::Text(text));
        }
        self.pos = end;
        self.skip_past('>', "unterminated end tag")?;
        self.open_element(elem, true, start)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attr_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\'' | '<') {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attr_value(&mut self, attr_start: usize) -> Result<String> {
        let quote = match self.current_char() {
            Some(q @ ('"' | '\'')) => Some(q),
            _ => None,
        };
        let (raw_start, raw_end) = match quote {
            Some(q) => {
                self.pos += 1;
                let start = self.pos;
                let end = self.input[start..]
                    .find(q)
                    .map(|i| start + i)
                    .ok_or_else(|| self.error_at(attr_start, "unterminated attribute value"))?;
                self.pos = end + 1;
                (start, end)
            }
            None => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    // "/>" closes the tag; a '/' inside a value (a URL) does not.
                    if c == '/' && self.input[self.pos + 1..].starts_with('>') {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                (start, self.pos)
            }
        };
        decode_entities(&self.input[raw_start..raw_end])
            .map_err(|(offset, reason)| self.error_at(raw_start + offset, reason))
    }

    fn skip_comment(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 4; // <!--
        let end = self
            .find("-->")
            .ok_or_else(|| self.error_at(start, "unterminated comment"))?;
        self.pos = end + 3;
        Ok(())
    }

    // -- cursor helpers -------------------------------------------------------

    fn skip_past(&mut self, c: char, reason: &str) -> Result<()> {
        match self.input[self.pos..].find(c) {
            Some(i) => {
                self.pos += i + c.len_utf8();
                Ok(())
            }
            None => Err(self.error_at(self.pos, reason)),
        }
    }

    fn find(&self, needle: &str) -> Option<usize> {
        self.input[self.pos..].find(needle).map(|i| self.pos + i)
    }

    /// Byte offset of the next `</name` (case-insensitive) at or after `pos`.
    fn find_end_tag(&self, name: &str) -> Option<usize> {
        let haystack = self.input[self.pos..].as_bytes();
        let needle_len = name.len() + 2;
        (0..haystack.len().saturating_sub(needle_len - 1)).find_map(|i| {
            let window = &haystack[i..i + needle_len];
            let matches = window[0] == b'<'
                && window[1] == b'/'
                && window[2..].eq_ignore_ascii_case(name.as_bytes());
            matches.then_some(self.pos + i)
        })
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }

    fn error_at(&self, offset: usize, reason: impl Into<String>) -> Error {
        Error::malformed(self.input.as_bytes(), offset, reason)
    }
}

/// Content of a `<![CDATA[ … ]]>` wrapper (optionally inside CSS/JS
/// comments), or `None` when `raw` is not wrapped.
fn strip_cdata(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("/*<![CDATA[*/")
        .and_then(|s| s.strip_suffix("/*]]>*/"))
        .or_else(|| {
            trimmed
                .strip_prefix("<![CDATA[")
                .and_then(|s| s.strip_suffix("]]>"))
        })?;
    Some(inner)
}

// ---------------------------------------------------------------------------
// Character references
// ---------------------------------------------------------------------------

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("copy", '\u{00A9}'),
    ("reg", '\u{00AE}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{00B7}'),
    ("deg", '\u{00B0}'),
    ("euro", '\u{20AC}'),
    ("pound", '\u{00A3}'),
    ("yen", '\u{00A5}'),
    ("cent", '\u{00A2}'),
    ("sect", '\u{00A7}'),
    ("para", '\u{00B6}'),
    ("laquo", '\u{00AB}'),
    ("raquo", '\u{00BB}'),
    ("times", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("plusmn", '\u{00B1}'),
    ("frac12", '\u{00BD}'),
    ("frac14", '\u{00BC}'),
    ("frac34", '\u{00BE}'),
    ("agrave", '\u{00E0}'),
    ("auml", '\u{00E4}'),
    ("ccedil", '\u{00E7}'),
    ("eacute", '\u{00E9}'),
    ("egrave", '\u{00E8}'),
    ("ntilde", '\u{00F1}'),
    ("ouml", '\u{00F6}'),
    ("szlig", '\u{00DF}'),
    ("uuml", '\u{00FC}'),
];

/// Decode character references. Unknown named references stay literal;
/// numeric references to impossible code points are an error, reported as
/// (byte offset within `s`, reason).
pub fn decode_entities(s: &str) -> std::result::Result<String, (usize, String)> {
    if !s.contains('&') {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut offset = 0;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .char_indices()
            .take(33)
            .find(|&(_, c)| c == ';' || c == '&' || c.is_whitespace() || c == '<')
            .filter(|&(_, c)| c == ';')
            .map(|(i, _)| i);

        let mut consumed = 1;
        match semi {
            Some(end) => {
                let name = &after[..end];
                if let Some(num) = name.strip_prefix('#') {
                    let parsed = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    match parsed {
                        Some(code) => match char::from_u32(code).filter(|&c| c != '\0') {
                            Some(c) => {
                                out.push(c);
                                consumed = end + 2;
                            }
                            None => {
                                return Err((
                                    offset + amp,
                                    format!("invalid character reference &{name};"),
                                ))
                            }
                        },
                        None => out.push('&'),
                    }
                } else if let Some((_, c)) = NAMED_ENTITIES.iter().find(|(n, _)| *n == name) {
                    out.push(*c);
                    consumed = end + 2;
                } else {
                    out.push('&');
                }
            }
            None => out.push('&'),
        }
        offset += amp + consumed;
        rest = &rest[amp + consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            // Recurse into <html>
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Depth-first search for the first element with `tag`.
pub fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == *tag => Some(e),
        DomNode::Element(e) => find_element(&e.children, tag),
        DomNode::Text(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            DomNode::Text(t) => panic!("expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<DIV Class="flex p-4"><p>Hello</p></DIV>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.classes(), vec!["flex", "p-4"]);
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn void_img_without_slash() {
        let nodes = parse_html(r#"<img src=logo.png alt="x"><p>after</p>"#).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(element(&nodes[0]).src(), Some("logo.png"));
        assert!(element(&nodes[0]).children.is_empty());
    }

    #[test]
    fn unquoted_url_attribute_keeps_slashes() {
        let nodes = parse_html("<a href=https://zerobase.io/qr01>go</a>").unwrap();
        assert_eq!(element(&nodes[0]).attr("href"), Some("https://zerobase.io/qr01"));
    }

    #[test]
    fn implied_paragraph_and_list_item_ends() {
        let nodes = parse_html("<p>one<p>two<ul><li>a<li>b</ul>").unwrap();
        assert_eq!(nodes.len(), 3);
        let ul = element(&nodes[2]);
        assert_eq!(ul.tag, Tag::Ul);
        assert_eq!(ul.children.len(), 2);
        assert_eq!(element(&ul.children[1]).text_content(), "b");
    }

    #[test]
    fn implied_table_cell_and_row_ends() {
        let nodes = parse_html("<table><tr><th>A<td>1<tr><th>B<td>2</table>").unwrap();
        let table = element(&nodes[0]);
        assert_eq!(table.children.len(), 2);
        for row in &table.children {
            assert_eq!(element(row).children.len(), 2);
        }
    }

    #[test]
    fn stray_end_tags_are_dropped_and_text_merges() {
        let nodes = parse_html("<div>a</span>b</div></div>").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).children, vec![DomNode::Text("ab".into())]);
    }

    #[test]
    fn duplicate_attributes_keep_the_first() {
        let nodes = parse_html(r#"<p id="a" ID="b" hidden>x</p>"#).unwrap();
        let p = element(&nodes[0]);
        assert_eq!(p.attr("id"), Some("a"));
        assert_eq!(p.attr("hidden"), Some("hidden"));
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = parse_html("<p>A &amp; B &lt;3 &#169; &#x2F; &bogus; & done</p>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "A & B <3 \u{a9} / &bogus; & done");
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse_html("<p>1 < 2</p>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "1 < 2");
    }

    #[test]
    fn style_content_is_raw() {
        let nodes = parse_html("<style>p > b { color: red }</style><p>x</p>").unwrap();
        let style = element(&nodes[0]);
        assert_eq!(style.text_content(), "p > b { color: red }");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn malformed_inputs_report_position() {
        for (html, line, column) in [
            ("<div class=\"a", 1, 6),
            ("<p>x</p>\n<div", 2, 1),
            ("<!-- open", 1, 1),
            ("<style>p{}", 1, 1),
            ("<p>&#0;</p>", 1, 4),
            ("<p>\n  &#xD800;</p>", 2, 3),
        ] {
            match parse_html(html) {
                Err(Error::MalformedMarkup { line: l, column: c, .. }) => {
                    assert_eq!((l, c), (line, column), "position for {html:?}")
                }
                other => panic!("expected malformed markup for {html:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn nesting_limit() {
        let html = "<div>".repeat(MAX_DEPTH + 1);
        assert!(matches!(parse_html(&html), Err(Error::MalformedMarkup { .. })));
        let wrapped = format!("<html><body>{}", "<div>".repeat(MAX_DEPTH));
        assert!(parse_html(&wrapped).is_ok());
    }

    #[test]
    fn body_children_skips_head() {
        let nodes =
            parse_html("<html><head><title>T</title></head><body><p>x</p></body></html>").unwrap();
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
        assert_eq!(find_element(&nodes, &Tag::Title).unwrap().text_content(), "T");
    }
}
