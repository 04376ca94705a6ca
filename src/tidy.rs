//! Markup tidy – repairs loosely formed HTML into strict, well-formed XHTML.
//!
//! Parsing (and with it every structural repair the tree builder makes) is
//! done by [`crate::dom`]; this module normalises the document skeleton
//! (`html` / `head` / `body`, a `<title>`) and serialises the tree back out.
//! Output is compact, never pretty-printed, so tidying is idempotent:
//! `tidy(tidy(x)) == tidy(x)`.

use crate::dom::{self, DomNode, ElementNode, Tag};
use crate::error::{Error, Result};

const XHTML_DOCTYPE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#;
const HTML_DOCTYPE: &str = "<!DOCTYPE html>";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TidyOptions {
    /// Emit XHTML 1.0 Strict (doctype, `xmlns`, self-closed void elements,
    /// CDATA-wrapped style and script). Plain HTML otherwise.
    pub xhtml: bool,
    /// Insert an empty `<title>` when the document has none.
    pub add_title: bool,
}

impl Default for TidyOptions {
    fn default() -> Self {
        Self {
            xhtml: true,
            add_title: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tidy {
    options: TidyOptions,
}

impl Tidy {
    pub fn new(options: TidyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> TidyOptions {
        self.options
    }

    /// Tidy raw bytes, which must be UTF-8 (a leading BOM is ignored).
    pub fn tidy_bytes(&self, input: &[u8]) -> Result<String> {
        let body = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
        let html = std::str::from_utf8(body).map_err(|e| {
            Error::malformed(body, e.valid_up_to(), "input is not valid UTF-8")
        })?;
        self.tidy(html)
    }

    pub fn tidy(&self, html: &str) -> Result<String> {
        let nodes = dom::parse_html(html)?;
        let mut doc = Skeleton::default();
        doc.distribute(nodes, Wrapper::Fragment);

        if self.options.add_title && !doc.has_title {
            doc.head.insert(0, DomNode::Element(ElementNode::new(Tag::Title)));
        }
        if self.options.xhtml && doc.html.attr("xmlns").is_none() {
            doc.html
                .attributes
                .insert(0, ("xmlns".to_string(), XHTML_NAMESPACE.to_string()));
        }

        let mut out = String::with_capacity(html.len() + 256);
        out.push_str(if self.options.xhtml {
            XHTML_DOCTYPE
        } else {
            HTML_DOCTYPE
        });
        out.push('\n');

        let writer = Writer {
            xhtml: self.options.xhtml,
        };
        doc.html.children = vec![
            DomNode::Element(ElementNode {
                children: doc.head,
                ..doc.head_element
            }),
            DomNode::Element(ElementNode {
                children: trim_blank_ends(clean_children(doc.body, false)),
                ..doc.body_element
            }),
        ];
        writer.element(&mut out, &doc.html);
        out.push('\n');

        log::debug!("tidied markup: {} bytes in, {} bytes out", html.len(), out.len());
        Ok(out)
    }
}

/// Tidy `html` with default options.
pub fn tidy(html: &str) -> Result<String> {
    Tidy::default().tidy(html)
}

// ---------------------------------------------------------------------------
// Document skeleton
// ---------------------------------------------------------------------------

struct Skeleton {
    html: ElementNode,
    head_element: ElementNode,
    body_element: ElementNode,
    head: Vec<DomNode>,
    body: Vec<DomNode>,
    has_title: bool,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            html: ElementNode::new(Tag::Html),
            head_element: ElementNode::new(Tag::Head),
            body_element: ElementNode::new(Tag::Body),
            head: Vec::new(),
            body: Vec::new(),
            has_title: false,
        }
    }
}

/// Which document wrapper a run of top-level nodes came from.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Wrapper {
    Fragment,
    Html,
    Head,
    Body,
}

impl Skeleton {
    /// Sort top-level nodes into head and body.
    fn distribute(&mut self, nodes: Vec<DomNode>, wrapper: Wrapper) {
        for node in nodes {
            let elem = match node {
                DomNode::Text(text) => {
                    // Whitespace between `html`, `head` and `body` is markup, not content.
                    let inter_element = matches!(wrapper, Wrapper::Html | Wrapper::Head);
                    if !(inter_element && text.trim().is_empty()) {
                        self.body.push(DomNode::Text(text));
                    }
                    continue;
                }
                DomNode::Element(elem) => elem,
            };
            match elem.tag {
                Tag::Html => {
                    merge_attributes(&mut self.html, elem.attributes);
                    self.distribute(elem.children, Wrapper::Html);
                }
                Tag::Head => {
                    merge_attributes(&mut self.head_element, elem.attributes);
                    self.distribute(elem.children, Wrapper::Head);
                }
                Tag::Body => {
                    merge_attributes(&mut self.body_element, elem.attributes);
                    self.distribute(elem.children, Wrapper::Body);
                }
                Tag::Title => {
                    // Only the first title survives.
                    if !self.has_title {
                        self.has_title = true;
                        self.head.push(DomNode::Element(elem));
                    }
                }
                Tag::Script if wrapper == Wrapper::Head => self.head.push(DomNode::Element(elem)),
                _ if elem.tag.is_head_content() && elem.tag != Tag::Script => {
                    self.head.push(DomNode::Element(elem))
                }
                _ => self.body.push(DomNode::Element(elem)),
            }
        }
    }
}

fn merge_attributes(target: &mut ElementNode, attributes: Vec<(String, String)>) {
    for (k, v) in attributes {
        if target.attr(&k).is_none() {
            target.attributes.push((k, v));
        }
    }
}

/// Drop whitespace-only text where it cannot be content, unwrap stray
/// document wrappers, and merge the text runs that leaves behind.
fn clean_children(children: Vec<DomNode>, structural: bool) -> Vec<DomNode> {
    let mut out: Vec<DomNode> = Vec::with_capacity(children.len());
    for node in children {
        match node {
            DomNode::Text(text) => {
                if structural && text.trim().is_empty() {
                    continue;
                }
                push_merged(&mut out, DomNode::Text(text));
            }
            DomNode::Element(elem) if matches!(elem.tag, Tag::Html | Tag::Head | Tag::Body) => {
                for child in clean_children(elem.children, structural) {
                    push_merged(&mut out, child);
                }
            }
            DomNode::Element(mut elem) => {
                if !elem.tag.is_raw_text() {
                    let structural = is_structural(&elem.tag);
                    elem.children = clean_children(elem.children, structural);
                }
                out.push(DomNode::Element(elem));
            }
        }
    }
    out
}

/// Drop whitespace-only text before the first and after the last body node.
fn trim_blank_ends(mut nodes: Vec<DomNode>) -> Vec<DomNode> {
    let blank = |n: &DomNode| matches!(n, DomNode::Text(t) if t.trim().is_empty());
    while nodes.last().is_some_and(blank) {
        nodes.pop();
    }
    let leading = nodes.iter().take_while(|n| blank(*n)).count();
    nodes.drain(..leading);
    nodes
}

fn push_merged(out: &mut Vec<DomNode>, node: DomNode) {
    if let DomNode::Text(text) = &node {
        if let Some(DomNode::Text(prev)) = out.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    out.push(node);
}

/// Elements whose direct text children can only be inter-element whitespace.
fn is_structural(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Table | Tag::Thead | Tag::Tbody | Tag::Tr | Tag::Ul | Tag::Ol
    )
}

// ---------------------------------------------------------------------------
// Serialiser
// ---------------------------------------------------------------------------

struct Writer {
    xhtml: bool,
}

impl Writer {
    fn node(&self, out: &mut String, node: &DomNode) {
        match node {
            DomNode::Text(text) => escape_into(out, text, false),
            DomNode::Element(elem) => self.element(out, elem),
        }
    }

    fn element(&self, out: &mut String, elem: &ElementNode) {
        let name = elem.tag.name();
        out.push('<');
        out.push_str(name);
        for (key, value) in &elem.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(out, value, true);
            out.push('"');
        }

        if elem.tag.is_void() {
            out.push_str(if self.xhtml { " />" } else { ">" });
            return;
        }
        out.push('>');

        if elem.tag.is_raw_text() {
            let content = elem.text_content();
            if self.xhtml && content.contains(['<', '&']) {
                out.push_str("/*<![CDATA[*/");
                out.push_str(&content);
                out.push_str("/*]]>*/");
            } else {
                out.push_str(&content);
            }
        } else {
            for child in &elem.children {
                self.node(out, child);
            }
        }

        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{00A0}' => out.push_str("&#160;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(head: &str, body: &str) -> String {
        format!(
            "{XHTML_DOCTYPE}\n<html xmlns=\"{XHTML_NAMESPACE}\"><head>{head}</head><body>{body}</body></html>\n"
        )
    }

    #[test]
    fn wraps_fragment_and_adds_title() {
        let out = tidy("<P CLASS=lead>Hello<BR>world").unwrap();
        assert_eq!(
            out,
            wrap("<title></title>", r#"<p class="lead">Hello<br />world</p>"#)
        );
    }

    #[test]
    fn hoists_head_content() {
        let out = tidy("<!DOCTYPE html>\n<meta charset=utf-8>\n<title>Check-in</title>\n<p>x").unwrap();
        assert_eq!(
            out,
            wrap(
                r#"<meta charset="utf-8" /><title>Check-in</title>"#,
                "<p>x</p>"
            )
        );
    }

    #[test]
    fn repairs_lists_and_tables() {
        let out = tidy("<ul>\n  <li>a\n  <li>b\n</ul><table>\n<tr><th>k<td>v\n</table>").unwrap();
        assert_eq!(
            out,
            wrap(
                "<title></title>",
                "<ul><li>a\n  </li><li>b\n</li></ul><table><tr><th>k</th><td>v\n</td></tr></table>"
            )
        );
    }

    #[test]
    fn drops_comments_and_stray_end_tags() {
        let out = tidy("<div>a<!-- note -->b</span></div></p>").unwrap();
        assert_eq!(out, wrap("<title></title>", "<div>ab</div>"));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let out = tidy(r#"<p title='say "hi"'>a&nbsp;b &amp; c &lt; d</p>"#).unwrap();
        assert_eq!(
            out,
            wrap(
                "<title></title>",
                r#"<p title="say &quot;hi&quot;">a&#160;b &amp; c &lt; d</p>"#
            )
        );
    }

    #[test]
    fn boolean_attributes_are_expanded() {
        let out = tidy("<input type=checkbox checked>").unwrap();
        assert!(out.contains(r#"<input type="checkbox" checked="checked" />"#));
    }

    #[test]
    fn style_with_markup_characters_is_cdata_wrapped() {
        let out = tidy("<style>p > b { color: red }</style><p>x</p>").unwrap();
        assert!(out.contains("<style>/*<![CDATA[*/p > b { color: red }/*]]>*/</style>"));
        assert_eq!(tidy(&out).unwrap(), out);
    }

    #[test]
    fn html_mode_keeps_void_elements_open() {
        let tidy = Tidy::new(TidyOptions {
            xhtml: false,
            add_title: false,
        });
        let out = tidy.tidy("<p>a<br>b").unwrap();
        assert_eq!(out, "<!DOCTYPE html>\n<html><head></head><body><p>a<br>b</p></body></html>\n");
    }

    #[test]
    fn only_first_title_survives() {
        let out = tidy("<title>one</title><title>two</title>").unwrap();
        assert_eq!(out, wrap("<title>one</title>", ""));
    }

    #[test]
    fn tidy_is_idempotent() {
        let corpus = [
            "",
            "plain text",
            "<p>one<p>two<div>three</div>",
            "<html lang=en><body class=a><p>x</body><body id=b><p>y",
            "<div><body><p>nested wrappers</p></body></div>",
            "<ul> <li>a <li>b <ol><li>c</ol> </ul>",
            "<table><thead><tr><th>a<tbody><tr><td>1<td>2<tr><td>3</table>",
            "<p>a &bogus; b & c</p><img src=x.png alt=\"a > b\">",
            "<head><script>if (a < b) {}</script><p>moved</head>",
            "<p>tab\there<br/>nbsp&#160;copy&copy;</p>",
            "<P><SPAN><DIV>x</DIV></SPAN></P>",
            "<title>A &amp; B</title><p>1 < 2</p>",
        ];
        for html in corpus {
            let once = tidy(html).unwrap();
            let twice = tidy(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {html:?}");
        }
    }

    #[test]
    fn keeps_spaces_between_body_level_inlines() {
        let out = tidy("<b>a</b> <i>b</i>").unwrap();
        assert_eq!(out, wrap("<title></title>", "<b>a</b> <i>b</i>"));
        assert_eq!(tidy(&out).unwrap(), out);

        let out = tidy("<html>\n<body>\n<span>Hello</span> <span>World</span>\n</body>\n</html>").unwrap();
        assert!(out.contains("<body><span>Hello</span> <span>World</span></body>"), "{out}");
        assert_eq!(tidy(&out).unwrap(), out);
    }

    #[test]
    fn unrepairable_markup_is_rejected() {
        for html in ["<div class=\"a", "<p>&#1114112;</p>", "<!-- open", "<script>x"] {
            assert!(
                matches!(tidy(html), Err(Error::MalformedMarkup { .. })),
                "{html:?} should be rejected"
            );
        }
    }

    #[test]
    fn tidy_bytes_checks_encoding() {
        let tidy = Tidy::default();
        let out = tidy.tidy_bytes(b"\xEF\xBB\xBF<p>x</p>").unwrap();
        assert!(out.contains("<body><p>x</p></body>"));

        let err = tidy.tidy_bytes(b"<p>\n\xC3</p>").unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup { line: 2, column: 1, .. }));
    }
}
