//! Integration tests for the qr-onboard pipeline.
//!
//! These tests validate:
//! - generated symbols decode back to the target URI, logo and all
//! - generation is deterministic
//! - templates bind completely and tidy idempotently
//! - the onboarding sheet renders to a valid PDF

use qr_onboard::dom::{parse_html, DomNode, Tag};
use qr_onboard::{
    tidy, Address, BundledResources, CodeConfig, ContactInfo, DirResources, DocumentFactory,
    Error, MemoryResources, Organization, OrganizationId, QrCodeGenerator, QrImage, ScannableId,
};
use serde_json::json;
use sha2::{Digest, Sha256};

// =====================================================================
// Helpers
// =====================================================================

fn generator() -> QrCodeGenerator {
    QrCodeGenerator::from_resources(CodeConfig::default(), &BundledResources).unwrap()
}

fn fake_org() -> Organization {
    Organization {
        id: OrganizationId("fake-org".into()),
        name: "Fake Org".into(),
        address: Address::new("", "", "Manchester", "New Hampshire", "", ""),
        contact_name: String::new(),
        contact_info: ContactInfo::default(),
    }
}

/// Decode the single QR symbol in `img` with an independent decoder.
fn decode(img: &QrImage) -> String {
    let luma = image::load_from_memory(img.as_bytes()).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one symbol for {}", img.uri());
    let (_meta, content) = grids[0].decode().unwrap();
    content
}

fn sha256(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Scannable codes
// =====================================================================

#[test]
fn qr01_decodes_to_its_uri() {
    let img = generator().generate("qr01").unwrap();
    assert_eq!(img.uri(), "https://zerobase.io/qr01");
    assert_eq!(decode(&img), "https://zerobase.io/qr01");
}

#[test]
fn escaped_identifiers_round_trip() {
    let gen = generator();
    for id in ["a b/c", "caf\u{e9}", "x?y#z", "100%", "site:42"] {
        let img = gen.generate(id).unwrap();
        let expected = gen.target_uri(&ScannableId::new(id).unwrap()).unwrap();
        assert_eq!(decode(&img), expected.as_str(), "identifier {id:?}");
        // One segment: nothing after the origin's slash is left unescaped.
        assert!(!img.uri()["https://zerobase.io/".len()..].contains('/'));
    }
}

#[test]
fn generation_is_deterministic() {
    let a = generator().generate("qr01").unwrap();
    let b = generator().generate("qr01").unwrap();
    assert_eq!(sha256(a.as_bytes()), sha256(b.as_bytes()));
    let other = generator().generate("qr02").unwrap();
    assert_ne!(sha256(a.as_bytes()), sha256(other.as_bytes()));
}

#[test]
fn logo_never_breaks_scanning() {
    let gen = generator();
    let long = "z".repeat(ScannableId::MAX_LEN);
    let ids = [
        "qr01",
        "1",
        "site-42",
        "ZB-2020-000001",
        "7b3f9a2c-1d4e-4f60-9a8b-0c1d2e3f4a5b",
        long.as_str(),
    ];
    for id in ids {
        let img = gen.generate(id).unwrap();
        assert_eq!(decode(&img), img.uri(), "identifier {id:?}");
    }
}

#[test]
fn largest_logo_still_scans() {
    let mut config = CodeConfig::default();
    config.logo_fraction = 1.0;
    let gen = QrCodeGenerator::from_resources(config, &BundledResources).unwrap();
    assert_eq!(gen.config().logo_fraction, qr_onboard::qr::MAX_LOGO_FRACTION);

    let long = "z".repeat(ScannableId::MAX_LEN);
    for id in ["qr01", "site-42", long.as_str()] {
        let img = gen.generate(id).unwrap();
        assert_eq!(decode(&img), img.uri(), "identifier {id:?}");
    }
}

#[test]
fn custom_base_uri_is_honoured() {
    let gen = QrCodeGenerator::from_resources(
        CodeConfig::with_base_uri("https://checkin.example.org/s/"),
        &BundledResources,
    )
    .unwrap();
    let img = gen.generate("qr01").unwrap();
    assert_eq!(decode(&img), "https://checkin.example.org/s/qr01");
}

#[test]
fn logo_from_a_directory_store() {
    let res = DirResources::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
    let from_dir = QrCodeGenerator::from_resources(CodeConfig::default(), &res)
        .unwrap()
        .generate("qr01")
        .unwrap();
    let bundled = generator().generate("qr01").unwrap();
    assert_eq!(sha256(from_dir.as_bytes()), sha256(bundled.as_bytes()));
}

// =====================================================================
// Document factory
// =====================================================================

#[test]
fn fake_org_sheet_renders_to_pdf() {
    let code = generator().generate("qr01").unwrap();
    let doc = DocumentFactory::bundled()
        .site_onboarding(&fake_org(), &code)
        .unwrap();
    assert_valid_pdf(&doc.render().unwrap());
}

#[test]
fn binding_is_complete() {
    let org = Organization {
        id: OrganizationId("org-7".into()),
        name: "Harbor & Sons".into(),
        address: Address::new("Unit 3", "1 Dock Rd", "Portsmouth", "NH", "03801", "USA"),
        contact_name: "Sam Lee".into(),
        contact_info: ContactInfo::new("sam@harbor.example", "+1 603 555 0100"),
    };
    let code = generator().generate("harbor").unwrap();
    let doc = DocumentFactory::bundled().site_onboarding(&org, &code).unwrap();
    let xhtml = doc.xhtml();

    assert!(!xhtml.contains("{{") && !xhtml.contains("{%") && !xhtml.contains("}}"));
    for value in [
        "Harbor &amp; Sons",
        "Unit 3 1 Dock Rd",
        "Portsmouth, NH 03801",
        "USA",
        "Sam Lee",
        "sam@harbor.example",
        "+1 603 555 0100",
        "org-7",
        "https://zerobase.io/harbor",
    ] {
        assert!(xhtml.contains(value), "missing {value}");
    }

    let layout = doc.layout().unwrap();
    let lines = layout.text_lines();
    assert!(lines.contains(&"Harbor & Sons"));
    assert!(lines.contains(&"Portsmouth, NH 03801"));
}

#[test]
fn resolved_output_is_tidy_xhtml() {
    let code = generator().generate("qr01").unwrap();
    let doc = DocumentFactory::bundled()
        .site_onboarding(&fake_org(), &code)
        .unwrap();
    let xhtml = doc.xhtml();
    assert!(xhtml.contains(r#"<html xmlns="http://www.w3.org/1999/xhtml">"#));
    assert!(xhtml.contains("<br />") || !xhtml.contains("<br"));
    assert!(xhtml.contains("</li>") && xhtml.contains("</td>"));
    assert_eq!(tidy(xhtml).unwrap(), xhtml);
}

#[test]
fn layout_snapshot_is_deterministic() {
    let factory = DocumentFactory::bundled();
    let code = generator().generate("qr01").unwrap();
    let a = factory.site_onboarding(&fake_org(), &code).unwrap();
    let b = factory.site_onboarding(&fake_org(), &code).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a.layout().unwrap().to_json().unwrap(),
        b.layout().unwrap().to_json().unwrap()
    );
}

#[test]
fn unknown_template_is_reported() {
    let err = DocumentFactory::bundled()
        .resolve("missing-sheet", &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::TemplateNotFound(name) if name == "missing-sheet"));
}

#[test]
fn custom_templates_from_memory() {
    let res = MemoryResources::new().with(
        "templates/badge.html",
        b"<h1>{{ name }}</h1><ul>{% for r in rooms %}<li>{{ r }}{% endfor %}</ul>".to_vec(),
    );
    let doc = DocumentFactory::new(res)
        .resolve("badge", &json!({"name": "Visitor", "rooms": ["Lab", "Hall"]}))
        .unwrap();
    assert_eq!(doc.title(), "Document");
    let layout = doc.layout().unwrap();
    assert_eq!(layout.text_lines(), vec!["Visitor", "Lab", "Hall"]);
    assert_valid_pdf(&doc.render().unwrap());
}

#[test]
fn broken_template_markup_is_malformed() {
    let res = MemoryResources::new().with("templates/bad.html", b"<p>ok</p>\n<p title=\"oops>".to_vec());
    let err = DocumentFactory::new(res).resolve("bad", &json!({})).unwrap_err();
    assert!(matches!(err, Error::MalformedMarkup { line: 2, .. }), "{err:?}");
}

#[test]
fn remote_images_fail_layout() {
    let res = MemoryResources::new().with(
        "templates/remote.html",
        b"<img src=\"https://zerobase.io/logo.png\">".to_vec(),
    );
    let doc = DocumentFactory::new(res).resolve("remote", &json!({})).unwrap();
    assert!(matches!(doc.render(), Err(Error::Layout(_))));
}

// =====================================================================
// Tidy
// =====================================================================

const LOOSE_HTML: &[&str] = &[
    "<p>one<p>two",
    "<UL><LI>a<LI>b</UL>",
    "<table><tr><td>1<td>2<tr><td>3</table>",
    "<div><b>bold <i>both</b> italic?</i></div>",
    "<title>T</title><p class=x id=y>attrs",
    "<input type=checkbox checked disabled>",
    "text &amp; &lt;tags&gt; &copy; &#169; &#x41;",
    "<br><hr><img src=\"data:image/png;base64,AA==\" alt=\"\">",
    "<style>p > b { color: red }</style><p>styled",
    "</div>stray end tags</span>",
    "<html><body><p>already</p></body></html>",
    "<!-- comment --><p>after</p><?pi?>",
    "<h1>Title</h1>\n\n  <p>  spaced   text  </p>\n",
];

#[test]
fn tidy_is_idempotent_on_loose_html() {
    for input in LOOSE_HTML {
        let once = tidy(input).unwrap_or_else(|e| panic!("{input:?}: {e}"));
        let twice = tidy(&once).unwrap();
        assert_eq!(once, twice, "not idempotent for {input:?}");
    }
}

#[test]
fn tidy_keeps_text_and_order() {
    let out = tidy("<p>one<p>two<ul><li>three</ul>").unwrap();
    let dom = parse_html(&out).unwrap();
    let body = qr_onboard::dom::find_element(&dom, &Tag::Body).unwrap();
    let texts: Vec<String> = body
        .children
        .iter()
        .filter_map(|n| match n {
            DomNode::Element(e) => Some(e.text_content()),
            DomNode::Text(_) => None,
        })
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[test]
fn unrepairable_markup_is_rejected() {
    for input in ["<p", "<!-- open", "<script>never closed", "&#0;", "<a href=\"x>"] {
        assert!(
            matches!(tidy(input), Err(Error::MalformedMarkup { .. })),
            "{input:?} should not tidy"
        );
    }
}
