//! Document Factory – template name + data model in, PDF out, in two phases.
//!
//! [`DocumentFactory::resolve`] looks the template up, binds the model and
//! tidies the result into XHTML. The returned [`ResolvedDocument`] is cheap
//! and already validated; laying it out or rendering it is the expensive
//! second phase. `render` consumes the document, so one resolved document
//! produces at most one PDF.

use std::io::Write;

use serde::Serialize;

use crate::dom::parse_html;
use crate::error::Result;
use crate::layout_config::LayoutConfig;
use crate::model::Organization;
use crate::pipeline::{self, PipelineConfig};
use crate::qr::QrImage;
use crate::resources::{BundledResources, Resources};
use crate::templates::{TemplateResolver, SITE_ONBOARDING};
use crate::tidy::{Tidy, TidyOptions};

pub struct DocumentFactory<R> {
    resources: R,
    templates: TemplateResolver,
    tidy: Tidy,
    pipeline: PipelineConfig,
}

impl DocumentFactory<BundledResources> {
    /// Factory over the templates compiled into the crate.
    pub fn bundled() -> Self {
        Self::new(BundledResources)
    }
}

impl<R: Resources> DocumentFactory<R> {
    pub fn new(resources: R) -> Self {
        Self::with_options(resources, TidyOptions::default(), PipelineConfig::default())
    }

    pub fn with_options(resources: R, tidy: TidyOptions, pipeline: PipelineConfig) -> Self {
        Self {
            resources,
            templates: TemplateResolver::default(),
            tidy: Tidy::new(tidy),
            pipeline,
        }
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Bind `model` into template `name` and tidy the result.
    ///
    /// Nothing is laid out yet; a missing template fails here, before any
    /// output exists.
    pub fn resolve(&self, name: &str, model: &impl Serialize) -> Result<ResolvedDocument> {
        let html = self.templates.bind(&self.resources, name, model)?;
        let xhtml = self.tidy.tidy(&html)?;
        let title = pipeline::document_title(&parse_html(&xhtml)?, &self.pipeline);
        log::debug!("resolved template {name} as \"{title}\"");
        Ok(ResolvedDocument {
            xhtml,
            title,
            config: self.pipeline.clone(),
        })
    }

    /// The onboarding sheet for `organization`, showing `qr_code`.
    pub fn site_onboarding(
        &self,
        organization: &Organization,
        qr_code: &QrImage,
    ) -> Result<ResolvedDocument> {
        let model = OnboardingModel {
            organization,
            address_lines: organization.address.lines(),
            qr_code: QrCodeModel {
                data_uri: qr_code.to_data_uri(),
                uri: qr_code.uri(),
            },
        };
        self.resolve(SITE_ONBOARDING, &model)
    }
}

#[derive(Serialize)]
struct OnboardingModel<'a> {
    organization: &'a Organization,
    address_lines: Vec<String>,
    qr_code: QrCodeModel<'a>,
}

#[derive(Serialize)]
struct QrCodeModel<'a> {
    data_uri: String,
    uri: &'a str,
}

/// Tidied XHTML waiting to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    xhtml: String,
    title: String,
    config: PipelineConfig,
}

impl ResolvedDocument {
    pub fn xhtml(&self) -> &str {
        &self.xhtml
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            title: Some(self.title.clone()),
            ..self.config.clone()
        }
    }

    /// Paginated layout of the document. Repeatable: the same document always
    /// lays out the same way.
    pub fn layout(&self) -> Result<LayoutConfig> {
        pipeline::layout_document(&self.xhtml, &self.pipeline_config())
    }

    /// Render to PDF bytes, consuming the document.
    pub fn render(self) -> Result<Vec<u8>> {
        pipeline::render_document(&self.xhtml, &self.pipeline_config())
    }

    /// Render and write the PDF to `out`, returning the number of bytes
    /// written.
    pub fn render_to(self, mut out: impl Write) -> Result<u64> {
        let bytes = self.render()?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Address, ContactInfo, OrganizationId};
    use crate::qr::{CodeConfig, QrCodeGenerator};
    use crate::resources::MemoryResources;
    use serde_json::json;

    fn fake_org() -> Organization {
        Organization {
            id: OrganizationId("org-0001".into()),
            name: "Fake Org".into(),
            address: Address::new("", "", "Manchester", "New Hampshire", "", ""),
            contact_name: "Pat Doe".into(),
            contact_info: ContactInfo::new("pat@fake.org", ""),
        }
    }

    fn qr01() -> QrImage {
        QrCodeGenerator::from_resources(CodeConfig::default(), &BundledResources)
            .unwrap()
            .generate("qr01")
            .unwrap()
    }

    #[test]
    fn site_onboarding_binds_everything() {
        let doc = DocumentFactory::bundled()
            .site_onboarding(&fake_org(), &qr01())
            .unwrap();
        let xhtml = doc.xhtml();
        assert!(xhtml.starts_with("<!DOCTYPE html PUBLIC"));
        assert!(!xhtml.contains("{{") && !xhtml.contains("{%"));
        for needle in [
            "Fake Org",
            "Manchester, New Hampshire",
            "Pat Doe",
            "pat@fake.org",
            "org-0001",
            "https://zerobase.io/qr01",
            "data:image/png;base64,",
        ] {
            assert!(xhtml.contains(needle), "missing {needle}");
        }
        // Empty phone number means no phone row.
        assert!(!xhtml.contains("Phone"));
        assert_eq!(doc.title(), "Fake Org check-in");
    }

    #[test]
    fn resolved_document_renders_once_to_pdf() {
        let doc = DocumentFactory::bundled()
            .site_onboarding(&fake_org(), &qr01())
            .unwrap();
        let layout = doc.layout().unwrap();
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.boxes().filter(|b| b.image.is_some()).count(), 1);
        assert!(layout.text_lines().contains(&"Fake Org"));

        let pdf = doc.render().unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
    }

    #[test]
    fn layout_is_repeatable() {
        let doc = DocumentFactory::bundled()
            .site_onboarding(&fake_org(), &qr01())
            .unwrap();
        assert_eq!(
            doc.layout().unwrap().to_json().unwrap(),
            doc.layout().unwrap().to_json().unwrap()
        );
    }

    #[test]
    fn render_to_writes_all_bytes() {
        let res = MemoryResources::new().with("templates/note.html", b"<p>{{ text }}</p>".to_vec());
        let doc = DocumentFactory::new(res)
            .resolve("note", &json!({"text": "hello"}))
            .unwrap();
        let mut sink = Vec::new();
        let written = doc.render_to(&mut sink).unwrap();
        assert_eq!(written, sink.len() as u64);
        assert!(sink.starts_with(b"%PDF-"));
    }

    #[test]
    fn unknown_template_fails_before_output() {
        let err = DocumentFactory::bundled()
            .resolve("no-such-template", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(name) if name == "no-such-template"));
    }

    #[test]
    fn options_reach_tidy_and_pipeline() {
        let res = MemoryResources::new().with("templates/note.html", b"<p>x</p>".to_vec());
        let factory = DocumentFactory::with_options(
            res,
            TidyOptions {
                xhtml: false,
                add_title: false,
            },
            PipelineConfig::letter(),
        );
        let doc = factory.resolve("note", &json!({})).unwrap();
        assert!(doc.xhtml().starts_with("<!DOCTYPE html>"));
        assert_eq!(doc.title(), pipeline::DEFAULT_TITLE);
        assert_eq!(doc.layout().unwrap().page_width_pt, 612.0);
    }
}
