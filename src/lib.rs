//! # qr-onboard – branded QR codes and onboarding sheets
//!
//! Two pieces share this crate:
//!
//! * the **scannable-code generator** ([`qr`]) turns an identifier into a
//!   PNG QR code pointing at `<base uri>/<identifier>`, encoded at
//!   error-correction level H with the brand logo composited at its centre;
//! * the **document factory** ([`document`]) binds a data model into a named
//!   template, tidies the markup into strict XHTML and renders it to PDF.
//!
//! The rendering pipeline stages are:
//!
//! 1. **Bind** – template + model → HTML with Tera ([`templates`])
//! 2. **Tidy** – loose HTML → XHTML ([`tidy`], parser in [`dom`])
//! 3. **Style** – inline styles and utility classes ([`style`])
//! 4. **Layout** – flexbox layout with Taffy ([`layout`], metrics in [`fonts`])
//! 5. **Paginate** – split into pages ([`pagination`], IR in [`layout_config`])
//! 6. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! ```no_run
//! use qr_onboard::{CodeConfig, DocumentFactory, QrCodeGenerator, BundledResources};
//! # fn main() -> qr_onboard::Result<()> {
//! # let organization: qr_onboard::Organization = unimplemented!();
//! let generator = QrCodeGenerator::from_resources(CodeConfig::default(), &BundledResources)?;
//! let code = generator.generate("qr01")?;
//! let pdf = DocumentFactory::bundled()
//!     .site_onboarding(&organization, &code)?
//!     .render()?;
//! std::fs::write("zerobase-qr.pdf", pdf)?;
//! # Ok(())
//! # }
//! ```

pub mod data_uri;
pub mod document;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod layout_config;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod qr;
pub mod render;
pub mod resources;
pub mod style;
pub mod templates;
pub mod tidy;

// Re-exports for convenience
pub use document::{DocumentFactory, ResolvedDocument};
pub use error::{Error, Result};
pub use layout_config::LayoutConfig;
pub use model::{Address, ContactInfo, Organization, OrganizationId, ScannableId};
pub use pipeline::{layout_document, render_document, PageOrientation, PipelineConfig};
pub use qr::{CodeConfig, QrCodeGenerator, QrImage};
pub use resources::{BundledResources, DirResources, MemoryResources, Resources, LOGO_RESOURCE};
pub use templates::SITE_ONBOARDING;
pub use tidy::{tidy, Tidy, TidyOptions};
