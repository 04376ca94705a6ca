//! Template store lookup and data binding.
//!
//! A template name such as `site-onboarding` maps to the resource
//! `templates/site-onboarding.html`, read as UTF-8 and bound with Tera
//! (`{{ var }}`, `{% if %}`, `{% for %}`, filters). Each call builds its own
//! Tera instance, so nothing is cached between documents.

use std::error::Error as _;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::resources::Resources;

/// Name of the bundled onboarding sheet template.
pub const SITE_ONBOARDING: &str = "site-onboarding";

/// Maps template names to resource names with a fixed prefix and suffix.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    pub prefix: String,
    pub suffix: String,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self {
            prefix: "templates/".to_string(),
            suffix: ".html".to_string(),
        }
    }
}

impl TemplateResolver {
    pub fn resource_name(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, name, self.suffix)
    }

    /// Read the raw template source for `name`.
    pub fn resolve_source(&self, resources: &impl Resources, name: &str) -> Result<String> {
        let resource = self.resource_name(name);
        let bytes = resources.resolve(&resource).map_err(|e| match e {
            Error::ResourceNotFound(_) => Error::TemplateNotFound(name.to_string()),
            other => other,
        })?;
        String::from_utf8(bytes).map_err(|e| {
            Error::malformed(
                e.as_bytes(),
                e.utf8_error().valid_up_to(),
                format!("template {resource} is not valid UTF-8"),
            )
        })
    }

    /// Resolve `name` and bind `model` into it, returning the raw HTML.
    ///
    /// `model` must serialise to a map; its top-level keys become template
    /// variables.
    pub fn bind(
        &self,
        resources: &impl Resources,
        name: &str,
        model: &impl Serialize,
    ) -> Result<String> {
        let source = self.resolve_source(resources, name)?;
        let template_err = |e: tera::Error| Error::Template {
            name: name.to_string(),
            reason: error_chain(&e),
        };

        let context = Context::from_serialize(model).map_err(template_err)?;

        // Registering under the suffixed name keeps Tera's HTML autoescaping on.
        let registered = format!("{name}{}", self.suffix);
        let mut tera = Tera::default();
        tera.add_raw_template(&registered, &source)
            .map_err(template_err)?;
        let html = tera.render(&registered, &context).map_err(template_err)?;
        log::trace!("bound template {name}: {} bytes", html.len());
        Ok(html)
    }
}

/// Tera nests the useful message (undefined variable, parse position) in the
/// source chain; flatten it into one line.
fn error_chain(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
