//! # Template Renderer
//!
//! Resolves a template for (tenant, channel, name, language) and renders its
//! `{{ name }}` placeholders with request variables through Handlebars.
//!
//! Output is not HTML-escaped and inserted values are never rescanned, so the
//! same template and variables always produce the same bytes. A request is
//! rejected with `MissingVariable` when any declared required variable has no
//! value; other placeholders without a value render as the empty string. When
//! the requested language has no template the tenant's default-language
//! template is used.

use crate::constants::ChannelKind;
use crate::error::{NotificationError, Result, TemplateRenderError};
use crate::models::{RenderedContent, Template, TemplateKey};
use crate::store::ConfigurationStore;
use handlebars::Handlebars;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Shared registry: no escaping, unknown variables render empty
fn handlebars() -> &'static Handlebars<'static> {
    static REGISTRY: OnceLock<Handlebars<'static>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);
        registry
    })
}

pub struct TemplateRenderer {
    store: Arc<dyn ConfigurationStore>,
    default_language: String,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn ConfigurationStore>, default_language: impl Into<String>) -> Self {
        Self {
            store,
            default_language: default_language.into(),
        }
    }

    pub async fn render(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
        template_name: &str,
        language: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<RenderedContent> {
        let template = self
            .lookup(tenant_id, channel, template_name, language)
            .await?;
        Ok(render_template(&template, variables)?)
    }

    async fn lookup(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
        template_name: &str,
        language: &str,
    ) -> Result<Template> {
        let key = TemplateKey::new(tenant_id, channel, template_name, language);
        if let Some(template) = self.store.get_template(&key).await? {
            return Ok(template);
        }

        if language != self.default_language {
            let fallback = key.with_language(&self.default_language);
            if let Some(template) = self.store.get_template(&fallback).await? {
                debug!(
                    template = %key,
                    fallback_language = %self.default_language,
                    "Falling back to default-language template"
                );
                return Ok(template);
            }
        }

        Err(NotificationError::TemplateRender(
            TemplateRenderError::UnknownTemplate {
                tenant_id: tenant_id.to_string(),
                channel,
                name: template_name.to_string(),
                language: language.to_string(),
            },
        ))
    }
}

/// Render a resolved template with the given variables
pub fn render_template(
    template: &Template,
    variables: &BTreeMap<String, String>,
) -> std::result::Result<RenderedContent, TemplateRenderError> {
    let missing: Vec<String> = template
        .required_variables
        .iter()
        .filter(|name| !variables.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TemplateRenderError::MissingVariable {
            template: template.key.name.clone(),
            missing,
        });
    }

    let name = &template.key.name;
    let subject = template
        .subject
        .as_deref()
        .map(|subject| substitute(name, subject, variables))
        .transpose()?;

    Ok(RenderedContent {
        template_name: name.clone(),
        template_version: template.version,
        language: template.key.language.clone(),
        subject,
        body: substitute(name, &template.body, variables)?,
    })
}

/// Render one template text against the variables
pub fn substitute(
    template_name: &str,
    text: &str,
    variables: &BTreeMap<String, String>,
) -> std::result::Result<String, TemplateRenderError> {
    handlebars()
        .render_template(text, variables)
        .map_err(|e| TemplateRenderError::Malformed {
            template: template_name.to_string(),
            reason: e.to_string(),
        })
}
