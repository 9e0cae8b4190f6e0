use crate::constants::ChannelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Templates are addressed by (tenant, channel, name, language)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateKey {
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub name: String,
    pub language: String,
}

impl TemplateKey {
    pub fn new(
        tenant_id: impl Into<String>,
        channel: ChannelKind,
        name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            channel,
            name: name.into(),
            language: language.into(),
        }
    }

    /// Same template in another language
    pub fn with_language(&self, language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tenant_id, self.channel, self.name, self.language
        )
    }
}

/// A versioned message body with named placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub key: TemplateKey,
    pub version: u32,
    pub subject: Option<String>,
    pub body: String,
    pub required_variables: BTreeSet<String>,
}

impl Template {
    pub fn new(key: TemplateKey, body: impl Into<String>) -> Self {
        Self {
            key,
            version: 1,
            subject: None,
            body: body.into(),
            required_variables: BTreeSet::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_required(mut self, names: &[&str]) -> Self {
        self.required_variables
            .extend(names.iter().map(|name| name.to_string()));
        self
    }
}

/// Output of a successful render, pinned to the task for every retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedContent {
    pub template_name: String,
    pub template_version: u32,
    pub language: String,
    pub subject: Option<String>,
    pub body: String,
}
