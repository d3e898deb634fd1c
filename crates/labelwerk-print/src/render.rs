// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label rendering seam.
//
// Rendering engines live outside the fleet. The fleet only needs template
// metadata for printer selection and a deterministic `render` that turns a
// template plus field values into printer-ready bytes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{FieldValues, TemplateSpec};

/// Printer-ready bytes and the dialect the renderer produced them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLabel {
    pub payload: Vec<u8>,
    /// Free-form dialect name such as `zpl` or `EPL2`; may be empty.
    pub dialect_hint: String,
}

pub trait Renderer: Send + Sync {
    fn template(&self, name: &str) -> Option<TemplateSpec>;

    /// Must not have side effects.
    fn render(&self, template: &str, fields: &FieldValues) -> Result<RenderedLabel>;
}

/// A template held in memory: metadata plus a body with `{{ field }}`
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelTemplate {
    #[serde(flatten)]
    pub spec: TemplateSpec,
    #[serde(default)]
    pub dialect: String,
    pub body: String,
}

/// Placeholder substitution over a fixed template set.
#[derive(Debug, Default)]
pub struct StaticRenderer {
    templates: HashMap<String, LabelTemplate>,
}

impl StaticRenderer {
    pub fn new(templates: impl IntoIterator<Item = LabelTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.spec.name.clone(), t))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Renderer for StaticRenderer {
    fn template(&self, name: &str) -> Option<TemplateSpec> {
        self.templates.get(name).map(|t| t.spec.clone())
    }

    fn render(&self, template: &str, fields: &FieldValues) -> Result<RenderedLabel> {
        let entry = self
            .templates
            .get(template)
            .ok_or_else(|| LabelwerkError::TemplateNotFound(template.to_string()))?;

        Ok(RenderedLabel {
            payload: substitute(&entry.body, fields)?.into_bytes(),
            dialect_hint: entry.dialect.clone(),
        })
    }
}

fn substitute(body: &str, fields: &FieldValues) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| LabelwerkError::Render("unterminated '{{' placeholder".into()))?;

        let key = after[..close].trim();
        let value = fields
            .get(key)
            .ok_or_else(|| LabelwerkError::Render(format!("missing field '{key}'")))?;
        match value {
            serde_json::Value::String(s) => out.push_str(s),
            serde_json::Value::Null => {}
            other => out.push_str(&other.to_string()),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
