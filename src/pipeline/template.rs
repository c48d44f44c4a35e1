// src/pipeline/template.rs
//! Label and tooltip templates.
//!
//! A label template mixes literal text, `{field}` placeholders and inline
//! icon markers such as `<span class="icon">\u{f0e7}</span>`. Rendering
//! splits it into an ordered list of [`Segment`]s:
//! - icon markers become [`Segment::Icon`] with the tags stripped, never
//!   substituted
//! - the text between markers is trimmed, dropped when empty, and otherwise
//!   substituted into a [`Segment::Text`]
//!
//! Substitution is strict. `{{` and `}}` are literal braces, a name the field
//! source does not know is [`RenderError::UnknownField`] and aborts the whole
//! render. Rendering is a pure function of its inputs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::RenderError;

// ---

static ICON_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<span[^>]*>.*?</span>").expect("Invalid regex"));

static ICON_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<span[^>]*>|</span>").expect("Invalid regex"));

/// Named values a template can reference.
pub trait Fields {
    fn field(&self, name: &str) -> Option<&str>;
}

impl Fields for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// One piece of a rendered label, in template order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Segment {
    Icon(String),
    Text(String),
}

impl Segment {
    pub fn is_icon(&self) -> bool {
        matches!(self, Segment::Icon(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Segment::Icon(s) | Segment::Text(s) => s,
        }
    }
}

/// Render a label template into segments.
pub fn render<F: Fields + ?Sized>(template: &str, fields: &F) -> Result<Vec<Segment>, RenderError> {
    // ---
    let mut segments = Vec::new();
    let mut cursor = 0;

    for marker in ICON_MARKER.find_iter(template) {
        push_text(&template[cursor..marker.start()], fields, &mut segments)?;

        let icon = ICON_TAG.replace_all(marker.as_str(), "");
        let icon = icon.trim();
        if !icon.is_empty() {
            segments.push(Segment::Icon(icon.to_string()));
        }
        cursor = marker.end();
    }
    push_text(&template[cursor..], fields, &mut segments)?;

    Ok(segments)
}

/// Render a plain template (the tooltip) into a single string.
pub fn render_text<F: Fields + ?Sized>(template: &str, fields: &F) -> Result<String, RenderError> {
    substitute(template, fields)
}

fn push_text<F: Fields + ?Sized>(
    fragment: &str,
    fields: &F,
    segments: &mut Vec<Segment>,
) -> Result<(), RenderError> {
    // ---
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return Ok(());
    }
    segments.push(Segment::Text(substitute(fragment, fields)?));
    Ok(())
}

fn substitute<F: Fields + ?Sized>(text: &str, fields: &F) -> Result<String, RenderError> {
    // ---
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(RenderError::MalformedTemplate(format!(
                "single '}}' in {:?}",
                text
            )));
        } else {
            let close = tail.find('}').ok_or_else(|| {
                RenderError::MalformedTemplate(format!("unclosed '{{' in {:?}", text))
            })?;
            let name = &tail[1..close];
            let value = fields
                .field(name)
                .ok_or_else(|| RenderError::UnknownField(name.to_string()))?;
            out.push_str(value);
            rest = &tail[close + 1..];
        }
    }
    out.push_str(rest);

    Ok(out)
}
