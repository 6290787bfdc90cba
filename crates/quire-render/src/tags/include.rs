//! `include`, `include_relative` and `include_cached`.
//!
//! All three take a file name followed by optional `key=value` parameters,
//! which the included template sees as `include.key`:
//!
//! ```text
//! {% include nav.html active="home" %}
//! {% include_relative "parts/intro.md" %}
//! {% include_cached footer.html year=site.time %}
//! ```
//!
//! Every resolved file is recorded as a dependency of the page being
//! rendered. `include_cached` reuses the rendered output of an earlier call
//! with the same name and parameters.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, LazyLock};

use liquid_core::model::{ScalarCow, Value, ValueView};
use liquid_core::parser::{Language, ParseTag, TagReflection, TagTokenIter, TryMatchToken};
use liquid_core::runtime::{Expression, Renderable, Runtime, StackFrame, Variable};
use liquid_core::{Error, Result};
use regex::Regex;

use crate::partials::IncludeEnv;
use crate::value::{TemplateObject, TemplateValue};

/// Deepest allowed include nesting.
const MAX_DEPTH: usize = 64;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// `key=value` pair; the value is a quoted string or a bare word.
static PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w-]+)\s*=\s*("(?:[^"\\]|\\.)*"|'[^']*'|[\w.\-]+)"#).expect("static regex is valid")
});

/// Which include tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IncludeKind {
    /// File from the includes directory.
    Include,
    /// File relative to the including document.
    Relative,
    /// Like `Include`, with output reused across calls.
    Cached,
}

impl IncludeKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Relative => "include_relative",
            Self::Cached => "include_cached",
        }
    }
}

/// Parser for one of the include tags.
#[derive(Debug, Clone)]
pub(crate) struct IncludeTag {
    kind: IncludeKind,
    env: Arc<IncludeEnv>,
}

impl IncludeTag {
    pub(crate) fn new(kind: IncludeKind, env: Arc<IncludeEnv>) -> Self {
        Self { kind, env }
    }
}

impl TagReflection for IncludeTag {
    fn tag(&self) -> &str {
        self.kind.tag()
    }

    fn description(&self) -> &str {
        ""
    }
}

impl ParseTag for IncludeTag {
    fn parse(&self, mut arguments: TagTokenIter<'_>, _options: &Language) -> Result<Box<dyn Renderable>> {
        let name = arguments.expect_next("Include name expected.")?;
        let name = match name.expect_literal() {
            TryMatchToken::Matches(name) => name.to_kstr().to_string(),
            TryMatchToken::Fails(name) => name.as_str().to_owned(),
        };

        let mut rest = Vec::new();
        while let Ok(token) = arguments.expect_next("") {
            rest.push(token.as_str().to_owned());
        }
        let params = parse_params(&rest.join(" "))?;

        Ok(Box::new(Include {
            kind: self.kind,
            name,
            params,
            env: Arc::clone(&self.env),
        }))
    }

    fn reflection(&self) -> &dyn TagReflection {
        self
    }
}

/// Parse the parameter list that follows the file name.
///
/// Quoted values are string literals; numbers and booleans are literals;
/// any other bare word is a variable path such as `page.title`.
fn parse_params(text: &str) -> Result<Vec<(String, Expression)>> {
    let mut params = Vec::new();
    let mut end = 0;
    for captures in PARAM.captures_iter(text) {
        let (Some(all), Some(key), Some(value)) = (captures.get(0), captures.get(1), captures.get(2)) else {
            continue;
        };
        if !text[end..all.start()].trim().is_empty() {
            break;
        }
        params.push((key.as_str().to_owned(), param_value(value.as_str())));
        end = all.end();
    }
    let leftover = text[end..].trim();
    if !leftover.is_empty() {
        return Err(Error::with_msg(format!("Invalid include parameters: '{leftover}'")));
    }
    Ok(params)
}

fn param_value(raw: &str) -> Expression {
    if let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
    {
        return Expression::Literal(Value::scalar(inner.replace("\\\"", "\"")));
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Expression::Literal(Value::scalar(int));
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Expression::Literal(Value::scalar(float));
    }
    match raw {
        "true" => return Expression::Literal(Value::scalar(true)),
        "false" => return Expression::Literal(Value::scalar(false)),
        "nil" | "null" => return Expression::Literal(Value::Nil),
        _ => {}
    }

    let mut segments = raw.split('.');
    let mut variable = Variable::with_literal(segments.next().unwrap_or_default().to_owned());
    for segment in segments {
        variable = match segment.parse::<i64>() {
            Ok(index) => variable.push_literal(index),
            Err(_) => variable.push_literal(segment.to_owned()),
        };
    }
    Expression::Variable(variable)
}

#[derive(Debug)]
struct Include {
    kind: IncludeKind,
    name: String,
    params: Vec<(String, Expression)>,
    env: Arc<IncludeEnv>,
}

/// Source-relative path of the page being rendered, from `page.path`.
fn current_document(runtime: &dyn Runtime) -> Option<String> {
    let path = [ScalarCow::new("page"), ScalarCow::new("path")];
    runtime
        .try_get(&path)
        .filter(|value| !value.is_nil())
        .map(|value| value.to_kstr().to_string())
}

/// Stable key for `include_cached`: partial name plus parameter values.
fn cache_key(partial: &str, params: &BTreeMap<String, TemplateValue>) -> String {
    let mut key = partial.to_owned();
    for (name, value) in params {
        key.push('\u{1f}');
        key.push_str(name);
        key.push('=');
        key.push_str(&value.source().to_string());
    }
    key
}

/// Tracks include nesting on the rendering thread.
struct DepthGuard;

impl DepthGuard {
    fn enter(name: &str) -> Result<Self> {
        let depth = DEPTH.with(|d| {
            let next = d.get() + 1;
            d.set(next);
            next
        });
        let guard = Self;
        if depth > MAX_DEPTH {
            return Err(Error::with_msg(format!(
                "Include nesting deeper than {MAX_DEPTH} levels at '{name}'"
            )));
        }
        Ok(guard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

impl Include {
    fn render_include(&self, runtime: &dyn Runtime) -> Result<String> {
        let current = current_document(runtime);
        let resolved = self.env.resolve(self.kind, &self.name, current.as_deref())?;
        if let Some(document) = &current {
            self.env.record(document, &resolved.dependency);
        }

        let params: BTreeMap<String, TemplateValue> = self
            .params
            .iter()
            .map(|(key, expr)| {
                let value = expr
                    .try_evaluate(runtime)
                    .map_or(TemplateValue::Nil, |v| TemplateValue::from_view(&v));
                (key.clone(), value)
            })
            .collect();

        let cache_key = (self.kind == IncludeKind::Cached).then(|| cache_key(&resolved.partial, &params));
        if let Some(output) = cache_key.as_deref().and_then(|key| self.env.cached_output(key)) {
            tracing::trace!(include = %self.name, "include_cached hit");
            return Ok(output);
        }

        let _guard = DepthGuard::enter(&self.name)?;
        let mut scope = TemplateObject::default();
        if !params.is_empty() {
            scope.insert("include", TemplateValue::Object(TemplateObject(params)));
        }
        let frame = StackFrame::new(runtime, scope);
        let partial = frame.partials().get(&resolved.partial)?;
        let output = partial.render(&frame)?;

        if let Some(key) = cache_key {
            self.env.store_output(key, output.clone());
        }
        Ok(output)
    }
}

impl Renderable for Include {
    fn render_to(&self, writer: &mut dyn Write, runtime: &dyn Runtime) -> Result<()> {
        let output = self
            .render_include(runtime)
            .map_err(|e| e.trace(format!("{{% {} {} %}}", self.kind.tag(), self.name)))?;
        writer
            .write_all(output.as_bytes())
            .map_err(|e| Error::with_msg(format!("Failed to write include output: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn literal(expr: &Expression) -> Option<String> {
        if let Expression::Literal(value) = expr {
            Some(value.to_kstr().to_string())
        } else {
            None
        }
    }

    #[test]
    fn test_parse_params_literals() {
        let params = parse_params(r#"name="Ada Lovelace" year=1843 single='x' flag=true"#).unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "year", "single", "flag"]);
        assert_eq!(literal(&params[0].1).as_deref(), Some("Ada Lovelace"));
        assert_eq!(literal(&params[1].1).as_deref(), Some("1843"));
        assert_eq!(literal(&params[2].1).as_deref(), Some("x"));
        assert_eq!(literal(&params[3].1).as_deref(), Some("true"));
    }

    #[test]
    fn test_parse_params_spaced_and_variables() {
        let params = parse_params(r#"title = page.title"#).unwrap();
        assert_eq!(params.len(), 1);
        assert!(matches!(params[0].1, Expression::Variable(_)));
    }

    #[test]
    fn test_parse_params_rejects_garbage() {
        assert!(parse_params("").unwrap().is_empty());
        let err = parse_params("name=\"a\" ???").unwrap_err();
        assert!(err.to_string().contains("Invalid include parameters"));
    }
}
