//! Template values with lenient lookups.
//!
//! Liquid's own model treats a missing key as a render error. Site templates
//! routinely probe optional front matter (`{% if page.image %}`), so the
//! values handed to templates here answer every lookup: a missing key or
//! index yields nil, and indexing into nil yields nil again.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use liquid_core::model::{
    ArrayView, DisplayCow, KStringCow, Object, ObjectView, Scalar, State, Value, ValueView,
};
use serde_json::Map;

static NIL: TemplateValue = TemplateValue::Nil;
static EMPTY: TemplateObject = TemplateObject(BTreeMap::new());

/// A value visible to templates.
#[derive(Debug, Clone, Default)]
pub enum TemplateValue {
    /// Missing or null.
    #[default]
    Nil,
    /// String, number, boolean or date.
    Scalar(Scalar),
    /// Ordered list.
    Array(TemplateArray),
    /// String-keyed map.
    Object(TemplateObject),
}

impl TemplateValue {
    /// Convert a JSON value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Scalar(Scalar::new(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Scalar(Scalar::new(i)),
                None => Self::Scalar(Scalar::new(n.as_f64().unwrap_or_default())),
            },
            serde_json::Value::String(s) => Self::Scalar(Scalar::new(s.clone())),
            serde_json::Value::Array(items) => {
                Self::Array(TemplateArray(items.iter().map(Self::from_json).collect()))
            }
            serde_json::Value::Object(map) => Self::Object(TemplateObject::from_map(map)),
        }
    }

    /// Copy any liquid value.
    pub fn from_view(value: &dyn ValueView) -> Self {
        if value.is_nil() {
            Self::Nil
        } else if let Some(array) = value.as_array() {
            Self::Array(TemplateArray(
                array.values().map(|v| Self::from_view(v)).collect(),
            ))
        } else if let Some(object) = value.as_object() {
            Self::Object(TemplateObject(
                object
                    .iter()
                    .map(|(k, v)| (k.to_string(), Self::from_view(v)))
                    .collect(),
            ))
        } else if let Some(scalar) = value.as_scalar() {
            Self::Scalar(scalar.into_owned())
        } else {
            Self::Nil
        }
    }

    /// A string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::new(value.into()))
    }
}

impl ValueView for TemplateValue {
    fn as_debug(&self) -> &dyn fmt::Debug {
        self
    }

    fn render(&self) -> DisplayCow<'_> {
        match self {
            Self::Nil => DisplayCow::Borrowed(&""),
            Self::Scalar(s) => s.render(),
            Self::Array(a) => a.render(),
            Self::Object(o) => o.render(),
        }
    }

    fn source(&self) -> DisplayCow<'_> {
        match self {
            Self::Nil => DisplayCow::Borrowed(&"nil"),
            Self::Scalar(s) => s.source(),
            Self::Array(a) => a.source(),
            Self::Object(o) => o.source(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Scalar(s) => s.type_name(),
            Self::Array(a) => a.type_name(),
            Self::Object(o) => o.type_name(),
        }
    }

    fn query_state(&self, state: State) -> bool {
        match self {
            Self::Nil => !matches!(state, State::Truthy),
            Self::Scalar(s) => s.query_state(state),
            Self::Array(a) => a.query_state(state),
            Self::Object(o) => o.query_state(state),
        }
    }

    fn to_kstr(&self) -> KStringCow<'_> {
        match self {
            Self::Nil => KStringCow::from_static(""),
            Self::Scalar(s) => s.to_kstr(),
            Self::Array(a) => a.to_kstr(),
            Self::Object(o) => o.to_kstr(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Nil => Value::Nil,
            Self::Scalar(s) => Value::Scalar(s.clone()),
            Self::Array(a) => a.to_value(),
            Self::Object(o) => o.to_value(),
        }
    }

    fn as_scalar(&self) -> Option<liquid_core::model::ScalarCow<'_>> {
        match self {
            Self::Scalar(s) => s.as_scalar(),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&dyn ArrayView> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    fn as_object(&self) -> Option<&dyn ObjectView> {
        match self {
            Self::Object(o) => Some(o),
            // Lets `nil.anything` resolve to nil instead of failing.
            Self::Nil => Some(&EMPTY),
            Self::Scalar(_) | Self::Array(_) => None,
        }
    }

    fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// List of template values.
#[derive(Debug, Clone, Default)]
pub struct TemplateArray(pub Vec<TemplateValue>);

impl TemplateArray {
    fn resolve(&self, index: i64) -> Option<&TemplateValue> {
        let len = i64::try_from(self.0.len()).ok()?;
        let index = if index < 0 { len + index } else { index };
        usize::try_from(index).ok().and_then(|i| self.0.as_slice().get(i))
    }

    fn rendered(&self) -> String {
        self.0.iter().map(|v| v.render().to_string()).collect()
    }

    fn described(&self) -> String {
        let items: Vec<String> = self.0.iter().map(|v| v.source().to_string()).collect();
        format!("[{}]", items.join(", "))
    }
}

impl ValueView for TemplateArray {
    fn as_debug(&self) -> &dyn fmt::Debug {
        self
    }

    fn render(&self) -> DisplayCow<'_> {
        DisplayCow::Owned(Box::new(self.rendered()))
    }

    fn source(&self) -> DisplayCow<'_> {
        DisplayCow::Owned(Box::new(self.described()))
    }

    fn type_name(&self) -> &'static str {
        "array"
    }

    fn query_state(&self, state: State) -> bool {
        match state {
            State::Truthy => true,
            _ => self.0.is_empty(),
        }
    }

    fn to_kstr(&self) -> KStringCow<'_> {
        KStringCow::from_string(self.rendered())
    }

    fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(ValueView::to_value).collect())
    }

    fn as_array(&self) -> Option<&dyn ArrayView> {
        Some(self)
    }
}

impl ArrayView for TemplateArray {
    fn as_value(&self) -> &dyn ValueView {
        self
    }

    fn size(&self) -> i64 {
        i64::try_from(self.0.len()).unwrap_or(i64::MAX)
    }

    fn values<'k>(&'k self) -> Box<dyn Iterator<Item = &'k dyn ValueView> + 'k> {
        Box::new(self.0.iter().map(|v| v as &dyn ValueView))
    }

    fn contains_key(&self, index: i64) -> bool {
        self.resolve(index).is_some()
    }

    fn get(&self, index: i64) -> Option<&dyn ValueView> {
        Some(self.resolve(index).unwrap_or(&NIL))
    }
}

/// String-keyed map of template values, iterated in key order.
#[derive(Debug, Clone, Default)]
pub struct TemplateObject(pub BTreeMap<String, TemplateValue>);

impl TemplateObject {
    /// Convert a JSON object.
    pub fn from_map(map: &Map<String, serde_json::Value>) -> Self {
        Self(
            map.iter()
                .map(|(k, v)| (k.clone(), TemplateValue::from_json(v)))
                .collect(),
        )
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: TemplateValue) {
        self.0.insert(key.into(), value);
    }

    fn described(&self) -> String {
        let items: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("\"{k}\" => {}", v.source()))
            .collect();
        format!("{{{}}}", items.join(", "))
    }
}

impl ValueView for TemplateObject {
    fn as_debug(&self) -> &dyn fmt::Debug {
        self
    }

    fn render(&self) -> DisplayCow<'_> {
        DisplayCow::Owned(Box::new(self.described()))
    }

    fn source(&self) -> DisplayCow<'_> {
        DisplayCow::Owned(Box::new(self.described()))
    }

    fn type_name(&self) -> &'static str {
        "object"
    }

    fn query_state(&self, state: State) -> bool {
        match state {
            State::Truthy => true,
            _ => self.0.is_empty(),
        }
    }

    fn to_kstr(&self) -> KStringCow<'_> {
        KStringCow::from_string(self.described())
    }

    fn to_value(&self) -> Value {
        let mut object = Object::new();
        for (key, value) in &self.0 {
            object.insert(key.clone().into(), value.to_value());
        }
        Value::Object(object)
    }

    fn as_object(&self) -> Option<&dyn ObjectView> {
        Some(self)
    }
}

impl ObjectView for TemplateObject {
    fn as_value(&self) -> &dyn ValueView {
        self
    }

    fn size(&self) -> i64 {
        i64::try_from(self.0.len()).unwrap_or(i64::MAX)
    }

    fn keys<'k>(&'k self) -> Box<dyn Iterator<Item = KStringCow<'k>> + 'k> {
        Box::new(self.0.keys().map(|k| KStringCow::from(k.as_str())))
    }

    fn values<'k>(&'k self) -> Box<dyn Iterator<Item = &'k dyn ValueView> + 'k> {
        Box::new(self.0.values().map(|v| v as &dyn ValueView))
    }

    fn iter<'k>(&'k self) -> Box<dyn Iterator<Item = (KStringCow<'k>, &'k dyn ValueView)> + 'k> {
        Box::new(
            self.0
                .iter()
                .map(|(k, v)| (KStringCow::from(k.as_str()), v as &dyn ValueView)),
        )
    }

    fn contains_key(&self, index: &str) -> bool {
        self.0.contains_key(index)
    }

    fn get<'s>(&'s self, index: &str) -> Option<&'s dyn ValueView> {
        match self.0.get(index) {
            Some(value) => Some(value),
            // Leave `size` to the engine's built-in property.
            None if index == "size" => None,
            None => Some(&NIL),
        }
    }
}

/// Root scope of a render: the shared `site` value plus per-render entries.
///
/// Every root name resolves, so an unknown variable renders empty.
#[derive(Debug)]
pub(crate) struct Globals {
    site: Arc<TemplateValue>,
    entries: TemplateObject,
}

impl Globals {
    pub(crate) fn new(site: Arc<TemplateValue>, entries: TemplateObject) -> Self {
        Self { site, entries }
    }
}

impl ValueView for Globals {
    fn as_debug(&self) -> &dyn fmt::Debug {
        self
    }

    fn render(&self) -> DisplayCow<'_> {
        DisplayCow::Borrowed(&"")
    }

    fn source(&self) -> DisplayCow<'_> {
        DisplayCow::Borrowed(&"globals")
    }

    fn type_name(&self) -> &'static str {
        "object"
    }

    fn query_state(&self, state: State) -> bool {
        matches!(state, State::Truthy)
    }

    fn to_kstr(&self) -> KStringCow<'_> {
        KStringCow::from_static("")
    }

    fn to_value(&self) -> Value {
        let mut object = Object::new();
        object.insert("site".into(), self.site.to_value());
        for (key, value) in &self.entries.0 {
            object.insert(key.clone().into(), value.to_value());
        }
        Value::Object(object)
    }

    fn as_object(&self) -> Option<&dyn ObjectView> {
        Some(self)
    }
}

impl ObjectView for Globals {
    fn as_value(&self) -> &dyn ValueView {
        self
    }

    fn size(&self) -> i64 {
        self.entries.size().saturating_add(1)
    }

    fn keys<'k>(&'k self) -> Box<dyn Iterator<Item = KStringCow<'k>> + 'k> {
        Box::new(std::iter::once(KStringCow::from_static("site")).chain(self.entries.keys()))
    }

    fn values<'k>(&'k self) -> Box<dyn Iterator<Item = &'k dyn ValueView> + 'k> {
        Box::new(std::iter::once(&*self.site as &dyn ValueView).chain(self.entries.values()))
    }

    fn iter<'k>(&'k self) -> Box<dyn Iterator<Item = (KStringCow<'k>, &'k dyn ValueView)> + 'k> {
        Box::new(
            std::iter::once((KStringCow::from_static("site"), &*self.site as &dyn ValueView))
                .chain(self.entries.iter()),
        )
    }

    fn contains_key(&self, _index: &str) -> bool {
        true
    }

    fn get<'s>(&'s self, index: &str) -> Option<&'s dyn ValueView> {
        if let Some(value) = self.entries.0.get(index) {
            return Some(value);
        }
        if index == "site" {
            return Some(&*self.site);
        }
        Some(&NIL)
    }
}
