use chrono::Datelike;
use regex::{Captures, Regex};
use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::Formatter;
use std::sync::LazyLock;

static MERGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("merge token pattern is valid"));

/// Produces the substitution for a recognized token. The token name is
/// passed in so that plain field lookups can share one accessor.
pub type MergeAccessor = fn(&MergeData, &str) -> String;

fn field(data: &MergeData, name: &str) -> String {
    data.get(name).to_string()
}

fn current_year(data: &MergeData, _name: &str) -> String {
    match &data.year_override {
        Some(year) => year.clone(),
        None => chrono::Local::now().year().to_string(),
    }
}

/// Every token a stored template may reference. Anything else between
/// double braces is left in the output as written.
pub static MERGE_TAGS: &[(&str, MergeAccessor)] = &[
    ("name", field),
    ("firstName", field),
    ("lastName", field),
    ("email", field),
    ("phone", field),
    ("customerName", field),
    ("customerEmail", field),
    ("customerPhone", field),
    ("parentName", field),
    ("parentEmail", field),
    ("childName", field),
    ("childAge", field),
    ("locationName", field),
    ("locationEmail", field),
    ("locationPhone", field),
    ("locationAddress", field),
    ("locationSuburb", field),
    ("locationState", field),
    ("locationCountry", field),
    ("bookingReference", field),
    ("bookingDate", field),
    ("bookingTime", field),
    ("bookingType", field),
    ("notes", field),
    ("className", field),
    ("sessionDate", field),
    ("sessionTime", field),
    ("previousDate", field),
    ("previousTime", field),
    ("inviteLink", field),
    ("inviterName", field),
    ("role", field),
    ("formType", field),
    ("enquiryMessage", field),
    ("membershipName", field),
    ("weeklyAmount", field),
    ("joiningFee", field),
    ("firstPaymentTotal", field),
    ("startDate", field),
    ("refundAmount", field),
    ("portalUrl", field),
    ("year", current_year),
];

pub fn merge_accessor(name: &str) -> Option<MergeAccessor> {
    MERGE_TAGS
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, accessor)| *accessor)
}

/// Flat key/value map assembled fresh for every send.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeData {
    values: BTreeMap<String, String>,
    year_override: Option<String>,
}

impl MergeData {
    pub fn new() -> MergeData {
        MergeData::default()
    }

    /// Merge data supplied by an operator for a test send. Only on this
    /// path may a `year` value replace the current calendar year.
    pub fn for_test_send(values: &serde_json::Value) -> MergeData {
        let mut data = MergeData::new();
        data.extend_from_json(values);
        data.year_override = data.values.get("year").cloned();
        data
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn insert_opt(&mut self, key: &str, value: Option<&str>) {
        self.insert(key, value.unwrap_or_default());
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> MergeData {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Values (and any test-send year) from `other` take precedence.
    pub fn extend(&mut self, other: &MergeData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
        if other.year_override.is_some() {
            self.year_override = other.year_override.clone();
        }
    }

    /// Strings are taken as-is, numbers and booleans are stringified,
    /// and null becomes the empty string.
    pub fn extend_from_json(&mut self, values: &serde_json::Value) {
        if let serde_json::Value::Object(map) = values {
            for (key, value) in map {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.values.insert(key.clone(), value);
            }
        }
    }
}

pub fn render(text: &str, data: &MergeData) -> String {
    MERGE_TOKEN
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match merge_accessor(name) {
                Some(accessor) => accessor(data, name),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateString {
    string: String,
}

impl TemplateString {
    pub fn render(&self, data: &MergeData) -> String {
        render(&self.string, data)
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// Recognized token names referenced by this text, in order of first use.
    pub fn merge_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for caps in MERGE_TOKEN.captures_iter(&self.string) {
            let name = &caps[1];
            if merge_accessor(name).is_some() && !tags.iter().any(|t| t == name) {
                tags.push(name.to_string());
            }
        }
        tags
    }
}

impl Serialize for TemplateString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.string)
    }
}

struct TmplStrVisitor;

impl<'de> Visitor<'de> for TmplStrVisitor {
    type Value = TemplateString;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a template string")
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(TemplateString { string: v })
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(TemplateString { string: v.into() })
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(TemplateString::default())
    }
}

impl<'de> Deserialize<'de> for TemplateString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TmplStrVisitor)
    }
}

impl From<String> for TemplateString {
    fn from(value: String) -> Self {
        Self { string: value }
    }
}

impl From<&str> for TemplateString {
    fn from(value: &str) -> Self {
        Self {
            string: value.to_string(),
        }
    }
}
