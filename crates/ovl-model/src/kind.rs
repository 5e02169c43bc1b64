//! Item kinds and their field payloads
//!
//! Defines the [`ItemKind`] trait shared by headers, queries and assertions.
//! This is a sealed trait - the three kinds are the complete set.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Trait for overlay item kinds
///
/// Every algorithm in the engine is written once against this trait and
/// instantiated per kind.
///
/// # Contract
/// - `Fields::default()` is the cleared state used when resetting a
///   standalone delta row
/// - `apply_patch` only touches fields present in the patch
/// - `TAG` is unique per kind and stable (it is persisted)
pub trait ItemKind: Send + Sync + 'static + Debug + Clone + Copy + PartialEq + private::Sealed {
    /// Kind-specific payload
    type Fields: Send
        + Sync
        + 'static
        + Debug
        + Clone
        + PartialEq
        + Default
        + Serialize
        + DeserializeOwned;

    /// Partial update of [`Self::Fields`]
    type Patch: Send + Sync + 'static + Debug + Clone + Default + Serialize + DeserializeOwned;

    /// Persisted kind tag
    const TAG: KindTag;

    /// Apply a partial update in place
    fn apply_patch(fields: &mut Self::Fields, patch: Self::Patch);

    /// Validate user-supplied fields
    ///
    /// # Errors
    /// Returns error if a required field is missing
    fn validate_fields(_fields: &Self::Fields) -> Result<(), FieldError> {
        Ok(())
    }

    /// Validate only the fields a patch sets
    ///
    /// A cleared row (see `Fields::default()`) stays patchable one field at
    /// a time.
    ///
    /// # Errors
    /// Returns error if the patch sets a required field to an empty value
    fn validate_patch(_patch: &Self::Patch) -> Result<(), FieldError> {
        Ok(())
    }
}

/// Sealed trait - prevents external implementations
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Persisted discriminator for item kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Header,
    Query,
    Assertion,
}

impl KindTag {
    /// All tags, in storage order
    pub const ALL: [KindTag; 3] = [KindTag::Header, KindTag::Query, KindTag::Assertion];

    /// String representation
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Query => "query",
            Self::Assertion => "assertion",
        }
    }
}

impl Display for KindTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Header/query key is empty
    #[error("key must not be empty")]
    EmptyKey,

    /// Assertion condition has no target path
    #[error("assertion condition path must not be empty")]
    EmptyConditionPath,
}

/// Payload shared by headers and query parameters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyValueFields {
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
}

impl KeyValueFields {
    /// Enabled key/value pair with no description
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
            description: String::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With enabled flag
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Partial update for [`KeyValueFields`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyValuePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl KeyValuePatch {
    /// Patch that only replaces the value
    #[must_use]
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Patch that only toggles the enabled flag
    #[must_use]
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    fn apply(self, fields: &mut KeyValueFields) {
        if let Some(key) = self.key {
            fields.key = key;
        }
        if let Some(value) = self.value {
            fields.value = value;
        }
        if let Some(enabled) = self.enabled {
            fields.enabled = enabled;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
    }
}

fn validate_key_value(fields: &KeyValueFields) -> Result<(), FieldError> {
    if fields.key.trim().is_empty() {
        return Err(FieldError::EmptyKey);
    }
    Ok(())
}

fn validate_key_value_patch(patch: &KeyValuePatch) -> Result<(), FieldError> {
    match &patch.key {
        Some(key) if key.trim().is_empty() => Err(FieldError::EmptyKey),
        _ => Ok(()),
    }
}

/// Comparison performed by an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    #[default]
    Equal,
    NotEqual,
    Contains,
    NotContains,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

/// Structured assertion condition
///
/// Expression parsing lives outside this crate; the condition is stored as
/// the already-structured comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Condition {
    pub comparison: ComparisonKind,
    /// Response path the assertion reads, e.g. `response.status`
    pub path: String,
    pub value: String,
}

impl Condition {
    #[must_use]
    pub fn new(comparison: ComparisonKind, path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            comparison,
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Payload of an assertion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssertionFields {
    pub condition: Condition,
    pub enabled: bool,
}

impl AssertionFields {
    /// Enabled assertion
    #[must_use]
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            enabled: true,
        }
    }
}

/// Partial update for [`AssertionFields`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssertionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Request header kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header;

/// Query parameter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Query;

/// Response assertion kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assertion;

impl private::Sealed for Header {}
impl private::Sealed for Query {}
impl private::Sealed for Assertion {}

impl ItemKind for Header {
    type Fields = KeyValueFields;
    type Patch = KeyValuePatch;

    const TAG: KindTag = KindTag::Header;

    fn apply_patch(fields: &mut Self::Fields, patch: Self::Patch) {
        patch.apply(fields);
    }

    fn validate_fields(fields: &Self::Fields) -> Result<(), FieldError> {
        validate_key_value(fields)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), FieldError> {
        validate_key_value_patch(patch)
    }
}

impl ItemKind for Query {
    type Fields = KeyValueFields;
    type Patch = KeyValuePatch;

    const TAG: KindTag = KindTag::Query;

    fn apply_patch(fields: &mut Self::Fields, patch: Self::Patch) {
        patch.apply(fields);
    }

    fn validate_fields(fields: &Self::Fields) -> Result<(), FieldError> {
        validate_key_value(fields)
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), FieldError> {
        validate_key_value_patch(patch)
    }
}

impl ItemKind for Assertion {
    type Fields = AssertionFields;
    type Patch = AssertionPatch;

    const TAG: KindTag = KindTag::Assertion;

    fn apply_patch(fields: &mut Self::Fields, patch: Self::Patch) {
        if let Some(condition) = patch.condition {
            fields.condition = condition;
        }
        if let Some(enabled) = patch.enabled {
            fields.enabled = enabled;
        }
    }

    fn validate_fields(fields: &Self::Fields) -> Result<(), FieldError> {
        if fields.condition.path.trim().is_empty() {
            return Err(FieldError::EmptyConditionPath);
        }
        Ok(())
    }

    fn validate_patch(patch: &Self::Patch) -> Result<(), FieldError> {
        match &patch.condition {
            Some(condition) if condition.path.trim().is_empty() => {
                Err(FieldError::EmptyConditionPath)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_patch_touches_only_present_fields() {
        let mut fields = KeyValueFields::new("Accept", "text/plain").with_description("fmt");
        Header::apply_patch(&mut fields, KeyValuePatch::value("application/json"));

        assert_eq!(fields.key, "Accept");
        assert_eq!(fields.value, "application/json");
        assert!(fields.enabled);
        assert_eq!(fields.description, "fmt");
    }

    #[test]
    fn empty_patch_is_noop() {
        let original = KeyValueFields::new("page", "1");
        let mut fields = original.clone();
        Query::apply_patch(&mut fields, KeyValuePatch::default());
        assert_eq!(fields, original);
    }

    #[test]
    fn key_value_validation_rejects_blank_key() {
        assert_eq!(
            Header::validate_fields(&KeyValueFields::new("  ", "x")),
            Err(FieldError::EmptyKey)
        );
        assert!(Query::validate_fields(&KeyValueFields::new("q", "")).is_ok());
    }

    #[test]
    fn patch_validation_only_checks_present_fields() {
        assert!(Header::validate_patch(&KeyValuePatch::value("2")).is_ok());
        assert_eq!(
            Query::validate_patch(&KeyValuePatch {
                key: Some(" ".into()),
                ..KeyValuePatch::default()
            }),
            Err(FieldError::EmptyKey)
        );
        assert!(Assertion::validate_patch(&AssertionPatch {
            enabled: Some(true),
            ..AssertionPatch::default()
        })
        .is_ok());
        assert_eq!(
            Assertion::validate_patch(&AssertionPatch {
                condition: Some(Condition::default()),
                ..AssertionPatch::default()
            }),
            Err(FieldError::EmptyConditionPath)
        );
    }

    #[test]
    fn assertion_patch_and_validation() {
        let mut fields = AssertionFields::new(Condition::new(
            ComparisonKind::Equal,
            "response.status",
            "200",
        ));
        Assertion::apply_patch(
            &mut fields,
            AssertionPatch {
                enabled: Some(false),
                ..AssertionPatch::default()
            },
        );
        assert!(!fields.enabled);
        assert_eq!(fields.condition.value, "200");

        assert_eq!(
            Assertion::validate_fields(&AssertionFields::default()),
            Err(FieldError::EmptyConditionPath)
        );
    }

    #[test]
    fn kind_tags_are_distinct() {
        assert_ne!(Header::TAG, Query::TAG);
        assert_ne!(Query::TAG, Assertion::TAG);
        assert_eq!(KindTag::Assertion.to_string(), "assertion");
    }
}
