//! Named variant registry
//!
//! Maps variant names (e.g. "thumbnail") to reusable transformation specs.
//! Built-in variants are seeded at construction and may be overridden or
//! extended by caller configuration. Registration is configuration-time
//! only: after initialization the registry is read-only, so concurrent
//! lookups need no locking.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::transformation::{Fit, TransformationSpec};

const MAX_VARIANT_NAME_LEN: usize = 100;

/// Registry of named transformation variants.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    variants: BTreeMap<String, TransformationSpec>,
}

impl VariantRegistry {
    /// Registry seeded with the built-in variants: `public`, `thumbnail`,
    /// `avatar`, and `hero`.
    pub fn builtin() -> Self {
        let mut variants = BTreeMap::new();
        variants.insert("public".to_string(), TransformationSpec::identity());
        variants.insert(
            "thumbnail".to_string(),
            TransformationSpec::builder()
                .dimensions(150, 150)
                .fit(Fit::Cover)
                .build()
                .expect("builtin variant spec is valid"),
        );
        variants.insert(
            "avatar".to_string(),
            TransformationSpec::builder()
                .dimensions(96, 96)
                .fit(Fit::Cover)
                .build()
                .expect("builtin variant spec is valid"),
        );
        variants.insert(
            "hero".to_string(),
            TransformationSpec::builder()
                .dimensions(1920, 640)
                .fit(Fit::Cover)
                .build()
                .expect("builtin variant spec is valid"),
        );
        Self { variants }
    }

    /// Empty registry (no built-ins), for callers that define everything.
    pub fn empty() -> Self {
        Self {
            variants: BTreeMap::new(),
        }
    }

    /// Register or override a variant. Configuration-time only.
    pub fn register(&mut self, name: &str, spec: TransformationSpec) -> Result<(), AppError> {
        Self::validate_name(name)?;
        self.variants.insert(name.to_string(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TransformationSpec> {
        self.variants.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Variant names: 1-100 chars, alphanumeric plus hyphen/underscore,
    /// not starting with a digit (to keep them distinct from image ids).
    fn validate_name(name: &str) -> Result<(), AppError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("variant", "name cannot be empty"));
        }
        if trimmed.len() > MAX_VARIANT_NAME_LEN {
            return Err(AppError::validation(
                "variant",
                format!("name cannot exceed {} characters", MAX_VARIANT_NAME_LEN),
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::validation(
                "variant",
                "name can only contain alphanumeric characters, hyphens, and underscores",
            ));
        }
        if trimmed
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
        {
            return Err(AppError::validation(
                "variant",
                "name cannot start with a digit",
            ));
        }
        Ok(())
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
