//! Metadata transform registry.
//!
//! Maps an output format key (the OAI metadata prefix) to its
//! [`MetadataFormat`] descriptor and transform function. The registry is
//! populated once at process start and never mutated afterwards; the
//! provider only reads from it. A transform is opaque to the rest of the
//! crate: it receives the raw structured record (the parsed graph document)
//! and returns an output element tree.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::element::Element;
use crate::error::ProviderError;
use crate::model::MetadataFormat;

/// Ambient values a transform may need beyond the raw record itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Handle-proxy prefix configured on the provider; transforms prepend it
    /// to bare handles to emit resolvable URLs.
    pub handle_proxy_prefix: String,
}

/// A transform from raw structured record (plus context) to output element
/// tree.
pub type TransformFn =
    Box<dyn Fn(&Value, &TransformContext) -> Result<Element, ProviderError> + Send + Sync>;

#[derive(Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, (MetadataFormat, TransformFn)>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transform under its format's prefix. Startup-time only;
    /// a later registration for the same prefix replaces the earlier one.
    pub fn register(&mut self, format: MetadataFormat, transform: TransformFn) {
        self.transforms
            .insert(format.prefix.clone(), (format, transform));
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.transforms.contains_key(prefix)
    }

    /// Descriptors of every registered format, in prefix order.
    pub fn formats(&self) -> Vec<MetadataFormat> {
        self.transforms
            .values()
            .map(|(format, _)| format.clone())
            .collect()
    }

    /// Runs the transform registered for `prefix` on `raw`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::FormatNotSupported`] for an unregistered prefix;
    /// otherwise whatever the transform itself reports.
    pub fn transform(
        &self,
        prefix: &str,
        raw: &Value,
        context: &TransformContext,
    ) -> Result<Element, ProviderError> {
        let (_, transform) =
            self.transforms
                .get(prefix)
                .ok_or_else(|| ProviderError::FormatNotSupported {
                    format: prefix.to_string(),
                })?;
        transform(raw, context)
    }
}
