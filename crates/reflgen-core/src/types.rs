//! Type descriptors: the types a run generates registration code for.
//!
//! Descriptors come from two places: headers walked by the
//! [`Scanner`](crate::scanner::Scanner), and type descriptor documents of the form
//!
//! ```json
//! {
//!     "components": [
//!         { "type": "kengine::data::transform", "header": "kengine/data/transform.hpp" }
//!     ],
//!     "types": [
//!         { "type": "putils::point3f", "header": "putils/point.hpp", "condition": "PUTILS_POINT" }
//!     ]
//! }
//! ```

use crate::codegen::naming::{function_base_name, is_valid_identifier};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Category a type belongs to, used to filter which registrars apply to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Types attached to entities
    Component,
    /// Any other reflected type
    Type,
}

impl Category {
    /// Returns the document key for this category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Component => "components",
            Category::Type => "types",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Category {
    type Error = ();

    fn try_from(value: &str) -> std::result::Result<Self, ()> {
        match value {
            "components" | "component" => Ok(Category::Component),
            "types" | "type" => Ok(Category::Type),
            _ => Err(()),
        }
    }
}

/// A type that registration code is generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    qualified_name: String,
    source_header: PathBuf,
    function_base_name: String,
    enabled: bool,
    compile_guard: Option<String>,
    category: Category,
}

impl TypeDescriptor {
    /// Creates an enabled, unguarded component descriptor
    pub fn new(qualified_name: impl Into<String>, source_header: impl Into<PathBuf>) -> Self {
        let qualified_name = qualified_name.into();
        let function_base_name = function_base_name(&qualified_name);
        Self {
            qualified_name,
            source_header: source_header.into(),
            function_base_name,
            enabled: true,
            compile_guard: None,
            category: Category::Component,
        }
    }

    /// Sets the preprocessor condition under which the type exists
    pub fn with_compile_guard(mut self, guard: impl Into<String>) -> Self {
        self.compile_guard = Some(guard.into());
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets whether the type takes part in generation
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Fully qualified name, e.g. `ns::A`
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Header declaring the type
    pub fn source_header(&self) -> &Path {
        &self.source_header
    }

    /// Identifier-safe name the generated functions are built from
    pub fn function_base_name(&self) -> &str {
        &self.function_base_name
    }

    /// Whether the type takes part in generation
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Preprocessor condition the type is guarded by
    pub fn compile_guard(&self) -> Option<&str> {
        self.compile_guard.as_deref()
    }

    /// Category used for registrar filtering
    pub fn category(&self) -> Category {
        self.category
    }
}

/// Checks that every enabled type has a valid, run-unique function base name.
///
/// The same qualified name seen twice is rejected as well: two units would be
/// generated for one type and their functions would clash at link time.
pub fn validate_unique(types: &[TypeDescriptor]) -> Result<()> {
    let mut claimed: HashMap<&str, &str> = HashMap::new();

    for ty in types.iter().filter(|t| t.is_enabled()) {
        let identifier = ty.function_base_name();
        if !is_valid_identifier(identifier) {
            return Err(Error::config(
                ty.source_header().display().to_string(),
                "type",
                format!(
                    "'{}' does not produce a valid identifier (got '{}')",
                    ty.qualified_name(),
                    identifier
                ),
            ));
        }

        if let Some(first) = claimed.insert(identifier, ty.qualified_name()) {
            return Err(Error::identifier_collision(
                identifier,
                first,
                ty.qualified_name(),
            ));
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawTypeEntry {
    #[serde(rename = "type")]
    type_name: Option<String>,
    header: Option<String>,
    enabled: Option<bool>,
    condition: Option<String>,
}

/// Parses one type descriptor document.
///
/// `source_name` is only used in error messages.
pub fn parse_type_document(source_name: &str, text: &str) -> Result<Vec<TypeDescriptor>> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::json(source_name, e))?;

    let Value::Object(categories) = value else {
        return Err(Error::config(
            source_name,
            "<root>",
            "expected an object with 'components' and/or 'types' arrays",
        ));
    };

    let mut descriptors = Vec::new();
    for (key, entries) in categories {
        let category = Category::try_from(key.as_str()).map_err(|_| {
            Error::config(
                source_name,
                key.as_str(),
                "unknown category, expected 'components' or 'types'",
            )
        })?;

        let Value::Array(entries) = entries else {
            return Err(Error::config(source_name, key.as_str(), "expected an array"));
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let field = |name: &str| format!("{key}[{index}].{name}");

            let raw: RawTypeEntry = serde_json::from_value(entry)
                .map_err(|e| Error::config(source_name, format!("{key}[{index}]"), e.to_string()))?;

            let type_name = raw
                .type_name
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| Error::missing_field(source_name, field("type")))?;
            let header = raw
                .header
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| Error::missing_field(source_name, field("header")))?;

            let mut descriptor = TypeDescriptor::new(type_name.trim(), header)
                .with_category(category)
                .with_enabled(raw.enabled.unwrap_or(true));
            if let Some(condition) = raw.condition.filter(|c| !c.trim().is_empty()) {
                descriptor = descriptor.with_compile_guard(condition.trim());
            }

            descriptors.push(descriptor);
        }
    }

    Ok(descriptors)
}

/// Loads type descriptor documents, preserving document-then-entry order
pub fn load_type_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<TypeDescriptor>> {
    let mut descriptors = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let loaded = parse_type_document(&path.display().to_string(), &text)?;
        debug!("Loaded {} type descriptor(s) from {}", loaded.len(), path.display());
        descriptors.extend(loaded);
    }

    Ok(descriptors)
}
