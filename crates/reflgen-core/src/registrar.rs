//! Registrar descriptor store.
//!
//! A registrar is a function template the generated code instantiates once per
//! type, e.g. `kengine::register_everything<ns::A>(r)`. Registrar documents come
//! in two shapes. A bare array lists registrars for the registration pass:
//!
//! ```json
//! [
//!     { "registration": "kengine::register_everything", "header": "kengine/helpers/meta/register_everything.hpp" }
//! ]
//! ```
//!
//! An object selects passes explicitly:
//!
//! ```json
//! {
//!     "pre": [ { "registration": "kengine::register_metadata", "header": "meta.hpp" } ],
//!     "post": [ { "registration": "kengine::register_lua", "header": "lua.hpp", "applies_to": "components" } ]
//! }
//! ```
//!
//! Order is significant and preserved: documents in the order given, entries
//! in the order written. Duplicates are kept and will be invoked twice.

use crate::error::{Error, Result};
use crate::types::Category;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Registration phase a registrar runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Runs first, e.g. metadata reflection
    Pre,
    /// Runs second, e.g. scripting bindings
    Post,
}

impl Pass {
    /// Returns the document key for this pass
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Pre => "pre",
            Pass::Post => "post",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Pass {
    type Error = ();

    fn try_from(value: &str) -> std::result::Result<Self, ()> {
        match value {
            "pre" => Ok(Pass::Pre),
            "post" => Ok(Pass::Post),
            _ => Err(()),
        }
    }
}

/// One registrar function template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarDescriptor {
    /// Callable template name, instantiated as `call<Type>(context)`
    pub registration_call: String,
    /// Header declaring the template
    pub header: String,
    /// Pass the registrar belongs to
    pub pass: Pass,
    /// Restricts the registrar to one category of types
    pub applies_to: Option<Category>,
}

impl RegistrarDescriptor {
    /// Creates a registrar that applies to every type
    pub fn new(registration_call: impl Into<String>, header: impl Into<String>, pass: Pass) -> Self {
        Self {
            registration_call: registration_call.into(),
            header: header.into(),
            pass,
            applies_to: None,
        }
    }

    /// Restricts the registrar to a category
    pub fn applies_to(mut self, category: Category) -> Self {
        self.applies_to = Some(category);
        self
    }

    /// Returns true if the registrar should be invoked for types of `category`
    pub fn applies(&self, category: Category) -> bool {
        self.applies_to.map_or(true, |c| c == category)
    }
}

/// Registrars grouped by pass, each in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrarSet {
    /// Pre-registration pass
    pub pre: Vec<RegistrarDescriptor>,
    /// Registration pass
    pub post: Vec<RegistrarDescriptor>,
}

impl RegistrarSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registrar to the pass it names
    pub fn push(&mut self, registrar: RegistrarDescriptor) {
        match registrar.pass {
            Pass::Pre => self.pre.push(registrar),
            Pass::Post => self.post.push(registrar),
        }
    }

    /// Appends all registrars of `other`, keeping their order
    pub fn extend(&mut self, other: RegistrarSet) {
        self.pre.extend(other.pre);
        self.post.extend(other.post);
    }

    /// Registrars of one pass
    pub fn pass(&self, pass: Pass) -> &[RegistrarDescriptor] {
        match pass {
            Pass::Pre => &self.pre,
            Pass::Post => &self.post,
        }
    }

    /// Total number of registrars across both passes
    pub fn len(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    /// Returns true if no registrar was loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Headers of every registrar in pre then post order, first occurrence only
    pub fn headers(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = Vec::new();
        for registrar in self.pre.iter().chain(&self.post) {
            if !headers.contains(&registrar.header.as_str()) {
                headers.push(&registrar.header);
            }
        }
        headers
    }
}

#[derive(Debug, Deserialize)]
struct RawRegistrar {
    registration: Option<String>,
    header: Option<String>,
    applies_to: Option<String>,
}

fn parse_entries(
    source_name: &str,
    key: &str,
    pass: Pass,
    entries: Value,
    set: &mut RegistrarSet,
) -> Result<()> {
    let Value::Array(entries) = entries else {
        return Err(Error::config(source_name, key, "expected an array of registrars"));
    };

    for (index, entry) in entries.into_iter().enumerate() {
        let location = format!("{key}[{index}]");

        let raw: RawRegistrar = serde_json::from_value(entry)
            .map_err(|e| Error::config(source_name, location.as_str(), e.to_string()))?;

        let registration = raw
            .registration
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::missing_field(source_name, format!("{location}.registration")))?;
        let header = raw
            .header
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::missing_field(source_name, format!("{location}.header")))?;

        let mut registrar = RegistrarDescriptor::new(registration.trim(), header.trim(), pass);
        if let Some(applies_to) = raw.applies_to {
            let category = Category::try_from(applies_to.as_str()).map_err(|_| {
                Error::config(
                    source_name,
                    format!("{location}.applies_to"),
                    format!("unknown category '{applies_to}', expected 'components' or 'types'"),
                )
            })?;
            registrar = registrar.applies_to(category);
        }

        set.push(registrar);
    }

    Ok(())
}

/// Parses one registrar document
pub fn parse_registrar_document(source_name: &str, text: &str) -> Result<RegistrarSet> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::json(source_name, e))?;
    let mut set = RegistrarSet::new();

    match value {
        entries @ Value::Array(_) => parse_entries(source_name, "post", Pass::Post, entries, &mut set)?,
        Value::Object(passes) => {
            // Both passes are parsed into separate lists, so key order does not matter
            for (key, entries) in passes {
                let pass = Pass::try_from(key.as_str()).map_err(|_| {
                    Error::config(source_name, key.as_str(), "unknown pass, expected 'pre' or 'post'")
                })?;
                parse_entries(source_name, &key, pass, entries, &mut set)?;
            }
        }
        _ => {
            return Err(Error::config(
                source_name,
                "<root>",
                "expected an array of registrars or an object with 'pre'/'post' arrays",
            ))
        }
    }

    Ok(set)
}

/// Loads registrar documents and concatenates them in the order given
pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<RegistrarSet> {
    let mut set = RegistrarSet::new();

    for path in paths {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let loaded = parse_registrar_document(&path.display().to_string(), &text)?;
        debug!(
            "Loaded {} pre and {} post registrar(s) from {}",
            loaded.pre.len(),
            loaded.post.len(),
            path.display()
        );
        set.extend(loaded);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_flat_document_is_post_pass() {
        let set = parse_registrar_document(
            "regs.json",
            r#"[{ "registration": "reg", "header": "reg.hpp" }]"#,
        )
        .unwrap();
        assert!(set.pre.is_empty());
        assert_eq!(set.post, vec![RegistrarDescriptor::new("reg", "reg.hpp", Pass::Post)]);
    }

    #[test]
    fn test_pass_document() {
        let set = parse_registrar_document(
            "regs.json",
            r#"{
                "pre": [
                    { "registration": "r1", "header": "a.hpp" },
                    { "registration": "r2", "header": "b.hpp" }
                ],
                "post": [
                    { "registration": "r3", "header": "a.hpp", "applies_to": "components" }
                ]
            }"#,
        )
        .unwrap();

        let pre: Vec<_> = set.pre.iter().map(|r| r.registration_call.as_str()).collect();
        assert_eq!(pre, vec!["r1", "r2"]);
        assert_eq!(set.post[0].applies_to, Some(Category::Component));
        assert!(set.post[0].applies(Category::Component));
        assert!(!set.post[0].applies(Category::Type));
        assert_eq!(set.headers(), vec!["a.hpp", "b.hpp"]);
    }

    #[test]
    fn test_unknown_pass() {
        let err = parse_registrar_document("regs.json", r#"{ "middle": [] }"#).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("middle"));
    }

    #[test]
    fn test_missing_registration() {
        let err = parse_registrar_document("regs.json", r#"[{ "header": "a.hpp" }]"#).unwrap_err();
        assert!(err.to_string().contains("post[0].registration"));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_registrar_document("regs.json", "[{").unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
    }

    #[test]
    fn test_load_concatenates_without_dedup() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        fs::write(&first, r#"[{ "registration": "r1", "header": "h.hpp" }]"#).unwrap();
        fs::write(
            &second,
            r#"{ "post": [{ "registration": "r1", "header": "h.hpp" }, { "registration": "r2", "header": "h.hpp" }] }"#,
        )
        .unwrap();

        let set = load(&[first, second]).unwrap();
        let post: Vec<_> = set.post.iter().map(|r| r.registration_call.as_str()).collect();
        assert_eq!(post, vec!["r1", "r1", "r2"]);
        assert_eq!(set.headers(), vec!["h.hpp"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(&["/nonexistent/regs.json"]).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
