//! Names of the runtime pieces the generated code calls into.
//!
//! The defaults target kengine on top of an entt registry. A JSON document
//! with any subset of the fields overrides them:
//!
//! ```json
//! { "log_severity": "log", "profiling_scope": "" }
//! ```

use super::writer::escape_string;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Runtime types, macros and headers referenced by generated code
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeBindings {
    /// Context every registration function receives
    pub context_type: String,
    /// Parameter name of the context
    pub context_name: String,
    /// Header forward-declaring the context type
    pub context_forward_header: String,
    /// Header defining the context type
    pub context_header: String,
    /// Headers providing the profiling and logging macros
    pub helper_headers: Vec<String>,
    /// Headers declaring the two callback types
    pub callback_headers: Vec<String>,
    /// Statement opening a profiling scope; empty disables it
    pub profiling_scope: String,
    /// Logging macro, invoked as `macro(context, severity, "category", "message")`
    pub log_macro: String,
    /// Severity used for per-type messages
    pub log_severity: String,
    /// Severity used for the dispatch callbacks
    pub dispatch_log_severity: String,
    /// Category for every message
    pub log_category: String,
    /// Callback type run for the pre-registration pass
    pub pre_callback: String,
    /// Callback type run for the registration pass
    pub callback: String,
}

impl Default for RuntimeBindings {
    fn default() -> Self {
        Self {
            context_type: "entt::registry".into(),
            context_name: "r".into(),
            context_forward_header: "<entt/entity/fwd.hpp>".into(),
            context_header: "<entt/entity/registry.hpp>".into(),
            helper_headers: vec![
                "kengine/helpers/log_helper.hpp".into(),
                "kengine/helpers/profiling_helper.hpp".into(),
            ],
            callback_headers: vec![
                "kengine/functions/pre_register_types.hpp".into(),
                "kengine/functions/register_types.hpp".into(),
            ],
            profiling_scope: "KENGINE_PROFILING_SCOPE".into(),
            log_macro: "kengine_log".into(),
            log_severity: "verbose".into(),
            dispatch_log_severity: "log".into(),
            log_category: "init/register_types".into(),
            pre_callback: "kengine::functions::pre_register_types".into(),
            callback: "kengine::functions::register_types".into(),
        }
    }
}

impl RuntimeBindings {
    /// Loads overrides from a JSON document; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::json(path, e))
    }

    /// `void name(entt::registry & r) noexcept`
    pub fn function_head(&self, name: &str) -> String {
        format!(
            "void {}({} & {}) noexcept",
            name, self.context_type, self.context_name
        )
    }

    /// `extern void name(entt::registry &) noexcept;`
    pub fn extern_declaration(&self, name: &str) -> String {
        format!("extern void {}({} &) noexcept;", name, self.context_type)
    }

    /// Function pointer type matching [`function_head`](Self::function_head)
    pub fn function_pointer_type(&self) -> String {
        format!("void (*)({} &) noexcept", self.context_type)
    }

    /// Profiling statement, if enabled
    pub fn profiling_statement(&self) -> Option<String> {
        let scope = self.profiling_scope.trim();
        if scope.is_empty() {
            None
        } else {
            Some(format!("{};", scope.trim_end_matches(';')))
        }
    }

    /// Log statement at `severity` with an escaped message
    pub fn log_statement(&self, severity: &str, message: &str) -> String {
        format!(
            "{}({}, {}, \"{}\", \"{}\");",
            self.log_macro,
            self.context_name,
            severity,
            escape_string(&self.log_category),
            escape_string(message)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_signatures_share_context() {
        let b = RuntimeBindings::default();
        assert_eq!(b.function_head("register_ns_A"), "void register_ns_A(entt::registry & r) noexcept");
        assert_eq!(
            b.extern_declaration("register_ns_A"),
            "extern void register_ns_A(entt::registry &) noexcept;"
        );
        assert_eq!(b.function_pointer_type(), "void (*)(entt::registry &) noexcept");
    }

    #[test]
    fn test_log_statement() {
        let b = RuntimeBindings::default();
        assert_eq!(
            b.log_statement("verbose", "Registering 'ns::A'"),
            "kengine_log(r, verbose, \"init/register_types\", \"Registering 'ns::A'\");"
        );
    }

    #[test]
    fn test_profiling_can_be_disabled() {
        let b = RuntimeBindings {
            profiling_scope: String::new(),
            ..Default::default()
        };
        assert_eq!(b.profiling_statement(), None);
        assert_eq!(
            RuntimeBindings::default().profiling_statement().as_deref(),
            Some("KENGINE_PROFILING_SCOPE;")
        );
    }

    #[test]
    fn test_partial_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");
        fs::write(&path, r#"{ "log_severity": "log", "context_name": "registry" }"#).unwrap();

        let b = RuntimeBindings::from_file(&path).unwrap();
        assert_eq!(b.log_severity, "log");
        assert_eq!(b.context_name, "registry");
        assert_eq!(b.log_macro, "kengine_log");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");
        fs::write(&path, r#"{ "log_sevrity": "log" }"#).unwrap();

        let err = RuntimeBindings::from_file(&path).unwrap_err();
        assert!(err.is_config_error());
    }
}
