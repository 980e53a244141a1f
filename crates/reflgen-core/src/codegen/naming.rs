//! Identifier derivation shared by the per-type and dispatch generators.
//!
//! Both sides of the link (the per-type definitions and the dispatch unit's
//! `extern` declarations) must agree on every name, so nothing outside this
//! module builds a registration function name.

/// Prefix of the pre-registration function generated for each type
pub const PRE_REGISTER_PREFIX: &str = "pre_register_";

/// Prefix of the registration function generated for each type
pub const REGISTER_PREFIX: &str = "register_";

/// Derives the generated function base name from a qualified type name.
///
/// Namespace separators become a single `_`, every other character that
/// cannot appear in an identifier (template brackets, commas, spaces) is
/// replaced by `_`, and trailing underscores are dropped.
///
/// The mapping is not injective (`a::b_c` and `a_b::c` both give `a_b_c`);
/// callers detect collisions with [`crate::types::validate_unique`].
pub fn function_base_name(qualified_name: &str) -> String {
    let trimmed = qualified_name.trim().trim_start_matches("::");
    let mut result = String::with_capacity(trimmed.len());

    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            result.push('_');
        } else if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
        } else {
            result.push('_');
        }
    }

    while result.ends_with('_') {
        result.pop();
    }
    result
}

/// Returns true if `name` is a valid C/C++ identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `namespace` is a (possibly nested) namespace name such as `a::b`
pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.split("::").all(is_valid_identifier)
}

/// Name of the pre-registration function for a base name
pub fn pre_register_function(base_name: &str) -> String {
    format!("{PRE_REGISTER_PREFIX}{base_name}")
}

/// Name of the registration function for a base name
pub fn register_function(base_name: &str) -> String {
    format!("{REGISTER_PREFIX}{base_name}")
}
