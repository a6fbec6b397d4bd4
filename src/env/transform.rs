// src/env/transform.rs

/// How raw key paths are turned into environment variable names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyTransform {
    /// Replace every character outside `[A-Za-z0-9_]` with `_`.
    pub sanitize: bool,
    /// Uppercase the (possibly sanitized) name.
    pub upcase: bool,
}

impl KeyTransform {
    pub fn new(sanitize: bool, upcase: bool) -> Self {
        Self { sanitize, upcase }
    }

    pub fn apply(&self, key: &str) -> String {
        transform_key(key, self.sanitize, self.upcase)
    }
}

/// Map a key path to a variable name.
///
/// Pure and deterministic; applying it twice yields the same result as
/// applying it once.
pub fn transform_key(key: &str, sanitize: bool, upcase: bool) -> String {
    let mut name: String = if sanitize {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    } else {
        key.to_string()
    };

    if upcase {
        name = name.to_uppercase();
    }

    name
}
