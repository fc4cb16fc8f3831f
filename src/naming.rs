//! Name normalization shared with the generator under test.
//!
//! The generator names its top-level output after the camel-cased qualified
//! name of the primary type (`java.util.logging.Level` becomes
//! `JavaUtilLoggingLevel`). The harness derives the executable name with the
//! same rule so the artifact lines up with what the toolchain produced.

/// Uppercase the first character of a string.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Given a period-separated name, return it as a single camel-cased token.
pub fn camel_case_qualified_name(qualified: &str) -> String {
    qualified.split('.').map(capitalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_cases_each_segment() {
        assert_eq!(
            camel_case_qualified_name("java.util.logging.Level"),
            "JavaUtilLoggingLevel"
        );
    }

    #[test]
    fn preserves_interior_case() {
        assert_eq!(camel_case_qualified_name("X"), "X");
        assert_eq!(camel_case_qualified_name("foo.barBaz"), "FooBarBaz");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(capitalize(""), "");
        assert_eq!(camel_case_qualified_name(""), "");
    }
}
