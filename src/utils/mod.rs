//! Cross-platform utilities for blockpm.
//!
//! - [`fs`] - Filesystem helpers with contextual errors and atomic writes
//! - [`progress`] - Spinner helpers for the CLI progress sink

pub mod fs;
pub mod progress;

/// Converts a block name to the PascalCase folder name used in the host
/// project (`user-landing` → `UserLanding`).
#[must_use]
pub fn to_pascal_case(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c == ' ' || c == '/' || c == '@')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("user-landing"), "UserLanding");
        assert_eq!(to_pascal_case("header"), "Header");
        assert_eq!(to_pascal_case("data_table"), "DataTable");
        assert_eq!(to_pascal_case("@scope/fancy-card"), "ScopeFancyCard");
        assert_eq!(to_pascal_case(""), "");
    }
}
