//! Error types for template compilation.

use thiserror::Error;

/// Errors raised while turning a JSON template into a SPARQL query.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The input is not a recognized template shape.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// `bestlang` needs a language preference, either inline
    /// (`bestlang:en;q=1`) or through the `$lang` root modifier.
    #[error("bestlang on `{field}` has no language: add `bestlang:<langs>` or a `$lang` root modifier")]
    MissingLanguage { field: String },
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_field() {
        let err = CompileError::MissingLanguage {
            field: "label".to_string(),
        };
        assert!(err.to_string().contains("label"));
        assert!(err.to_string().contains("$lang"));
    }
}
