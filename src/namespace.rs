use thiserror::Error;

const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum NamespaceNameError {
    #[error("namespace name is required")]
    Empty,
    #[error("namespace name is {0} characters; the limit is 63")]
    TooLong(usize),
    #[error("invalid character {0:?}: use lowercase letters, digits and '-'")]
    InvalidCharacter(char),
    #[error("namespace name must start and end with a letter or digit")]
    InvalidBoundary,
}

/// DNS-1123 label rules, checked before a create request is sent.
pub fn validate_namespace_name(name: &str) -> Result<&str, NamespaceNameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NamespaceNameError::Empty);
    }

    let length = name.chars().count();
    if length > MAX_LABEL_LEN {
        return Err(NamespaceNameError::TooLong(length));
    }

    if let Some(invalid) = name
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-'))
    {
        return Err(NamespaceNameError::InvalidCharacter(invalid));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(NamespaceNameError::InvalidBoundary);
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::{NamespaceNameError, validate_namespace_name};

    #[test]
    fn accepts_dns_labels() {
        assert_eq!(validate_namespace_name(" team-a1 "), Ok("team-a1"));
        assert_eq!(validate_namespace_name("a"), Ok("a"));
        assert!(validate_namespace_name(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_invalid_labels() {
        assert_eq!(validate_namespace_name("  "), Err(NamespaceNameError::Empty));
        assert_eq!(
            validate_namespace_name(&"a".repeat(64)),
            Err(NamespaceNameError::TooLong(64))
        );
        assert_eq!(
            validate_namespace_name("Team"),
            Err(NamespaceNameError::InvalidCharacter('T'))
        );
        assert_eq!(
            validate_namespace_name("team_a"),
            Err(NamespaceNameError::InvalidCharacter('_'))
        );
        assert_eq!(
            validate_namespace_name("-team"),
            Err(NamespaceNameError::InvalidBoundary)
        );
        assert_eq!(
            validate_namespace_name("team-"),
            Err(NamespaceNameError::InvalidBoundary)
        );
    }
}
