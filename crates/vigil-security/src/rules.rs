//! Name and password validity rules.
//!
//! A rule is a predicate plus a human-readable failure reason. Rules are
//! evaluated in insertion order and validation stops at the first
//! failure; an empty rule set is an error in itself, because it means
//! the policy was never configured.

use regex::Regex;
use vigil_core::{Result, SecurityError};

/// Validity rule for user and device names.
#[derive(Debug, Clone)]
pub enum NameRule {
    /// Minimum name length, in characters.
    MinLength(usize),
    /// Maximum name length, in characters.
    ///
    /// Must not exceed what the persistence layer can store.
    MaxLength(usize),
    /// Every character of the name must come from this set.
    AllowedCharacters(String),
    /// Every character in this set must appear in the name.
    RequiredCharacters(String),
    /// The whole name must match this expression.
    AllowedStructure(Regex),
}

impl NameRule {
    /// Builds an [`NameRule::AllowedStructure`] rule, validating the
    /// expression.
    pub fn allowed_structure(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| {
            SecurityError::InvalidArgument(format!("invalid name structure pattern: {err}"))
        })?;
        Ok(Self::AllowedStructure(regex))
    }

    /// Runs the predicate.
    pub fn is_name_valid(&self, name: &str) -> bool {
        match self {
            Self::MinLength(minimum) => name.chars().count() >= *minimum,
            Self::MaxLength(maximum) => name.chars().count() <= *maximum,
            Self::AllowedCharacters(allowed) => {
                name.chars().all(|character| allowed.contains(character))
            }
            Self::RequiredCharacters(required) => {
                required.chars().all(|character| name.contains(character))
            }
            Self::AllowedStructure(regex) => regex.is_match(name),
        }
    }

    /// Why the rule fails, for reporting.
    pub fn failure_reason(&self) -> String {
        match self {
            Self::MinLength(minimum) => {
                format!("the name is below the minimum required length of [{minimum}]")
            }
            Self::MaxLength(maximum) => {
                format!("the name is above the maximum allowed length of [{maximum}]")
            }
            Self::AllowedCharacters(allowed) => format!(
                "the name contains one or more characters not in the allowed set [{allowed}]"
            ),
            Self::RequiredCharacters(required) => format!(
                "the name does not have one or more of the required characters [{required}]"
            ),
            Self::AllowedStructure(regex) => {
                format!("the name does not match the allowed structure [{regex}]")
            }
        }
    }
}

/// Validity rule for raw passwords.
#[derive(Debug, Clone)]
pub enum PasswordRule {
    /// Minimum password length, in characters.
    MinLength(usize),
    /// The whole password must match this expression.
    AllowedStructure(Regex),
}

impl PasswordRule {
    /// Builds an [`PasswordRule::AllowedStructure`] rule, validating the
    /// expression.
    pub fn allowed_structure(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| {
            SecurityError::InvalidArgument(format!("invalid password structure pattern: {err}"))
        })?;
        Ok(Self::AllowedStructure(regex))
    }

    /// Runs the predicate.
    pub fn is_password_valid(&self, raw_password: &str) -> bool {
        match self {
            Self::MinLength(minimum) => raw_password.chars().count() >= *minimum,
            Self::AllowedStructure(regex) => regex.is_match(raw_password),
        }
    }

    /// Why the rule fails, for reporting.
    ///
    /// Never echoes the password itself.
    pub fn failure_reason(&self) -> String {
        match self {
            Self::MinLength(minimum) => {
                format!("the password is below the minimum required length of [{minimum}]")
            }
            Self::AllowedStructure(regex) => {
                format!("the password does not match the allowed structure [{regex}]")
            }
        }
    }
}

/// Validates a name against rules in insertion order.
pub(crate) fn validate_name<'a>(
    rules: impl ExactSizeIterator<Item = &'a NameRule>,
    name: &str,
) -> Result<()> {
    if rules.len() == 0 {
        return Err(SecurityError::LogicError(
            "name validation failed; no rules were found".into(),
        ));
    }

    for rule in rules {
        if !rule.is_name_valid(name) {
            return Err(SecurityError::InvalidArgument(rule.failure_reason()));
        }
    }
    Ok(())
}

/// Validates a raw password against rules in insertion order.
pub(crate) fn validate_password<'a>(
    rules: impl ExactSizeIterator<Item = &'a PasswordRule>,
    raw_password: &str,
) -> Result<()> {
    if rules.len() == 0 {
        return Err(SecurityError::LogicError(
            "password validation failed; no rules were found".into(),
        ));
    }

    for rule in rules {
        if !rule.is_password_valid(raw_password) {
            return Err(SecurityError::InvalidPassword {
                reason: Some(rule.failure_reason()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn name_rule_predicates() {
        assert!(NameRule::MinLength(3).is_name_valid("abc"));
        assert!(!NameRule::MinLength(4).is_name_valid("abc"));
        assert!(NameRule::MaxLength(3).is_name_valid("abc"));
        assert!(!NameRule::MaxLength(2).is_name_valid("abc"));
        assert!(NameRule::AllowedCharacters("abc".into()).is_name_valid("cab"));
        assert!(!NameRule::AllowedCharacters("abc".into()).is_name_valid("abd"));
        assert!(NameRule::RequiredCharacters("_".into()).is_name_valid("a_b"));
        assert!(!NameRule::RequiredCharacters("_".into()).is_name_valid("ab"));

        let structure = NameRule::allowed_structure("^[a-z]+[0-9]*$").unwrap();
        assert!(structure.is_name_valid("alice42"));
        assert!(!structure.is_name_valid("42alice"));
    }

    #[test]
    fn password_rule_predicates() {
        assert!(PasswordRule::MinLength(8).is_password_valid("P@ssw0rd1"));
        assert!(!PasswordRule::MinLength(12).is_password_valid("P@ssw0rd1"));

        let structure = PasswordRule::allowed_structure(r"^.*[0-9].*$").unwrap();
        assert!(structure.is_password_valid("abc1"));
        assert!(!structure.is_password_valid("abcd"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert_matches!(
            NameRule::allowed_structure("("),
            Err(SecurityError::InvalidArgument(_))
        );
        assert_matches!(
            PasswordRule::allowed_structure("["),
            Err(SecurityError::InvalidArgument(_))
        );
    }

    #[test]
    fn validation_runs_in_insertion_order() {
        let rules = vec![NameRule::MinLength(10), NameRule::MaxLength(2)];
        // Both rules fail for "abc"; the first inserted one wins.
        let error = validate_name(rules.iter(), "abc").unwrap_err();
        assert_matches!(
            error,
            SecurityError::InvalidArgument(reason) if reason.contains("minimum")
        );
    }

    #[test]
    fn empty_rule_sets_are_a_policy_error() {
        let rules: Vec<NameRule> = Vec::new();
        assert_matches!(
            validate_name(rules.iter(), "abc"),
            Err(SecurityError::LogicError(_))
        );

        let rules: Vec<PasswordRule> = Vec::new();
        assert_matches!(
            validate_password(rules.iter(), "secret"),
            Err(SecurityError::LogicError(_))
        );
    }
}
