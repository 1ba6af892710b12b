//! Validation of bound models.
//!
//! Body models implement [`Validate`]; the model binder calls it after
//! deserialization and copies every reported error into the model state.
//! The helpers below cover the checks test models typically need.

use crate::error::{LocItem, ValidationError, ValidationErrors};

/// Trait for types that can be validated.
///
/// Error locations are relative to the model root; the binder adds the
/// `body` prefix itself.
///
/// # Example
///
/// ```
/// use mvctest_host::error::ValidationErrors;
/// use mvctest_host::validation::{required, Validate};
///
/// struct RequestModel {
///     string: Option<String>,
/// }
///
/// impl Validate for RequestModel {
///     fn validate(&self) -> Result<(), Box<ValidationErrors>> {
///         let mut errors = ValidationErrors::new();
///         required(&mut errors, "String", self.string.as_deref());
///         errors.into_result()
///     }
/// }
///
/// assert!(RequestModel { string: None }.validate().is_err());
/// ```
pub trait Validate {
    /// Validate this value against all defined constraints.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` if any constraints are violated.
    fn validate(&self) -> Result<(), Box<ValidationErrors>>;
}

impl Validate for serde_json::Value {
    fn validate(&self) -> Result<(), Box<ValidationErrors>> {
        Ok(())
    }
}

macro_rules! always_valid {
    ($($ty:ty),*) => {
        $(impl Validate for $ty {
            fn validate(&self) -> Result<(), Box<ValidationErrors>> {
                Ok(())
            }
        })*
    };
}

always_valid!(String, bool, i32, i64, u32, u64, f64);

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), Box<ValidationErrors>> {
        match self {
            Some(inner) => inner.validate(),
            None => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), Box<ValidationErrors>> {
        let mut errors = ValidationErrors::new();
        for (idx, item) in self.iter().enumerate() {
            if let Err(nested) = item.validate() {
                errors.extend(nested.with_loc_prefix(vec![LocItem::index(idx)]));
            }
        }
        errors.into_result()
    }
}

impl ValidationErrors {
    /// `Ok(())` when empty, the boxed errors otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was collected.
    pub fn into_result(self) -> Result<(), Box<ValidationErrors>> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Box::new(self))
        }
    }
}

/// Records a `missing` error when a required field is absent.
///
/// Returns whether the value was present.
pub fn required<T>(errors: &mut ValidationErrors, field: &str, value: Option<T>) -> bool {
    if value.is_none() {
        errors.push(ValidationError::missing(vec![LocItem::field(field)]));
        return false;
    }
    true
}

/// Records a length error when `value` is outside `min..=max` characters.
pub fn length(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    min: Option<usize>,
    max: Option<usize>,
) {
    let len = value.chars().count();
    let loc = vec![LocItem::field(field)];
    if let Some(min) = min {
        if len < min {
            errors.push(ValidationError::string_too_short(loc, min).with_input(value.into()));
            return;
        }
    }
    if let Some(max) = max {
        if len > max {
            errors.push(ValidationError::string_too_long(loc, max).with_input(value.into()));
        }
    }
}

/// Records a range error when `value` is outside `min..=max`.
pub fn range<T>(errors: &mut ValidationErrors, field: &str, value: T, min: Option<T>, max: Option<T>)
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let loc = vec![LocItem::field(field)];
    if let Some(min) = min {
        if value < min {
            errors.push(ValidationError::greater_than_equal(loc, min));
            return;
        }
    }
    if let Some(max) = max {
        if value > max {
            errors.push(ValidationError::less_than_equal(loc, max));
        }
    }
}

/// Records a `value_error` when `value` is not an email address.
pub fn email(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !is_valid_email(value) {
        errors.push(ValidationError::invalid_email(vec![LocItem::field(field)]).with_input(value.into()));
    }
}

/// Check if a string is a valid email address.
///
/// # Examples
///
/// ```
/// use mvctest_host::validation::is_valid_email;
///
/// assert!(is_valid_email("user@example.com"));
/// assert!(is_valid_email("user.name+tag@sub.domain.org"));
/// assert!(!is_valid_email("invalid"));
/// assert!(!is_valid_email("@domain.com"));
/// assert!(!is_valid_email("user@"));
/// ```
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if local
        .chars()
        .any(|c| !c.is_alphanumeric() && !".!#$%&'*+/=?^_`{|}~-".contains(c))
    {
        return false;
    }

    if !domain.contains('.') || domain.contains("..") {
        return false;
    }
    if domain
        .chars()
        .any(|c| !c.is_alphanumeric() && c != '.' && c != '-')
    {
        return false;
    }
    // Labels must be non-empty and not start or end with a hyphen.
    domain
        .split('.')
        .all(|part| !part.is_empty() && !part.starts_with('-') && !part.ends_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        name: Option<String>,
        email: String,
        age: i64,
    }

    impl Validate for Person {
        fn validate(&self) -> Result<(), Box<ValidationErrors>> {
            let mut errors = ValidationErrors::new();
            if required(&mut errors, "Name", self.name.as_deref()) {
                length(&mut errors, "Name", self.name.as_deref().unwrap_or_default(), Some(2), Some(10));
            }
            email(&mut errors, "Email", &self.email);
            range(&mut errors, "Age", self.age, Some(0), Some(150));
            errors.into_result()
        }
    }

    #[test]
    fn valid_person_passes() {
        let person = Person {
            name: Some("Ada".into()),
            email: "ada@example.com".into(),
            age: 36,
        };
        assert!(person.validate().is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let person = Person {
            name: None,
            email: "nope".into(),
            age: -1,
        };
        let errors = person.validate().unwrap_err();
        let types: Vec<_> = errors.iter().map(|e| e.error_type).collect();
        assert_eq!(types, vec!["missing", "value_error", "greater_than_equal"]);
        assert_eq!(errors.errors[0].model_state_key(), "Name");
    }

    #[test]
    fn length_reports_too_long() {
        let mut errors = ValidationErrors::new();
        length(&mut errors, "Name", "abcdefghijkl", Some(2), Some(10));
        assert_eq!(errors.errors[0].error_type, "string_too_long");
    }

    #[test]
    fn vec_validation_prefixes_indices() {
        let people = vec![
            Person {
                name: Some("Ada".into()),
                email: "ada@example.com".into(),
                age: 1,
            },
            Person {
                name: None,
                email: "bob@example.com".into(),
                age: 1,
            },
        ];
        let errors = people.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors[0].model_state_key(), "[1].Name");
    }

    #[test]
    fn email_rejects_double_at() {
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a@-b.com"));
    }
}
