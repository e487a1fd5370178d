//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    // HashMap order is unstable
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation {
        message,
        errors: field_errors,
    }
}

/// Run derive-based validation on a request body.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(validation_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Validate)]
    struct Body {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
        #[validate(range(min = 1))]
        count: i64,
    }

    #[test]
    fn test_collects_every_field() {
        let body = Body {
            name: "ab".into(),
            count: 0,
        };

        match validate(&body) {
            Err(AppError::Validation { message, errors }) => {
                assert_eq!(message, "count: range");
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].field, "name");
                assert_eq!(errors[1].message, "too short");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_valid_body_passes() {
        let body = Body {
            name: "abc".into(),
            count: 1,
        };
        assert!(validate(&body).is_ok());
    }
}
