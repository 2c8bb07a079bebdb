use crate::types::{AttributePath, Diagnostic, Dynamic};

/// Request for validators
#[derive(Debug, Clone)]
pub struct ValidatorRequest {
    pub config_value: Dynamic,
    pub path: AttributePath,
}

/// Response from validators
#[derive(Debug, Clone, Default)]
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Validator performs validation on configured attribute values
/// Null and unknown values are skipped by the framework before this is called
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;

    /// Perform validation
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

/// Accepts only strings from a fixed set of values
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();

        if let Some(s) = request.config_value.as_string() {
            if !self.allowed.iter().any(|a| a == s) {
                response.diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!(
                            "Attribute {} {}, got: \"{}\"",
                            request.path,
                            self.description(),
                            s
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        response
    }
}

/// Bounds the length of string values
pub struct StringLength {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLength {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("string length must be between {} and {}", min, max),
            (Some(min), None) => format!("string length must be at least {}", min),
            (None, Some(max)) => format!("string length must be at most {}", max),
            (None, None) => "string of any length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();

        if let Some(s) = request.config_value.as_string() {
            let len = s.chars().count();
            let too_short = self.min.is_some_and(|min| len < min);
            let too_long = self.max.is_some_and(|max| len > max);
            if too_short || too_long {
                response.diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid length for {}", request.path),
                        format!(
                            "Attribute {} {}, got length {}",
                            request.path,
                            self.description(),
                            len
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: value,
            path: AttributePath::new("expire"),
        }
    }

    #[test]
    fn string_one_of_accepts_listed_value() {
        let validator = StringOneOf::new(["5min", "1day", "never"]);

        let response = validator.validate(request(Dynamic::String("1day".to_string())));

        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn string_one_of_rejects_unlisted_value() {
        let validator = StringOneOf::new(["5min", "1day", "never"]);

        let response = validator.validate(request(Dynamic::String("2days".to_string())));

        assert_eq!(response.diagnostics.len(), 1);
        let diag = &response.diagnostics[0];
        assert_eq!(diag.summary, "Invalid value for expire");
        assert!(diag.detail.contains("5min, 1day, never"));
        assert!(diag.detail.contains("2days"));
        assert_eq!(diag.attribute, Some(AttributePath::new("expire")));
    }

    #[test]
    fn string_one_of_ignores_non_strings() {
        let validator = StringOneOf::new(["a"]);

        assert!(validator
            .validate(request(Dynamic::Unknown))
            .diagnostics
            .is_empty());
    }

    #[test]
    fn string_length_rejects_empty_string() {
        let validator = StringLength {
            min: Some(1),
            max: None,
        };

        let response = validator.validate(request(Dynamic::String(String::new())));
        assert_eq!(response.diagnostics.len(), 1);

        let response = validator.validate(request(Dynamic::String("x".to_string())));
        assert!(response.diagnostics.is_empty());
    }
}
