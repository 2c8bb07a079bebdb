//! Planning and configuration validation driven by a resource schema
//!
//! The framework owns the generic half of PlanResourceChange and
//! ValidateResourceConfig: marking computed attributes unknown, running plan
//! modifiers, collecting replacement paths, and checking configuration
//! against the declared attributes and their validators.

use crate::schema::Schema;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::ValidatorRequest;
use crate::plan_modifier::PlanModifierRequest;
use std::collections::HashMap;

/// Result of planning a resource change
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Null when the resource is being destroyed
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PlannedChange {
    pub fn requires_replace(&self) -> bool {
        !self.requires_replace.is_empty()
    }
}

/// Build the planned state for a resource from its prior state and config.
///
/// A null config plans a destroy, a null prior state plans a create. Computed
/// attributes the config leaves null become unknown before plan modifiers
/// run. Replacement paths are only collected for existing resources.
pub fn plan_resource_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    config: &DynamicValue,
) -> PlannedChange {
    if config.is_null() {
        return PlannedChange {
            planned_state: DynamicValue::null(),
            requires_replace: vec![],
            diagnostics: vec![],
        };
    }

    let creating = prior_state.is_null();
    let mut planned = HashMap::new();
    let mut requires_replace = Vec::new();
    let mut diagnostics = Vec::new();

    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let config_value = config.get(&path).cloned().unwrap_or(Dynamic::Null);
        let state_value = prior_state.get(&path).cloned().unwrap_or(Dynamic::Null);

        let mut plan_value = if config_value.is_null() && attr.computed {
            Dynamic::Unknown
        } else {
            config_value.clone()
        };

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: config_value.clone(),
                state_value: state_value.clone(),
                plan_value,
                path: path.clone(),
            });

            plan_value = response.plan_value;
            diagnostics.extend(response.diagnostics);

            if response.requires_replace && !creating && !requires_replace.contains(&path) {
                requires_replace.push(path.clone());
            }
        }

        planned.insert(attr.name.clone(), plan_value);
    }

    if !requires_replace.is_empty() {
        tracing::debug!(
            "Plan requires replacement due to: {}",
            requires_replace
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    PlannedChange {
        planned_state: DynamicValue::new(Dynamic::Map(planned)),
        requires_replace,
        diagnostics,
    }
}

/// Validate a configuration object against a schema.
///
/// Reports missing required attributes, values set on computed-only
/// attributes, type mismatches, unknown attribute names, and whatever the
/// attribute validators report for known values.
pub fn validate_config(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let values = match &config.value {
        Dynamic::Map(values) => values,
        // Nothing to check until the whole object is known
        Dynamic::Null | Dynamic::Unknown => return diagnostics,
        other => {
            diagnostics.push(Diagnostic::error(
                "Invalid configuration",
                format!("Expected an object, got {}", other.type_name()),
            ));
            return diagnostics;
        }
    };

    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let value = values.get(&attr.name).unwrap_or(&Dynamic::Null);

        if attr.required && value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    format!("Missing required argument: {}", attr.name),
                    format!(
                        "The argument \"{}\" is required, but no definition was found.",
                        attr.name
                    ),
                )
                .with_attribute(path.clone()),
            );
            continue;
        }

        if attr.computed && !attr.optional && !attr.required && !value.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid configuration for read-only attribute: {}", attr.name),
                    format!(
                        "Cannot set value for attribute \"{}\" as it is computed by the provider.",
                        attr.name
                    ),
                )
                .with_attribute(path.clone()),
            );
            continue;
        }

        if !attr.r#type.accepts(value) {
            diagnostics.push(
                Diagnostic::error(
                    format!("Type mismatch for field: {}", attr.name),
                    format!(
                        "Field '{}' expects type {:?} but got {}",
                        attr.name,
                        attr.r#type,
                        value.type_name()
                    ),
                )
                .with_attribute(path.clone()),
            );
            continue;
        }

        if value.is_null() || value.is_unknown() {
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: value.clone(),
                path: path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    let mut unknown_fields: Vec<&String> = values
        .keys()
        .filter(|name| schema.attribute(name).is_none())
        .collect();
    unknown_fields.sort();

    for name in unknown_fields {
        diagnostics.push(
            Diagnostic::error(
                format!("Unknown field: {}", name),
                format!("The field '{}' is not defined in the schema", name),
            )
            .with_attribute(AttributePath::new(name)),
        );
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
    use crate::types::has_errors;
    use crate::validator::StringOneOf;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("content", AttributeType::String)
                    .required()
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("expire", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(Box::new(StringOneOf::new(["1day", "1week"])))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .optional()
                    .sensitive()
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .build()
    }

    fn value(json: &str) -> DynamicValue {
        DynamicValue::decode_json(json.as_bytes()).unwrap()
    }

    #[test]
    fn create_marks_computed_unknown_and_never_replaces() {
        let plan = plan_resource_change(
            &schema(),
            &DynamicValue::null(),
            &value(r#"{"content":"hi","expire":null,"password":null}"#),
        );

        assert!(!plan.requires_replace());
        let state = &plan.planned_state;
        assert!(state.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(state.get(&AttributePath::new("expire")).unwrap().is_unknown());
        assert!(state.get(&AttributePath::new("password")).unwrap().is_null());
        assert_eq!(state.get_string(&AttributePath::new("content")).unwrap(), "hi");
    }

    #[test]
    fn unchanged_config_keeps_state_without_replacement() {
        let prior = value(r#"{"id":"abc","content":"hi","expire":"1week","password":null}"#);
        let plan = plan_resource_change(
            &schema(),
            &prior,
            &value(r#"{"content":"hi","expire":null,"password":null}"#),
        );

        assert!(!plan.requires_replace());
        assert_eq!(plan.planned_state, prior);
    }

    #[test]
    fn changed_inputs_require_replacement() {
        let prior = value(r#"{"id":"abc","content":"hi","expire":"1week","password":null}"#);
        let plan = plan_resource_change(
            &schema(),
            &prior,
            &value(r#"{"content":"bye","expire":"1day","password":"s3cret"}"#),
        );

        assert_eq!(
            plan.requires_replace,
            vec![
                AttributePath::new("content"),
                AttributePath::new("expire"),
                AttributePath::new("password"),
            ]
        );
        assert_eq!(
            plan.planned_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "abc"
        );
    }

    #[test]
    fn null_config_plans_destroy() {
        let prior = value(r#"{"id":"abc","content":"hi"}"#);
        let plan = plan_resource_change(&schema(), &prior, &DynamicValue::null());

        assert!(plan.planned_state.is_null());
        assert!(!plan.requires_replace());
    }

    #[test]
    fn validate_reports_missing_required_and_unknown_fields() {
        let diags = validate_config(&schema(), &value(r#"{"colour":"red"}"#));

        assert!(has_errors(&diags));
        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Missing required argument: content"));
        assert!(summaries.contains(&"Unknown field: colour"));
    }

    #[test]
    fn validate_rejects_computed_only_and_bad_values() {
        let diags = validate_config(
            &schema(),
            &value(r#"{"id":"x","content":"hi","expire":"2days"}"#),
        );

        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Invalid configuration for read-only attribute: id",
                "Invalid value for expire",
            ]
        );
    }

    #[test]
    fn validate_accepts_unknown_values() {
        let diags = validate_config(
            &schema(),
            &value(r#"{"content":"__unknown__","expire":"__unknown__"}"#),
        );

        assert!(diags.is_empty());
    }

    #[test]
    fn validate_reports_type_mismatch() {
        let diags = validate_config(&schema(), &value(r#"{"content":true}"#));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Type mismatch for field: content");
    }
}
