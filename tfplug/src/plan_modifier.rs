use crate::types::{AttributePath, Diagnostic, Dynamic};

/// Request for plan modifiers
#[derive(Debug, Clone)]
pub struct PlanModifierRequest {
    pub config_value: Dynamic,
    pub state_value: Dynamic,
    pub plan_value: Dynamic,
    pub path: AttributePath,
}

/// Response from plan modifiers
#[derive(Debug, Clone)]
pub struct PlanModifierResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Trait for modifying terraform plan behavior
///
/// Plan modifiers run after the framework has built the proposed plan and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
pub trait PlanModifier: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;

    /// Modify the plan for an attribute
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "If the value of this attribute changes, Terraform will destroy and recreate the resource."
            .to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        // An unknown plan value may still settle on something different, so
        // it counts as a change unless the state is unknown as well.
        let requires_replace = !matches!(
            (&request.state_value, &request.plan_value),
            (Dynamic::Null, Dynamic::Null) | (Dynamic::Unknown, _)
        ) && !values_equal(&request.state_value, &request.plan_value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// A plan modifier that uses the current state value when the planned value is unknown
///
/// This is particularly useful for computed attributes that should retain their value
/// during planning when Terraform doesn't know what the new value will be.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value, &request.state_value) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan_value,
            (Dynamic::Unknown, state) => state.clone(),
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Helper function to compare two Dynamic values for equality
pub(crate) fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: plan.clone(),
            state_value: state,
            plan_value: plan,
            path: AttributePath::new("content"),
        }
    }

    #[test]
    fn requires_replace_if_changed_does_not_trigger_on_same_value() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::String("hello".to_string()),
            Dynamic::String("hello".to_string()),
        ));

        assert!(!response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_different_value() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::String("hello".to_string()),
            Dynamic::String("world".to_string()),
        ));

        assert!(response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_if_changed_ignores_null_to_null() {
        let response = RequiresReplaceIfChanged.modify(request(Dynamic::Null, Dynamic::Null));

        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_triggers_when_value_is_set_or_cleared() {
        let set = RequiresReplaceIfChanged.modify(request(
            Dynamic::Null,
            Dynamic::String("notes.txt".to_string()),
        ));
        assert!(set.requires_replace);

        let cleared = RequiresReplaceIfChanged.modify(request(
            Dynamic::String("notes.txt".to_string()),
            Dynamic::Null,
        ));
        assert!(cleared.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_treats_unknown_plan_as_change() {
        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::String("value".to_string()),
            Dynamic::Unknown,
        ));
        assert!(response.requires_replace);

        let response = RequiresReplaceIfChanged.modify(request(
            Dynamic::Unknown,
            Dynamic::String("value".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn values_equal_handles_all_types() {
        assert!(values_equal(&Dynamic::Number(42.0), &Dynamic::Number(42.0)));
        assert!(!values_equal(
            &Dynamic::Number(42.0),
            &Dynamic::Number(43.0)
        ));

        assert!(values_equal(&Dynamic::Bool(true), &Dynamic::Bool(true)));
        assert!(!values_equal(&Dynamic::Bool(true), &Dynamic::Bool(false)));

        let list1 = Dynamic::List(vec![Dynamic::String("a".to_string()), Dynamic::Number(1.0)]);
        let list2 = Dynamic::List(vec![Dynamic::String("a".to_string()), Dynamic::Number(1.0)]);
        let list3 = Dynamic::List(vec![Dynamic::String("b".to_string()), Dynamic::Number(1.0)]);
        assert!(values_equal(&list1, &list2));
        assert!(!values_equal(&list1, &list3));

        let map1 = HashMap::from([("key".to_string(), Dynamic::String("value".to_string()))]);
        let map2 = HashMap::from([("key".to_string(), Dynamic::String("value".to_string()))]);
        let map3 = HashMap::from([("key".to_string(), Dynamic::String("different".to_string()))]);

        assert!(values_equal(
            &Dynamic::Map(map1.clone()),
            &Dynamic::Map(map2)
        ));
        assert!(!values_equal(&Dynamic::Map(map1), &Dynamic::Map(map3)));
    }

    #[test]
    fn use_state_for_unknown_preserves_state_when_unknown() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("existing-value".to_string()),
            Dynamic::Unknown,
        ));

        assert_eq!(
            response.plan_value,
            Dynamic::String("existing-value".to_string())
        );
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_unknown_without_state() {
        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));

        assert_eq!(response.plan_value, Dynamic::Unknown);
    }

    #[test]
    fn use_state_for_unknown_uses_plan_when_known() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("existing-value".to_string()),
            Dynamic::String("new-value".to_string()),
        ));

        assert_eq!(response.plan_value, Dynamic::String("new-value".to_string()));
        assert!(!response.requires_replace);
    }
}
