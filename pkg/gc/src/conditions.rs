use pkg_types::policy::{ConditionsSpec, FieldCondition, FieldOperator, MetadataCondition, MetadataOperator};
use pkg_types::resource::{FieldValue, Resource};

const PHASE_PATH: &str = "status.phase";

/// Extra gating checks, all AND-combined. Data that is missing fails its group.
pub fn meets_conditions(resource: &Resource, conditions: &ConditionsSpec) -> bool {
    phase_allowed(resource, &conditions.phase)
        && conditions
            .has_labels
            .iter()
            .all(|c| metadata_condition_holds(c, resource.label(&c.key)))
        && conditions
            .has_annotations
            .iter()
            .all(|c| metadata_condition_holds(c, resource.annotation(&c.key)))
        && conditions
            .and
            .iter()
            .all(|c| field_condition_holds(c, resource))
}

fn phase_allowed(resource: &Resource, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match resource.nested_string(PHASE_PATH) {
        FieldValue::Found(phase) => allowed.contains(&phase),
        _ => false,
    }
}

/// `equals` without a value only requires presence.
fn metadata_condition_holds(condition: &MetadataCondition, actual: Option<&str>) -> bool {
    match (condition.operator, actual) {
        (_, None) => false,
        (MetadataOperator::Exists, Some(_)) => true,
        (MetadataOperator::Equals, Some(actual)) => condition
            .value
            .as_deref()
            .is_none_or(|expected| expected == actual),
    }
}

fn field_condition_holds(condition: &FieldCondition, resource: &Resource) -> bool {
    let FieldValue::Found(actual) = resource.nested_string(&condition.field_path) else {
        return false;
    };
    let expected = condition.value.as_deref();
    match condition.operator {
        FieldOperator::Equals => expected == Some(actual.as_str()),
        FieldOperator::NotEquals => expected != Some(actual.as_str()),
        FieldOperator::In => condition.values.contains(&actual),
        FieldOperator::NotIn => !condition.values.contains(&actual),
    }
}
