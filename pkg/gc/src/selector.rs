use pkg_types::policy::{FieldSelector, LabelSelector, LabelSelectorRequirement, TargetResource};
use pkg_types::resource::{FieldValue, Resource};

/// Does `resource` pass the target's label and field selectors?
/// An absent selector matches everything.
pub fn matches_selectors(resource: &Resource, target: &TargetResource) -> bool {
    if let Some(selector) = &target.label_selector
        && !label_selector_matches(selector, resource)
    {
        return false;
    }
    if let Some(selector) = &target.field_selector
        && !field_selector_matches(selector, resource)
    {
        return false;
    }
    true
}

/// Set-based label selector: every `matchLabels` pair and every expression must hold.
pub fn label_selector_matches(selector: &LabelSelector, resource: &Resource) -> bool {
    let labels_match = selector
        .match_labels
        .iter()
        .all(|(key, value)| resource.label(key) == Some(value.as_str()));

    labels_match
        && selector
            .match_expressions
            .iter()
            .all(|req| requirement_matches(req, resource))
}

fn requirement_matches(req: &LabelSelectorRequirement, resource: &Resource) -> bool {
    let value = resource.label(&req.key);
    match req.operator.as_str() {
        "In" => value.is_some_and(|v| req.values.iter().any(|candidate| candidate == v)),
        "NotIn" => value.is_none_or(|v| !req.values.iter().any(|candidate| candidate == v)),
        "Exists" => value.is_some(),
        "DoesNotExist" => value.is_none(),
        _ => false,
    }
}

/// In-memory exact string equality on dotted paths.
pub fn field_selector_matches(selector: &FieldSelector, resource: &Resource) -> bool {
    selector
        .match_fields
        .iter()
        .all(|(path, expected)| match resource.nested_string(path) {
            FieldValue::Found(actual) => actual == *expected,
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_resource() -> Resource {
        Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm",
                "namespace": "default",
                "labels": {"app": "demo", "tier": "backend"}
            },
            "data": {"mode": "batch"}
        }))
        .unwrap()
    }

    fn make_selector_eq(key: &str, value: &str) -> LabelSelector {
        let mut match_labels = BTreeMap::new();
        match_labels.insert(key.to_string(), value.to_string());
        LabelSelector {
            match_labels,
            match_expressions: vec![],
        }
    }

    fn make_selector_expr(key: &str, operator: &str, values: &[&str]) -> LabelSelector {
        LabelSelector {
            match_labels: BTreeMap::new(),
            match_expressions: vec![LabelSelectorRequirement {
                key: key.to_string(),
                operator: operator.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
            }],
        }
    }

    fn make_target(label: Option<LabelSelector>, fields: &[(&str, &str)]) -> TargetResource {
        TargetResource {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            namespace: None,
            label_selector: label,
            field_selector: (!fields.is_empty()).then(|| FieldSelector {
                match_fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }),
        }
    }

    #[test]
    fn no_selectors_match_everything() {
        assert!(matches_selectors(&make_resource(), &make_target(None, &[])));
    }

    #[test]
    fn match_labels_equality() {
        let r = make_resource();
        assert!(label_selector_matches(&make_selector_eq("app", "demo"), &r));
        assert!(!label_selector_matches(&make_selector_eq("app", "api"), &r));
        assert!(!label_selector_matches(&make_selector_eq("missing", "x"), &r));
    }

    #[test]
    fn expression_operators() {
        let r = make_resource();
        assert!(label_selector_matches(&make_selector_expr("tier", "In", &["backend", "worker"]), &r));
        assert!(!label_selector_matches(&make_selector_expr("tier", "In", &["frontend"]), &r));
        assert!(label_selector_matches(&make_selector_expr("tier", "NotIn", &["frontend"]), &r));
        assert!(label_selector_matches(&make_selector_expr("zone", "NotIn", &["a"]), &r));
        assert!(label_selector_matches(&make_selector_expr("app", "Exists", &[]), &r));
        assert!(!label_selector_matches(&make_selector_expr("app", "DoesNotExist", &[]), &r));
        assert!(label_selector_matches(&make_selector_expr("zone", "DoesNotExist", &[]), &r));
    }

    #[test]
    fn unknown_operator_never_matches() {
        let r = make_resource();
        assert!(!label_selector_matches(&make_selector_expr("app", "Matches", &["demo"]), &r));
    }

    #[test]
    fn field_selector_exact_string() {
        let r = make_resource();
        assert!(matches_selectors(&r, &make_target(None, &[("data.mode", "batch")])));
        assert!(!matches_selectors(&r, &make_target(None, &[("data.mode", "bat*")])));
        assert!(!matches_selectors(&r, &make_target(None, &[("data.absent", "")])));
        assert!(matches_selectors(
            &r,
            &make_target(
                Some(make_selector_eq("app", "demo")),
                &[("metadata.namespace", "default")]
            )
        ));
    }

    #[test]
    fn repeated_calls_agree() {
        let r = make_resource();
        let target = make_target(Some(make_selector_expr("tier", "In", &["backend"])), &[]);
        let first = matches_selectors(&r, &target);
        for _ in 0..5 {
            assert_eq!(matches_selectors(&r, &target), first);
        }
    }
}
