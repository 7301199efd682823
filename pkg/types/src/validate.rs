use anyhow::{Result, bail};
use std::time::Duration;

use crate::policy::{FieldOperator, GarbageCollectionPolicy};

const SELECTOR_OPERATORS: &[&str] = &["In", "NotIn", "Exists", "DoesNotExist"];

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

/// Parse a duration such as `90`, `30s`, `5m`, `1h`, `2h30m` or `1d`.
/// A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("duration must not be empty");
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            _ => bail!("invalid duration '{}': unknown unit '{}'", raw, c),
        };
        if digits.is_empty() {
            bail!("invalid duration '{}': unit '{}' without a value", raw, c);
        }
        let value: u64 = digits.parse()?;
        total = total.saturating_add(value.saturating_mul(unit));
        digits.clear();
    }
    if !digits.is_empty() {
        bail!("invalid duration '{}': trailing number without a unit", raw);
    }
    Ok(Duration::from_secs(total))
}

/// Structural checks for a policy, applied on admission and before every cycle.
pub fn validate_policy(policy: &GarbageCollectionPolicy) -> Result<()> {
    validate_name(&policy.name)?;
    if policy.namespace.is_empty() {
        bail!("policy '{}' must have a namespace", policy.name);
    }

    let target = &policy.spec.target_resource;
    if target.api_version.trim().is_empty() {
        bail!("targetResource.apiVersion must not be empty");
    }
    if target.kind.trim().is_empty() {
        bail!("targetResource.kind must not be empty");
    }
    if let Some(selector) = &target.label_selector {
        for expr in &selector.match_expressions {
            if !SELECTOR_OPERATORS.contains(&expr.operator.as_str()) {
                bail!(
                    "labelSelector operator '{}' for key '{}' is not one of {:?}",
                    expr.operator,
                    expr.key,
                    SELECTOR_OPERATORS
                );
            }
        }
    }

    let ttl = &policy.spec.ttl;
    let modes = ttl.configured_modes();
    match modes.len() {
        0 => bail!("ttl must configure one of secondsAfterCreation, fieldPath or relativeTo"),
        1 => {}
        _ => bail!("ttl modes are mutually exclusive, got {}", modes.join(", ")),
    }
    for (field, value) in [
        ("secondsAfterCreation", ttl.seconds_after_creation),
        ("default", ttl.default),
        ("secondsAfter", ttl.seconds_after),
    ] {
        if value.is_some_and(|v| v < 0) {
            bail!("ttl.{} must not be negative", field);
        }
    }
    if ttl.mappings.is_some() && ttl.field_path.is_none() {
        bail!("ttl.mappings requires ttl.fieldPath");
    }
    if let Some(mappings) = &ttl.mappings
        && let Some((key, _)) = mappings.iter().find(|(_, v)| **v < 0)
    {
        bail!("ttl.mappings['{}'] must not be negative", key);
    }

    for condition in &policy.spec.conditions.and {
        if condition.field_path.trim().is_empty() {
            bail!("conditions.and entries need a fieldPath");
        }
        match condition.operator {
            FieldOperator::In | FieldOperator::NotIn if condition.values.is_empty() => {
                bail!(
                    "condition on '{}' uses {:?} without values",
                    condition.field_path,
                    condition.operator
                );
            }
            FieldOperator::Equals | FieldOperator::NotEquals if condition.value.is_none() => {
                bail!(
                    "condition on '{}' uses {:?} without a value",
                    condition.field_path,
                    condition.operator
                );
            }
            _ => {}
        }
    }

    let behavior = &policy.spec.behavior;
    if behavior.max_deletions_per_second == Some(0) {
        bail!("behavior.maxDeletionsPerSecond must be at least 1");
    }
    if behavior.batch_size == Some(0) {
        bail!("behavior.batchSize must be at least 1");
    }
    if behavior.grace_period_seconds.is_some_and(|g| g < 0) {
        bail!("behavior.gracePeriodSeconds must not be negative");
    }
    if let Some(interval) = &behavior.evaluation_interval {
        let parsed = parse_duration(interval)?;
        if parsed.is_zero() {
            bail!("behavior.evaluationInterval must be positive");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{
        FieldCondition, LabelSelector, LabelSelectorRequirement, PolicySpec, TargetResource,
        TtlSpec,
    };
    use chrono::Utc;

    fn make_policy() -> GarbageCollectionPolicy {
        GarbageCollectionPolicy {
            id: "uid-1".to_string(),
            name: "expire-pods".to_string(),
            namespace: "default".to_string(),
            spec: PolicySpec {
                target_resource: TargetResource {
                    api_version: "v1".to_string(),
                    kind: "Pod".to_string(),
                    ..Default::default()
                },
                ttl: TtlSpec {
                    seconds_after_creation: Some(3600),
                    ..Default::default()
                },
                ..Default::default()
            },
            status: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_names() {
        assert!(validate_name("nginx").is_ok());
        assert!(validate_name("my-app").is_ok());
        assert!(validate_name("app-123").is_ok());
        assert!(validate_name("a").is_ok());
        assert!(validate_name("a-b-c-d").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("My-App").is_err());
        assert!(validate_name("my_app").is_err());
        assert!(validate_name("-leading").is_err());
        assert!(validate_name("trailing-").is_err());
        assert!(validate_name("special!char").is_err());
        assert!(validate_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h30m").unwrap(), Duration::from_secs(9000));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1h5").is_err());
    }

    #[test]
    fn accepts_minimal_policy() {
        assert!(validate_policy(&make_policy()).is_ok());
    }

    #[test]
    fn rejects_multiple_ttl_modes() {
        let mut policy = make_policy();
        policy.spec.ttl.field_path = Some("spec.ttl".to_string());
        let err = validate_policy(&policy).unwrap_err().to_string();
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_missing_ttl() {
        let mut policy = make_policy();
        policy.spec.ttl = TtlSpec::default();
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn rejects_unknown_selector_operator() {
        let mut policy = make_policy();
        policy.spec.target_resource.label_selector = Some(LabelSelector {
            match_expressions: vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "Matches".to_string(),
                values: vec![],
            }],
            ..Default::default()
        });
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn rejects_bad_behavior() {
        let mut policy = make_policy();
        policy.spec.behavior.batch_size = Some(0);
        assert!(validate_policy(&policy).is_err());

        let mut policy = make_policy();
        policy.spec.behavior.max_deletions_per_second = Some(0);
        assert!(validate_policy(&policy).is_err());

        let mut policy = make_policy();
        policy.spec.behavior.evaluation_interval = Some("soon".to_string());
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn rejects_in_condition_without_values() {
        let mut policy = make_policy();
        policy.spec.conditions.and.push(FieldCondition {
            field_path: "status.phase".to_string(),
            operator: FieldOperator::In,
            ..Default::default()
        });
        assert!(validate_policy(&policy).is_err());
    }
}
