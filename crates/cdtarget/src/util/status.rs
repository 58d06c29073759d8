use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

/// Builds a condition stamped with the current time.
pub fn new_condition(
    condition_type: &str,
    status: bool,
    reason: &str,
    message: impl Into<String>,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: condition_type.to_string(),
        status: if status { CONDITION_TRUE } else { CONDITION_FALSE }.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

/// Sets the corresponding condition in conditions to new_condition and returns
/// a tuple containing the new conditions vector and whether it was changed.
///
/// 1. If the condition of the specified type already exists, all fields of the existing condition
///    are updated to new_condition. LastTransitionTime is only moved when the status flips.
/// 2. If a condition of the specified type does not exist, new_condition is appended as is
pub fn set_status_condition(conditions: &[Condition], new_condition: Condition) -> (Vec<Condition>, bool) {
    let mut new_conditions = Vec::from(conditions);
    let mut changed = false;

    if let Some(existing) = find_status_condition_mut(&mut new_conditions, &new_condition.type_) {
        if existing.status != new_condition.status {
            existing.status = new_condition.status;
            existing.last_transition_time = new_condition.last_transition_time;
            changed = true;
        }

        if existing.reason != new_condition.reason {
            existing.reason = new_condition.reason;
            changed = true;
        }

        if existing.message != new_condition.message {
            existing.message = new_condition.message;
            changed = true;
        }

        if existing.observed_generation != new_condition.observed_generation {
            existing.observed_generation = new_condition.observed_generation;
            changed = true;
        }
    } else {
        new_conditions.push(new_condition);
        changed = true;
    }

    (new_conditions, changed)
}

/// Finds the condition_type in conditions.
pub fn find_status_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|condition| condition.type_ == condition_type)
}

fn find_status_condition_mut<'a>(
    conditions: &'a mut [Condition],
    condition_type: &str,
) -> Option<&'a mut Condition> {
    conditions
        .iter_mut()
        .find(|condition| condition.type_ == condition_type)
}

/// Returns true when the condition_type is present and set to `True`
pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|condition| condition.type_ == condition_type && condition.status == CONDITION_TRUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(condition: Condition, seconds: i64) -> Condition {
        Condition {
            last_transition_time: Time(Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)),
            ..condition
        }
    }

    #[test]
    fn test_set_status_condition_appends_new_type() {
        let condition = new_condition("ReconcileSuccess", true, "OperatorSucceeded", "ok", Some(1));

        let (conditions, changed) = set_status_condition(&[], condition);
        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert!(is_status_condition_true(&conditions, "ReconcileSuccess"));
    }

    #[test]
    fn test_set_status_condition_updates_in_place() {
        let first = at(new_condition("ReconcileSuccess", true, "OperatorSucceeded", "ok", Some(1)), 0);
        let (conditions, _) = set_status_condition(&[], first);

        let failed = at(
            new_condition("ReconcileSuccess", false, "OperandConfigMapFailed", "conflict", Some(2)),
            60,
        );
        let (conditions, changed) = set_status_condition(&conditions, failed.clone());
        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, CONDITION_FALSE);
        assert_eq!(conditions[0].reason, "OperandConfigMapFailed");
        assert_eq!(conditions[0].last_transition_time, failed.last_transition_time);
    }

    #[test]
    fn test_set_status_condition_keeps_transition_time_when_status_unchanged() {
        let first = at(new_condition("ReconcileSuccess", false, "SecretNotAvailable", "a", None), 0);
        let (conditions, _) = set_status_condition(&[], first.clone());

        let second = at(new_condition("ReconcileSuccess", false, "OperandSecretFailed", "b", None), 120);
        let (conditions, changed) = set_status_condition(&conditions, second);
        assert!(changed);
        assert_eq!(conditions[0].reason, "OperandSecretFailed");
        assert_eq!(conditions[0].message, "b");
        assert_eq!(conditions[0].last_transition_time, first.last_transition_time);
    }

    #[test]
    fn test_set_status_condition_identical_is_not_a_change() {
        let condition = at(new_condition("ReconcileSuccess", true, "OperatorSucceeded", "ok", Some(3)), 0);
        let (conditions, _) = set_status_condition(&[], condition.clone());
        let (conditions, changed) = set_status_condition(&conditions, at(condition, 30));
        assert!(!changed);
        assert!(find_status_condition(&conditions, "ReconcileSuccess").is_some());
    }
}
