use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};

use super::common::now;
use crate::workflows::hiring::domain::{
    ComparableValue, Condition, FieldId, Flow, Operation, ReferenceId, Stage, StageType,
};
use crate::workflows::hiring::evaluation::{BranchDecision, ConditionEvaluator};
use crate::workflows::hiring::submission::{
    ComponentSubmission, FileReference, FormSubmission, FullName, InterviewSubmission,
    StageSubmission, TestSubmission,
};

fn condition(field: Option<&str>, operation: Operation, value: ComparableValue) -> Condition {
    Condition {
        from: "s0".into(),
        to: "s1".into(),
        field: field.map(FieldId::from),
        operation,
        value,
    }
}

fn form_with(field: &str, value: ComponentSubmission) -> StageSubmission {
    StageSubmission::FormSubmission(FormSubmission {
        components: BTreeMap::from([(FieldId::from(field), value)]),
        submitted_at: now(),
    })
}

fn test_scored(grade: f64, total_points: f64) -> StageSubmission {
    StageSubmission::TestSubmission(TestSubmission {
        answers: BTreeMap::new(),
        grade,
        total_points,
        started_at: now() - Duration::minutes(20),
        submitted_at: now(),
    })
}

fn interview_graded(grade: f64) -> StageSubmission {
    StageSubmission::InterviewSubmission(InterviewSubmission {
        notes: "clear communicator".to_string(),
        grade,
        interviewer: "ivan".into(),
        submitted_at: now(),
    })
}

fn selections(values: &[&str]) -> ComponentSubmission {
    ComponentSubmission::MultipleChoice(values.iter().map(|value| value.to_string()).collect())
}

fn wanted(values: &[&str]) -> ComparableValue {
    ComparableValue::Selections(values.iter().map(|value| value.to_string()).collect())
}

#[test]
fn text_equality_ignores_case_and_surrounding_space() {
    let evaluator = ConditionEvaluator;
    let edge = condition(
        Some("relocate"),
        Operation::Eq,
        ComparableValue::Text(" yes".to_string()),
    );

    for answer in ["Yes", "YES", "yes  "] {
        let submission = form_with(
            "relocate",
            ComponentSubmission::SingleChoice(answer.to_string()),
        );
        assert!(evaluator.evaluate(&edge, &submission), "{answer} should match");
    }
    let submission = form_with("relocate", ComponentSubmission::SingleChoice("no".to_string()));
    assert!(!evaluator.evaluate(&edge, &submission));

    let negated = condition(
        Some("relocate"),
        Operation::Ne,
        ComparableValue::Text("YES".to_string()),
    );
    assert!(evaluator.evaluate(&negated, &submission));
}

#[test]
fn text_includes_matches_substrings() {
    let evaluator = ConditionEvaluator;
    let edge = condition(
        Some("bio"),
        Operation::Includes,
        ComparableValue::Text("RUST".to_string()),
    );
    let submission = form_with(
        "bio",
        ComponentSubmission::LongText("Five years of Rust and Go".to_string()),
    );

    assert!(evaluator.evaluate(&edge, &submission));
}

#[test]
fn selection_equality_ignores_order() {
    let evaluator = ConditionEvaluator;
    let edge = condition(Some("skills"), Operation::Eq, wanted(&["sql", "rust"]));

    assert!(evaluator.evaluate(&edge, &form_with("skills", selections(&["rust", "sql"]))));
    assert!(!evaluator.evaluate(&edge, &form_with("skills", selections(&["rust"]))));
    assert!(!evaluator.evaluate(
        &edge,
        &form_with("skills", selections(&["rust", "sql", "go"]))
    ));
}

#[test]
fn selection_includes_is_a_superset_check() {
    let evaluator = ConditionEvaluator;
    let answer = form_with("skills", selections(&["rust", "sql", "go"]));

    assert!(evaluator.evaluate(
        &condition(Some("skills"), Operation::Includes, wanted(&["go", "rust"])),
        &answer
    ));
    assert!(evaluator.evaluate(
        &condition(Some("skills"), Operation::Includes, wanted(&[])),
        &answer
    ));
    assert!(!evaluator.evaluate(
        &condition(Some("skills"), Operation::Includes, wanted(&["java"])),
        &answer
    ));
    assert!(evaluator.evaluate(
        &condition(
            Some("skills"),
            Operation::Includes,
            ComparableValue::Text("sql".to_string())
        ),
        &answer
    ));
}

#[test]
fn selections_compare_exactly() {
    let evaluator = ConditionEvaluator;
    let edge = condition(Some("skills"), Operation::Includes, wanted(&["Rust"]));

    assert!(!evaluator.evaluate(&edge, &form_with("skills", selections(&["rust"]))));
}

#[test]
fn numbers_and_dates_use_ordering() {
    let evaluator = ConditionEvaluator;
    let years = form_with("years", ComponentSubmission::Number(4.0));

    assert!(evaluator.evaluate(
        &condition(Some("years"), Operation::Gte, ComparableValue::Number(4.0)),
        &years
    ));
    assert!(!evaluator.evaluate(
        &condition(Some("years"), Operation::Gt, ComparableValue::Number(4.0)),
        &years
    ));
    assert!(evaluator.evaluate(
        &condition(Some("years"), Operation::Ne, ComparableValue::Number(3.0)),
        &years
    ));

    let cutoff = Utc
        .with_ymd_and_hms(2025, 6, 1, 0, 0, 0)
        .single()
        .expect("valid date");
    let available = form_with("available", ComponentSubmission::Date(now()));
    assert!(evaluator.evaluate(
        &condition(Some("available"), Operation::Lt, ComparableValue::Date(cutoff)),
        &available
    ));
    assert!(!evaluator.evaluate(
        &condition(Some("available"), Operation::Gte, ComparableValue::Date(cutoff)),
        &available
    ));
}

#[test]
fn names_compare_both_parts_case_insensitively() {
    let evaluator = ConditionEvaluator;
    let submission = form_with(
        "name",
        ComponentSubmission::FullName(FullName {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
        }),
    );
    let exact = ComparableValue::FullName {
        name: "ada".to_string(),
        surname: "LOVELACE".to_string(),
    };
    let first_only = ComparableValue::FullName {
        name: "ada".to_string(),
        surname: "Byron".to_string(),
    };

    assert!(evaluator.evaluate(&condition(Some("name"), Operation::Eq, exact), &submission));
    assert!(!evaluator.evaluate(
        &condition(Some("name"), Operation::Eq, first_only.clone()),
        &submission
    ));
    assert!(evaluator.evaluate(
        &condition(Some("name"), Operation::Ne, first_only),
        &submission
    ));
}

#[test]
fn mismatched_kinds_and_missing_answers_never_match() {
    let evaluator = ConditionEvaluator;
    let number = form_with("years", ComponentSubmission::Number(7.0));
    let text_edge = condition(
        Some("years"),
        Operation::Eq,
        ComparableValue::Text("7".to_string()),
    );
    assert!(!evaluator.evaluate(&text_edge, &number));

    let other_field = condition(Some("missing"), Operation::Ne, ComparableValue::Number(1.0));
    assert!(!evaluator.evaluate(&other_field, &number));

    let file = form_with(
        "resume",
        ComponentSubmission::File(FileReference {
            storage_key: "uploads/resume.pdf".to_string(),
            file_name: "resume.pdf".to_string(),
        }),
    );
    let file_edge = condition(
        Some("resume"),
        Operation::Ne,
        ComparableValue::Text("x".to_string()),
    );
    assert!(!evaluator.evaluate(&file_edge, &file));
}

#[test]
fn form_edges_without_a_field_are_unsatisfied() {
    let evaluator = ConditionEvaluator;
    let submission = form_with("years", ComponentSubmission::Number(7.0));

    assert!(!evaluator.evaluate(
        &condition(None, Operation::Gte, ComparableValue::Number(0.0)),
        &submission
    ));
}

#[test]
fn test_edges_compare_percentage_scores() {
    let evaluator = ConditionEvaluator;
    let edge = condition(None, Operation::Gte, ComparableValue::Number(50.0));

    assert!(evaluator.evaluate(&edge, &test_scored(5.0, 10.0)));
    assert!(!evaluator.evaluate(&edge, &test_scored(4.0, 10.0)));
    assert!(!evaluator.evaluate(
        &condition(Some("q1"), Operation::Gte, ComparableValue::Number(0.0)),
        &test_scored(10.0, 10.0)
    ));
}

#[test]
fn zero_point_tests_never_satisfy_a_condition() {
    let evaluator = ConditionEvaluator;

    for operation in [Operation::Gte, Operation::Lte, Operation::Eq, Operation::Ne] {
        let edge = condition(None, operation, ComparableValue::Number(0.0));
        assert!(
            !evaluator.evaluate(&edge, &test_scored(0.0, 0.0)),
            "{operation:?} should be unsatisfied"
        );
    }
}

#[test]
fn interview_edges_compare_the_grade() {
    let evaluator = ConditionEvaluator;
    let edge = condition(None, Operation::Gt, ComparableValue::Number(6.5));

    assert!(evaluator.evaluate(&edge, &interview_graded(7.0)));
    assert!(!evaluator.evaluate(&edge, &interview_graded(6.5)));
}

#[test]
fn decide_distinguishes_missing_edges_from_failed_ones() {
    let evaluator = ConditionEvaluator;
    let mut flow = Flow::new("Analyst", "Acme");
    for (position, stage_type) in [StageType::Test, StageType::Interview, StageType::Form]
        .into_iter()
        .enumerate()
    {
        flow.stages.push(Stage {
            id: format!("s{position}").as_str().into(),
            stage_type,
            reference_id: ReferenceId::from("ref"),
            start_date: None,
            end_date: None,
            test_duration: None,
        });
    }
    flow.conditions.push(condition(
        None,
        Operation::Gte,
        ComparableValue::Number(80.0),
    ));

    assert_eq!(
        evaluator.decide(&flow, &"s0".into(), &test_scored(9.0, 10.0)),
        BranchDecision::Satisfied
    );
    assert_eq!(
        evaluator.decide(&flow, &"s0".into(), &test_scored(7.0, 10.0)),
        BranchDecision::Unsatisfied
    );
    assert_eq!(
        evaluator.decide(&flow, &"s1".into(), &interview_graded(1.0)),
        BranchDecision::Unconditional
    );
    assert!(BranchDecision::Unconditional.advances());
    assert!(!BranchDecision::Unsatisfied.advances());
}
