use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::super::domain::{ComparableValue, Operation};
use super::super::submission::{ComponentSubmission, FullName};

/// Runtime value kind of a submitted answer, as seen by the comparison table.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operand<'a> {
    Text(&'a str),
    Number(f64),
    Date(DateTime<Utc>),
    Name(&'a FullName),
    Selections(&'a [String]),
    /// Answers that never satisfy a condition (uploaded files).
    Opaque,
}

impl<'a> Operand<'a> {
    pub(crate) fn of(component: &'a ComponentSubmission) -> Self {
        match component {
            ComponentSubmission::ShortText(text)
            | ComponentSubmission::LongText(text)
            | ComponentSubmission::Address(text)
            | ComponentSubmission::Phone(text)
            | ComponentSubmission::SingleChoice(text)
            | ComponentSubmission::Dropdown(text) => Operand::Text(text),
            ComponentSubmission::MultipleChoice(selections) => Operand::Selections(selections),
            ComponentSubmission::Number(number) => Operand::Number(*number),
            ComponentSubmission::Date(date) => Operand::Date(*date),
            ComponentSubmission::FullName(name) => Operand::Name(name),
            ComponentSubmission::File(_) => Operand::Opaque,
        }
    }
}

/// Value kind × operation table. Mismatched operand kinds never match.
pub(crate) fn compare(
    operand: Operand<'_>,
    operation: Operation,
    expected: &ComparableValue,
) -> bool {
    match (operand, expected) {
        (Operand::Text(actual), ComparableValue::Text(wanted)) => text(actual, operation, wanted),
        (Operand::Number(actual), ComparableValue::Number(wanted)) => {
            ordered(actual.partial_cmp(wanted), operation)
        }
        (Operand::Date(actual), ComparableValue::Date(wanted)) => {
            ordered(Some(actual.cmp(wanted)), operation)
        }
        (Operand::Name(actual), ComparableValue::FullName { name, surname }) => {
            full_name(actual, operation, name, surname)
        }
        (Operand::Selections(actual), ComparableValue::Selections(wanted)) => {
            selections(actual, operation, wanted)
        }
        (Operand::Selections(actual), ComparableValue::Text(wanted)) => {
            selections(actual, operation, std::slice::from_ref(wanted))
        }
        _ => false,
    }
}

/// Numeric score against a numeric condition value; the score side of TEST and INTERVIEW edges.
pub(crate) fn compare_score(score: f64, operation: Operation, expected: &ComparableValue) -> bool {
    match expected {
        ComparableValue::Number(wanted) => ordered(score.partial_cmp(wanted), operation),
        _ => false,
    }
}

fn ordered(ordering: Option<Ordering>, operation: Operation) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match operation {
        Operation::Eq => ordering == Ordering::Equal,
        Operation::Ne => ordering != Ordering::Equal,
        Operation::Gt => ordering == Ordering::Greater,
        Operation::Lt => ordering == Ordering::Less,
        Operation::Gte => ordering != Ordering::Less,
        Operation::Lte => ordering != Ordering::Greater,
        Operation::Includes => false,
    }
}

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

fn text(actual: &str, operation: Operation, wanted: &str) -> bool {
    let (actual, wanted) = (fold(actual), fold(wanted));
    match operation {
        Operation::Eq => actual == wanted,
        Operation::Ne => actual != wanted,
        Operation::Includes => actual.contains(&wanted),
        _ => false,
    }
}

fn full_name(actual: &FullName, operation: Operation, name: &str, surname: &str) -> bool {
    let (first, last) = (fold(&actual.name), fold(&actual.surname));
    let (name, surname) = (fold(name), fold(surname));
    match operation {
        Operation::Eq => first == name && last == surname,
        Operation::Ne => !(first == name && last == surname),
        Operation::Includes => first.contains(&name) && last.contains(&surname),
        _ => false,
    }
}

fn selections(actual: &[String], operation: Operation, wanted: &[String]) -> bool {
    match operation {
        Operation::Eq => sorted(actual) == sorted(wanted),
        Operation::Ne => sorted(actual) != sorted(wanted),
        Operation::Includes => wanted.iter().all(|value| actual.contains(value)),
        _ => false,
    }
}

fn sorted(values: &[String]) -> Vec<&str> {
    let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
    values.sort_unstable();
    values
}
