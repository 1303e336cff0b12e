//! Step 2: the problem statement.

use super::{is_filled, is_long_enough, percent, trimmed_len, FieldIssue};
use crate::types::Problem;

const FIELD_COUNT: usize = 5;

fn long_fields(p: &Problem) -> [(&'static str, &str); 4] {
    [
        ("description", p.description.as_str()),
        ("affected", p.affected.as_str()),
        ("relevance", p.relevance.as_str()),
        ("means_link", p.means_link.as_str()),
    ]
}

pub fn completed_fields(problem: Option<&Problem>) -> usize {
    let Some(p) = problem else {
        return 0;
    };
    usize::from(is_filled(&p.title))
        + long_fields(p)
            .iter()
            .filter(|(_, value)| is_long_enough(value))
            .count()
}

pub fn is_complete(problem: Option<&Problem>) -> bool {
    completed_fields(problem) == FIELD_COUNT
}

pub fn progress(problem: Option<&Problem>) -> u8 {
    percent(completed_fields(problem), FIELD_COUNT)
}

pub fn issues(problem: Option<&Problem>) -> Vec<FieldIssue> {
    let Some(p) = problem else {
        return vec![FieldIssue::required("problem")];
    };
    let mut issues = Vec::new();
    if !is_filled(&p.title) {
        issues.push(FieldIssue::required("title"));
    }
    for (field, value) in long_fields(p) {
        if !is_long_enough(value) {
            issues.push(FieldIssue::too_short(field, trimmed_len(value)));
        }
    }
    issues
}
