//! Step 4: idea generation and selection.
//!
//! Progress is weighted: 60 points for reaching [`MIN_IDEAS`] valid ideas,
//! 20 for having exactly one selected, and 20 more once that selection is
//! justified. The last 20 are only reachable after the selection 20.

use super::{is_filled, is_long_enough, scaled, trimmed_len, FieldIssue, MIN_LONG_TEXT};
use crate::types::Idea;

pub const MIN_IDEAS: usize = 5;

const IDEAS_POINTS: usize = 60;
const SELECTION_POINTS: u8 = 20;
const JUSTIFICATION_POINTS: u8 = 20;

pub fn is_valid(idea: &Idea) -> bool {
    is_filled(&idea.description)
        && is_filled(&idea.kind)
        && idea.innovation.is_some()
        && idea.feasibility.is_some()
}

pub fn valid_count(ideas: &[Idea]) -> usize {
    ideas.iter().filter(|i| is_valid(i)).count()
}

/// The selected idea, if exactly one is selected
pub fn single_selection(ideas: &[Idea]) -> Option<&Idea> {
    let mut selected = ideas.iter().filter(|i| i.selected);
    match (selected.next(), selected.next()) {
        (Some(idea), None) => Some(idea),
        _ => None,
    }
}

fn is_justified(idea: &Idea) -> bool {
    idea.justification.as_deref().is_some_and(is_long_enough)
}

pub fn is_complete(ideas: &[Idea]) -> bool {
    valid_count(ideas) >= MIN_IDEAS
        && single_selection(ideas).is_some_and(|idea| is_valid(idea) && is_justified(idea))
}

pub fn progress(ideas: &[Idea]) -> u8 {
    let mut score = scaled(IDEAS_POINTS, valid_count(ideas), MIN_IDEAS);
    if let Some(idea) = single_selection(ideas) {
        score += SELECTION_POINTS;
        if is_justified(idea) {
            score += JUSTIFICATION_POINTS;
        }
    }
    score.min(100)
}

pub fn issues(ideas: &[Idea]) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let valid = valid_count(ideas);
    if valid < MIN_IDEAS {
        issues.push(FieldIssue::new(
            "ideas",
            format!("needs at least {MIN_IDEAS} complete ideas (currently {valid})"),
        ));
        for (i, idea) in ideas.iter().enumerate().filter(|(_, i)| !is_valid(i)) {
            let row = i + 1;
            if !is_filled(&idea.description) {
                issues.push(FieldIssue::required(format!("ideas[{row}].description")));
            }
            if !is_filled(&idea.kind) {
                issues.push(FieldIssue::required(format!("ideas[{row}].kind")));
            }
            if idea.innovation.is_none() {
                issues.push(FieldIssue::required(format!("ideas[{row}].innovation")));
            }
            if idea.feasibility.is_none() {
                issues.push(FieldIssue::required(format!("ideas[{row}].feasibility")));
            }
        }
    }

    let selected = ideas.iter().filter(|i| i.selected).count();
    match single_selection(ideas) {
        None if selected == 0 => issues.push(FieldIssue::new("selected", "select one idea")),
        None => issues.push(FieldIssue::new(
            "selected",
            format!("exactly one idea may be selected (currently {selected})"),
        )),
        Some(idea) => {
            if !is_valid(idea) {
                issues.push(FieldIssue::new("selected", "the selected idea is incomplete"));
            }
            if !is_justified(idea) {
                let len = idea.justification.as_deref().map_or(0, trimmed_len);
                issues.push(FieldIssue::new(
                    "justification",
                    format!("must be at least {MIN_LONG_TEXT} characters (currently {len})"),
                ));
            }
        }
    }
    issues
}

/// Radio-style selection toggle
///
/// Selecting an idea clears every other selection. Toggling an already
/// selected idea only deselects it. Returns the new `selected` value, or
/// `None` if `index` is out of range.
pub fn toggle_selection(ideas: &mut [Idea], index: usize) -> Option<bool> {
    let was_selected = ideas.get(index)?.selected;
    if was_selected {
        ideas[index].selected = false;
        return Some(false);
    }
    for (i, idea) in ideas.iter_mut().enumerate() {
        idea.selected = i == index;
    }
    Some(true)
}
