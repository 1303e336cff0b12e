//! Step 1: what each team member brings.

use std::collections::HashSet;

use super::{percent, FieldIssue, ProgressContext};
use crate::types::MemberMeans;

/// Distinct roster members with at least one non-blank field
///
/// Rows for ids outside a known roster are ignored.
pub fn completed_members(rows: &[MemberMeans], ctx: &ProgressContext) -> usize {
    rows.iter()
        .filter(|m| m.has_data() && ctx.on_roster(m.member_id))
        .map(|m| m.member_id)
        .collect::<HashSet<_>>()
        .len()
}

pub fn is_complete(rows: &[MemberMeans], ctx: &ProgressContext) -> bool {
    ctx.expected_members > 0 && completed_members(rows, ctx) >= ctx.expected_members
}

pub fn progress(rows: &[MemberMeans], ctx: &ProgressContext) -> u8 {
    percent(completed_members(rows, ctx), ctx.expected_members)
}

pub fn issues(rows: &[MemberMeans], ctx: &ProgressContext) -> Vec<FieldIssue> {
    if ctx.expected_members == 0 {
        return vec![FieldIssue::new("members", "team has no members on its roster")];
    }
    let done = completed_members(rows, ctx);
    if done >= ctx.expected_members {
        return Vec::new();
    }
    vec![FieldIssue::new(
        "members",
        format!(
            "{done} of {} members have described their means",
            ctx.expected_members
        ),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::fixtures::member;
    use crate::types::Team;

    #[test]
    fn test_progress_is_fraction_of_expected_members() {
        let ctx = ProgressContext::new(3);
        let rows = vec![member(true), member(false), member(true)];
        assert_eq!(progress(&rows, &ctx), 67);
        assert!(!is_complete(&rows, &ctx));
        assert_eq!(issues(&rows, &ctx).len(), 1);
    }

    #[test]
    fn test_zero_expected_members_scores_zero() {
        let ctx = ProgressContext::new(0);
        let rows = vec![member(true)];
        assert_eq!(progress(&rows, &ctx), 0);
        assert!(!is_complete(&rows, &ctx));
    }

    #[test]
    fn test_duplicate_rows_for_one_member_count_once() {
        let ctx = ProgressContext::new(2);
        let first = member(true);
        let mut duplicate = member(true);
        duplicate.member_id = first.member_id;
        assert_eq!(progress(&[first, duplicate], &ctx), 50);
    }

    #[test]
    fn test_more_rows_than_roster_caps_at_full() {
        let ctx = ProgressContext::new(1);
        let rows = vec![member(true), member(true)];
        assert_eq!(progress(&rows, &ctx), 100);
        assert!(is_complete(&rows, &ctx));
        assert!(issues(&rows, &ctx).is_empty());
    }

    #[test]
    fn test_rows_outside_known_roster_are_ignored() {
        let team = Team::new("Equipo Sol", ["Ana", "Luis"]);
        let ctx = ProgressContext::for_team(Some(&team));
        let mut ana = member(true);
        ana.member_id = team.members[0].id;
        // Former member, or an id that never belonged to the team
        let stranger = member(true);

        let rows = vec![ana, stranger];
        assert_eq!(completed_members(&rows, &ctx), 1);
        assert_eq!(progress(&rows, &ctx), 50);
        assert!(!is_complete(&rows, &ctx));
        assert_eq!(issues(&rows, &ctx).len(), 1);

        // Size-only contexts cannot tell strangers apart
        assert_eq!(progress(&rows, &ProgressContext::new(2)), 100);
    }

    #[test]
    fn test_filling_a_member_never_lowers_progress() {
        let ctx = ProgressContext::new(4);
        let mut rows = vec![member(false), member(false), member(false), member(false)];
        let mut last = progress(&rows, &ctx);
        for i in 0..rows.len() {
            rows[i].identity = "Diseñadora".to_string();
            let now = progress(&rows, &ctx);
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 100);
    }
}
