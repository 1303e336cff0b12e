//! Step 3: observed trends.

use super::{is_filled, percent, FieldIssue};
use crate::types::Trend;

/// Valid rows required before the step is complete
pub const MIN_TRENDS: usize = 3;

/// A row is valid once name, kind, brief and example are present
pub fn is_valid(trend: &Trend) -> bool {
    is_filled(&trend.name)
        && trend.kind.is_some()
        && is_filled(&trend.brief)
        && is_filled(&trend.example)
}

pub fn valid_count(trends: &[Trend]) -> usize {
    trends.iter().filter(|t| is_valid(t)).count()
}

pub fn is_complete(trends: &[Trend]) -> bool {
    valid_count(trends) >= MIN_TRENDS
}

pub fn progress(trends: &[Trend]) -> u8 {
    percent(valid_count(trends), MIN_TRENDS)
}

pub fn issues(trends: &[Trend]) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    for (i, trend) in trends.iter().enumerate() {
        let row = i + 1;
        if !is_filled(&trend.name) {
            issues.push(FieldIssue::required(format!("trends[{row}].name")));
        }
        if trend.kind.is_none() {
            issues.push(FieldIssue::new(
                format!("trends[{row}].kind"),
                "must be one of Social, Tecnológica, Ambiental, Cultural, Consumo",
            ));
        }
        if !is_filled(&trend.brief) {
            issues.push(FieldIssue::required(format!("trends[{row}].brief")));
        }
        if !is_filled(&trend.example) {
            issues.push(FieldIssue::required(format!("trends[{row}].example")));
        }
    }

    let valid = valid_count(trends);
    if valid < MIN_TRENDS {
        issues.push(FieldIssue::new(
            "trends",
            format!("needs at least {MIN_TRENDS} complete trends (currently {valid})"),
        ));
    } else {
        // Incomplete extra rows do not block the step
        issues.clear();
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::fixtures::trend;

    #[test]
    fn test_partial_credit_below_minimum() {
        let expected = [0, 33, 67];
        for (k, want) in expected.into_iter().enumerate() {
            let rows: Vec<Trend> = (0..k).map(|_| trend()).collect();
            assert_eq!(progress(&rows), want, "{k} valid rows");
            assert!(!is_complete(&rows));
        }
    }

    #[test]
    fn test_plateau_at_and_above_minimum() {
        for k in [3, 4, 50] {
            let rows: Vec<Trend> = (0..k).map(|_| trend()).collect();
            assert_eq!(progress(&rows), 100, "{k} valid rows");
            assert!(is_complete(&rows));
            assert!(issues(&rows).is_empty());
        }
    }

    #[test]
    fn test_invalid_rows_do_not_count() {
        let mut missing_kind = trend();
        missing_kind.kind = None;
        let mut blank_example = trend();
        blank_example.example = "  ".to_string();

        let rows = vec![trend(), missing_kind, blank_example];
        assert_eq!(valid_count(&rows), 1);
        assert_eq!(progress(&rows), 33);

        let issues = issues(&rows);
        assert!(issues.iter().any(|i| i.field == "trends[2].kind"));
        assert!(issues.iter().any(|i| i.field == "trends[3].example"));
        assert!(issues.iter().any(|i| i.field == "trends"));
    }

    #[test]
    fn test_optional_fields_are_not_required() {
        let t = trend();
        assert!(t.source.is_none());
        assert!(t.comment.is_none());
        assert!(is_valid(&t));
    }

    #[test]
    fn test_filling_fields_never_lowers_progress() {
        let blank = || Trend {
            name: String::new(),
            kind: None,
            brief: String::new(),
            example: String::new(),
            ..trend()
        };
        let fills: [fn(&mut Trend); 4] = [
            |t| t.name = "Economía circular".to_string(),
            |t| t.kind = Some(crate::types::TrendKind::Environmental),
            |t| t.brief = "Reutilizar materiales".to_string(),
            |t| t.example = "Tiendas a granel".to_string(),
        ];

        let mut rows = vec![blank(), blank(), blank()];
        let mut last = progress(&rows);
        assert_eq!(last, 0);
        for i in 0..rows.len() {
            for fill in fills {
                fill(&mut rows[i]);
                let now = progress(&rows);
                assert!(now >= last, "row {i}: {now} < {last}");
                last = now;
            }
        }
        assert_eq!(last, 100);
        assert!(is_complete(&rows));
    }
}
