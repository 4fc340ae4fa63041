//! Schema-change safety heuristics

/// Whether a diff contains a structural change that risks breaking
/// downstream consumers.
///
/// Case-insensitive substring match on dropped tables/columns and columns
/// newly altered to NOT NULL.
pub fn has_breaking_changes(diff: &str) -> bool {
    let lower = diff.to_lowercase();
    lower.contains("drop table")
        || lower.contains("drop column")
        || (lower.contains("alter") && lower.contains("set not null"))
}

/// Whether a diff could destroy existing data.
///
/// Flagged for audit and reporting; does not by itself block a deployment.
pub fn has_data_loss_risk(diff: &str) -> bool {
    let lower = diff.to_lowercase();
    lower.contains("drop table") || lower.contains("truncate") || lower.contains("delete")
}

/// Extract an estimated compute-hours hint from plan output.
///
/// Bridges may embed a line such as `estimated compute hours: 1.25` or a
/// `compute_hours=1.25` token; the first parseable value wins.
pub fn extract_compute_hours(plan_stdout: &str) -> Option<f64> {
    for line in plan_stdout.lines() {
        let lower = line.to_lowercase();

        if let Some(pos) = lower.find("compute_hours=") {
            let rest = &line[pos + "compute_hours=".len()..];
            if let Some(value) = parse_leading_number(rest) {
                return Some(value);
            }
        }

        if let Some(pos) = lower.find("compute hours") {
            let rest = &line[pos + "compute hours".len()..];
            let rest = rest.trim_start_matches([':', ' ', '\t']);
            if let Some(value) = parse_leading_number(rest) {
                return Some(value);
            }
        }
    }
    None
}

fn parse_leading_number(text: &str) -> Option<f64> {
    let token: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    token.parse().ok().filter(|v: &f64| v.is_finite())
}
