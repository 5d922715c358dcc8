//! Local fallback for the goal-autopsy chat: when the LLM relay fails, a
//! fixed decision table classifies the failure cause from the same progress
//! context block the prompt embeds, so the user always gets a response.

/// Statistics pulled out of a progress context block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressStats {
    pub execution_rate: Option<f64>,
    pub completed: usize,
    pub missed: usize,
    pub not_started: usize,
}

/// Extract "Execution Rate: NN%" and the day-status tags from free text.
pub fn extract_stats(text: &str) -> ProgressStats {
    ProgressStats {
        execution_rate: extract_rate(text),
        completed: count_tag(text, "completed"),
        missed: count_tag(text, "missed"),
        not_started: count_tag(text, "not-started"),
    }
}

fn extract_rate(text: &str) -> Option<f64> {
    let idx = text.find("Execution Rate:")?;
    let rest = &text[idx + "Execution Rate:".len()..];
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn count_tag(text: &str, tag: &str) -> usize {
    // Token match so "not-started" never counts toward "started".
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '(' | ')' | '[' | ']'))
        .filter(|tok| tok.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-') == tag)
        .count()
}

/// One row of the classifier. The rows are configuration, not algorithm:
/// predicate, cause, conclusion, and exactly three corrective actions.
struct Rule {
    cause: &'static str,
    applies: fn(&ProgressStats) -> bool,
    evidence: fn(&ProgressStats) -> Vec<String>,
    conclusion: &'static str,
    corrections: [&'static str; 3],
}

// Evaluated top to bottom; first matching row wins. The last row always
// applies.
static RULES: [Rule; 4] = [
    Rule {
        cause: "Overplanning",
        applies: |s| s.execution_rate.is_some_and(|r| r < 30.0),
        evidence: |s| {
            vec![
                format!(
                    "Execution rate is {:.1}%, far below a sustainable load",
                    s.execution_rate.unwrap_or(0.0)
                ),
                format!(
                    "{} of the recent days produced no completed work",
                    s.missed + s.not_started
                ),
            ]
        },
        conclusion: "You planned more than you can execute; the schedule is the failure, not the effort.",
        corrections: [
            "Reduce daily workload (by 40%)",
            "Remove or pause one goal",
            "Increase buffer time",
        ],
    },
    Rule {
        cause: "Inconsistency",
        applies: |s| s.missed > s.completed,
        evidence: |s| {
            vec![
                format!(
                    "Missed days ({}) outnumber completed days ({})",
                    s.missed, s.completed
                ),
                format!(
                    "Execution rate sits at {:.1}% despite a workable plan size",
                    s.execution_rate.unwrap_or(0.0)
                ),
            ]
        },
        conclusion: "You start and stop; the plan only works on days you show up.",
        corrections: [
            "Change time blocks",
            "Reduce daily workload (by 20%)",
            "Increase buffer time",
        ],
    },
    Rule {
        cause: "Priority inversion",
        applies: |s| s.not_started > 3,
        evidence: |s| {
            vec![
                format!(
                    "{} recent days were never started at all",
                    s.not_started
                ),
                format!(
                    "Completed ({}) and missed ({}) days show the time existed for other things",
                    s.completed, s.missed
                ),
            ]
        },
        conclusion: "The goal loses every scheduling conflict; it is not actually your priority.",
        corrections: [
            "Reorder task priority",
            "Remove or pause one goal",
            "Change time blocks",
        ],
    },
    Rule {
        cause: "Underestimation",
        applies: |_| true,
        evidence: |s| {
            vec![
                format!(
                    "Execution rate of {:.1}% with {} completed vs {} missed days",
                    s.execution_rate.unwrap_or(0.0),
                    s.completed,
                    s.missed
                ),
                "Slots are attempted but not finished inside their allocated time".to_string(),
            ]
        },
        conclusion: "Your tasks take longer than the time you give them; the estimates are fiction.",
        corrections: [
            "Increase buffer time",
            "Convert outcome goals to process goals",
            "Reduce daily workload (by 10%)",
        ],
    },
];

/// Cause label the decision table selects for the given context text.
pub fn classify(context: &str) -> &'static str {
    let stats = extract_stats(context);
    matching_rule(&stats).cause
}

fn matching_rule(stats: &ProgressStats) -> &'static Rule {
    RULES
        .iter()
        .find(|r| (r.applies)(stats))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Render the full multi-section autopsy report for a context block.
pub fn report(context: &str) -> String {
    let stats = extract_stats(context);
    let rule = matching_rule(&stats);

    let mut out = String::new();
    out.push_str(&format!("Primary cause: {}\n\n", rule.cause));
    out.push_str("Evidence:\n");
    for line in (rule.evidence)(&stats) {
        out.push_str(&format!("- {}\n", line));
    }
    out.push_str(&format!("\nConclusion: {}\n\n", rule.conclusion));
    out.push_str("Corrections:\n");
    for (i, c) in rule.corrections.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, c));
    }
    out
}
