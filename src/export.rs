//! Presentation transforms for a plan document: a section view-model the UI
//! renders (and feeds to its PDF printer), and the plain-text rendering used
//! by the file export.

use serde_json::json;

use crate::model::PlanDoc;

/// Section view-model: every block the result page shows, in display order.
/// Pure data, so the timetable and roadmap content can be checked without a
/// renderer.
pub fn plan_model(doc: &PlanDoc) -> serde_json::Value {
    json!({
        "overview": {
            "title": doc.title,
            "description": doc.description,
            "warning": doc.warning,
            "categoryMismatch": doc.category_mismatch,
            "tone": if doc.warning.is_some() { "AMBITIOUS" } else { "REALISTIC" },
        },
        "milestones": doc.phases.iter().enumerate().map(|(i, p)| json!({
            "number": i + 1,
            "name": p.name,
            "date": p.date,
            "desc": p.desc,
        })).collect::<Vec<_>>(),
        "habits": doc.habits,
        "timetable": doc.timetable,
        "hurdles": doc.hurdles.iter().map(|h| json!({
            "issue": h.issue,
            "sol": h.sol,
        })).collect::<Vec<_>>(),
        "resources": doc.resources.iter().map(|r| json!({
            "type": r.kind,
            "price": r.price,
            "name": r.name,
            "desc": r.desc,
            "link": r.link,
        })).collect::<Vec<_>>(),
    })
}

/// Plain-text export of the full roadmap.
pub fn plan_text(doc: &PlanDoc) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n{}\n\n", doc.title, "=".repeat(doc.title.len())));
    if !doc.description.is_empty() {
        out.push_str(&format!("{}\n\n", doc.description));
    }
    if let Some(w) = &doc.warning {
        out.push_str(&format!("Timeline warning: {}\n\n", w));
    }
    if let Some(m) = &doc.category_mismatch {
        out.push_str(&format!("Category note: {}\n\n", m));
    }

    if !doc.phases.is_empty() {
        out.push_str("Strategic Milestones\n--------------------\n");
        for (i, p) in doc.phases.iter().enumerate() {
            out.push_str(&format!("{}. {} ({})\n   {}\n", i + 1, p.name, p.date, p.desc));
        }
        out.push('\n');
    }

    if !doc.habits.is_empty() {
        out.push_str("Daily Habits\n------------\n");
        for h in &doc.habits {
            out.push_str(&format!("- {}\n", h));
        }
        out.push('\n');
    }

    if !doc.timetable.is_empty() {
        out.push_str("Daily Timetable\n---------------\n");
        for s in &doc.timetable {
            let mark = if s.completed { "[x]" } else { "[ ]" };
            out.push_str(&format!("{} {} - {}\n", mark, s.time, s.task));
        }
        out.push('\n');
    }

    if !doc.hurdles.is_empty() {
        out.push_str("Common Hurdles\n--------------\n");
        for h in &doc.hurdles {
            out.push_str(&format!("\"{}\"\n   Solution: {}\n", h.issue, h.sol));
        }
        out.push('\n');
    }

    if !doc.resources.is_empty() {
        out.push_str("Curated Resources\n-----------------\n");
        for r in &doc.resources {
            out.push_str(&format!("[{} | {}] {}", r.kind, r.price, r.name));
            if !r.desc.is_empty() {
                out.push_str(&format!(" - {}", r.desc));
            }
            if let Some(link) = &r.link {
                out.push_str(&format!(" ({})", link));
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Phase, PlanDoc};
    use crate::schedule::Slot;

    fn sample_doc() -> PlanDoc {
        PlanDoc {
            title: "Learn Rust".to_string(),
            description: "Ship a real project".to_string(),
            warning: Some("Tight timeline".to_string()),
            category_mismatch: None,
            phases: vec![Phase {
                name: "Basics".to_string(),
                date: "September/2026".to_string(),
                desc: "Ownership and borrowing".to_string(),
            }],
            habits: vec!["Read one chapter".to_string()],
            hurdles: vec![],
            resources: vec![],
            timetable: vec![Slot {
                time: "7:00 AM".to_string(),
                task: "Exercises".to_string(),
                completed: true,
            }],
        }
    }

    #[test]
    fn model_flags_ambitious_tone_on_warning() {
        let model = plan_model(&sample_doc());
        assert_eq!(model["overview"]["tone"], "AMBITIOUS");
        assert_eq!(model["milestones"][0]["number"], 1);
    }

    #[test]
    fn text_export_includes_every_populated_section() {
        let text = plan_text(&sample_doc());
        assert!(text.contains("Learn Rust"));
        assert!(text.contains("Timeline warning: Tight timeline"));
        assert!(text.contains("Strategic Milestones"));
        assert!(text.contains("[x] 7:00 AM - Exercises"));
        assert!(!text.contains("Common Hurdles"));
    }
}
