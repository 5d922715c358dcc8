//! Typed plan documents and the parse/validate boundary for LLM output.
//! Everything the relay returns passes through here before it can be stored;
//! malformed documents are rejected instead of trusted.

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::schedule::{self, Slot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    pub date: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hurdle {
    pub issue: String,
    pub sol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub price: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// The structured roadmap document. Advisory fields (`warning`,
/// `categoryMismatch`) stay optional; list sections default to empty so a
/// terse model response still yields a usable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDoc {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_mismatch: Option<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub habits: Vec<String>,
    #[serde(default)]
    pub hurdles: Vec<Hurdle>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub timetable: Vec<Slot>,
}

/// Deserialize and sanitize a plan document from untrusted JSON (LLM output
/// or caller payloads).
///
/// The model sometimes emits the literal string "null" for advisory fields
/// and unparseable time labels; both are normalized here rather than stored.
pub fn parse_plan_doc(value: serde_json::Value) -> anyhow::Result<PlanDoc> {
    let mut doc: PlanDoc = serde_json::from_value(value)
        .map_err(|e| anyhow!("model returned an invalid plan document: {}", e))?;

    doc.title = doc.title.trim().to_string();
    if doc.title.is_empty() {
        bail!("model returned a plan without a title");
    }
    doc.warning = normalize_advisory(doc.warning);
    doc.category_mismatch = normalize_advisory(doc.category_mismatch);
    doc.habits.retain(|h| !h.trim().is_empty());

    sanitize_timetable(&mut doc.timetable)?;
    Ok(doc)
}

/// Validate timetable slots from any untrusted source (LLM or caller),
/// then normalize into time order.
pub fn sanitize_timetable(slots: &mut Vec<Slot>) -> anyhow::Result<()> {
    slots.retain(|s| !s.task.trim().is_empty());
    if let Some(i) = schedule::first_invalid_label(slots) {
        bail!("invalid time label {:?} at slot {}", slots[i].time, i);
    }
    schedule::normalize(slots);
    Ok(())
}

/// Slots from raw JSON, validated and normalized. Used by whole-list saves
/// and by the adapted-timetable ingestion.
pub fn slots_from_value(value: serde_json::Value) -> anyhow::Result<Vec<Slot>> {
    let mut slots: Vec<Slot> = serde_json::from_value(value)
        .map_err(|e| anyhow!("invalid timetable payload: {}", e))?;
    sanitize_timetable(&mut slots)?;
    Ok(slots)
}

fn normalize_advisory(v: Option<String>) -> Option<String> {
    let v = v?;
    let t = v.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("null") || t.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(t.to_string())
    }
}
