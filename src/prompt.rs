//! Prompt construction for the LLM relay. Pure string templates; every
//! network-bound handler builds its prompt here so the wording stays in one
//! place and can be locked by tests.

use crate::schedule::Slot;

/// Roadmap generation prompt. The JSON shape listed here is the contract the
/// response sanitizer in `model` enforces.
pub fn plan_generation(
    aim: &str,
    category: &str,
    difficulty: &str,
    due_date: &str,
    today: &str,
) -> String {
    format!(
        r#"Act as an expert strategist. Today's date is {today}.
Goal: "{aim}". Target Date: {due_date}. Difficulty: {difficulty}. Category: {category}.

CRITICAL INSTRUCTIONS:
1. CATEGORY CHECK: If "{aim}" is unrelated to "{category}" (e.g. "Cooking" in "Fitness"), populate the "categoryMismatch" field with a polite message.
2. TIMELINE CHECK: If the time between {today} and {due_date} is too short to realistically achieve the goal, populate the "warning" field.
3. DATE ENFORCEMENT: All phase dates must be between {today} and {due_date}.
4. COMPLETE TASK: Even if there is a mismatch, STILL generate the full roadmap.

Return ONLY a JSON object:
{{
  "warning": "Timeline warning or null",
  "categoryMismatch": "Mismatch message or null",
  "title": "Title",
  "description": "Short overview",
  "phases": [{{"name": "Phase 1", "date": "Month/Year", "desc": "Details"}}],
  "habits": ["Habit 1", "Habit 2", "Habit 3", "Habit 4", "Habit 5"],
  "hurdles": [{{"issue": "Challenge", "sol": "Solution"}}],
  "resources": [{{"type": "BOOK", "price": "Free", "name": "Resource Name", "desc": "Description"}}]
}}"#
    )
}

/// Goal-autopsy prompt. The embedded context block uses the same format the
/// local classifier parses, so the LLM path and the fallback path see
/// identical evidence.
pub fn goal_autopsy(user_message: &str, context: &str) -> String {
    format!(
        r#"You are Straxian's Goal Autopsy system. You are an execution auditor, not a therapist.

User message: "{user_message}"

Progress context:
{context}

You must follow this exact process:

1. If missing data, ask for ONLY factual inputs in one compact message:
   - Planned tasks (last 7 days)
   - Tasks actually completed
   - Time allocated vs time spent
   - User's stated constraints

2. Classify failure into exactly ONE primary cause:
   - Overplanning
   - Underestimation
   - Inconsistency
   - Context overload
   - Distraction leakage
   - Priority inversion
   - Constraint violation

3. Provide evidence-based diagnosis:
   Primary cause: [cause]
   Evidence:
   - [specific data point]
   - [specific data point]

4. Give one brutally honest conclusion sentence.

5. Propose exactly 3 corrections from:
   - Reduce daily workload (by %)
   - Remove or pause one goal
   - Change time blocks
   - Reorder task priority
   - Increase buffer time
   - Convert outcome goals to process goals

NO motivational quotes. NO "you can do it". Be direct and factual."#
    )
}

/// Adapted-timetable prompt (struggling user asks for a realistic reshuffle).
pub fn adapted_timetable(
    goal_title: &str,
    slots: &[Slot],
    completion_rate: f64,
    missed_days: usize,
    problem: &str,
) -> String {
    let current: String = slots
        .iter()
        .map(|s| format!("{} - {}", s.time, s.task))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You are an AI coach. The user is struggling with their goal: "{goal_title}"

CURRENT TIMETABLE:
{current}

PROGRESS ANALYSIS:
- Completion Rate: {completion_rate:.1}%
- Missed Days: {missed_days}

USER'S PROBLEM: "{problem}"

Based on their specific problem, adapt the timetable to be more realistic and achievable. Address their exact issue.

Return ONLY a JSON object:
{{
  "timetable": [{{"time": "08:00 AM", "task": "Adapted Activity"}}],
  "explanation": "How this addresses your specific problem"
}}"#
    )
}

/// Workspace assistant prompt (generate / summarize / rewrite / search).
pub fn assistant(context: &str, message: &str) -> String {
    format!(
        r#"You are an AI assistant that helps with content generation, summarization, rewriting, and searching. You have access to the user's chat history and plans.

User's Chat Context:
{context}

User Request: "{message}"

Provide a helpful response. If the user asks to edit, modify, or change anything, politely redirect them to go to the specific chat for changes. Keep responses concise and helpful."#
    )
}

const EDIT_KEYWORDS: [&str; 9] = [
    "edit", "change", "modify", "update", "delete", "remove", "add to", "adjust", "fix",
];

pub const ASSISTANT_EDIT_REFUSAL: &str = "I can't edit or change your plans directly. Please go to the specific chat where you want to make changes. I can only help with generating content, summarizing, rewriting text, and searching through your workspace.";

/// Assistant guard: edit-style requests are refused before any network call.
pub fn is_edit_request(message: &str) -> bool {
    let lower = message.to_lowercase();
    EDIT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Progress context block shared by the autopsy prompt and the classifier:
/// "Execution Rate: NN%" plus a tagged list of the recent day statuses.
pub fn progress_context(execution_rate: f64, recent: &[(String, String)]) -> String {
    let days: String = recent
        .iter()
        .map(|(day, status)| format!("{} {}", day, status))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Execution Rate: {:.1}%\nRecent {} days: {}",
        execution_rate,
        recent.len(),
        days
    )
}
