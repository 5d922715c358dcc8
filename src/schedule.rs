use serde::{Deserialize, Serialize};

/// One time-labeled task slot in a plan's daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub time: String,
    pub task: String,
    #[serde(default)]
    pub completed: bool,
}

pub const DEFAULT_TIME_LABEL: &str = "12:00 PM";

const MINUTES_PER_DAY: u32 = 24 * 60;
const NEIGHBOR_GAP_MINUTES: u32 = 30;

/// Parse a 12-hour clock label ("H:MM AM|PM") to minutes since midnight.
///
/// Hour 12 maps to 0 before the PM offset, so "12:00 AM" is minute 0 and
/// "12:00 PM" is minute 720. Returns `None` for anything that does not match
/// the label form; callers reject such input instead of letting it poison
/// the sort order.
pub fn parse_time_label(label: &str) -> Option<u32> {
    let mut parts = label.split_whitespace();
    let clock = parts.next()?;
    let marker = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let pm = if marker.eq_ignore_ascii_case("AM") {
        false
    } else if marker.eq_ignore_ascii_case("PM") {
        true
    } else {
        return None;
    };

    let (h, m) = clock.split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let hour = if hour == 12 { 0 } else { hour };
    Some(hour * 60 + minute + if pm { 12 * 60 } else { 0 })
}

/// Inverse of `parse_time_label`; hour 0 renders as 12.
pub fn format_minutes(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    let marker = if minutes >= 12 * 60 { "PM" } else { "AM" };
    let hour = (minutes / 60) % 12;
    let hour = if hour == 0 { 12 } else { hour };
    format!("{}:{:02} {}", hour, minutes % 60, marker)
}

/// Index of the first slot whose time label does not parse, if any.
pub fn first_invalid_label(slots: &[Slot]) -> Option<usize> {
    slots
        .iter()
        .position(|s| parse_time_label(&s.time).is_none())
}

/// Stable sort by parsed time. Duplicate times keep their relative order;
/// unparseable labels sort last (callers validate before reaching here).
pub fn normalize(slots: &mut [Slot]) {
    slots.sort_by_key(|s| parse_time_label(&s.time).unwrap_or(MINUTES_PER_DAY));
}

/// Append a new slot (default label when none given) and re-sort.
pub fn add_slot(slots: &mut Vec<Slot>, task: String, time: Option<String>) {
    slots.push(Slot {
        time: time.unwrap_or_else(|| DEFAULT_TIME_LABEL.to_string()),
        task,
        completed: false,
    });
    normalize(slots);
}

/// Manual time edit: replace one label, then re-sort. Returns false when the
/// index is out of range or the label is malformed.
pub fn retime_slot(slots: &mut [Slot], index: usize, time: &str) -> bool {
    if parse_time_label(time).is_none() {
        return false;
    }
    let Some(slot) = slots.get_mut(index) else {
        return false;
    };
    slot.time = time.to_string();
    normalize(slots);
    true
}

/// Drag reorder: move a slot to a new position and recompute its time from
/// the new neighbors, then re-sort the whole list.
///
/// - both neighbors: integer midpoint of their minute values
/// - only a previous neighbor: previous + 30, capped at 11:59 PM
/// - only a next neighbor: next - 30, floored at 12:00 AM
///
/// Time is a same-day-only quantity here: the arithmetic never wraps across
/// midnight, and the final sort is authoritative, so a midpoint that falls
/// outside the neighbor bracket still ends up in true time order rather
/// than at the drag position.
pub fn move_slot(slots: &mut [Slot], from: usize, to: usize) -> bool {
    if from >= slots.len() || to >= slots.len() {
        return false;
    }
    if from != to {
        // Rotate the moved slot into place, preserving sibling order.
        if from < to {
            slots[from..=to].rotate_left(1);
        } else {
            slots[to..=from].rotate_right(1);
        }
    }

    let prev = to
        .checked_sub(1)
        .and_then(|i| slots.get(i))
        .and_then(|s| parse_time_label(&s.time));
    let next = slots.get(to + 1).and_then(|s| parse_time_label(&s.time));

    let new_minutes = match (prev, next) {
        (Some(p), Some(n)) => Some((p + n) / 2),
        (Some(p), None) => Some((p + NEIGHBOR_GAP_MINUTES).min(MINUTES_PER_DAY - 1)),
        (None, Some(n)) => Some(n.saturating_sub(NEIGHBOR_GAP_MINUTES)),
        (None, None) => None,
    };
    if let Some(m) = new_minutes {
        slots[to].time = format_minutes(m);
    }

    normalize(slots);
    true
}

/// Remove a slot. Relative order of the rest is unchanged; no re-sort needed.
pub fn remove_slot(slots: &mut Vec<Slot>, index: usize) -> bool {
    if index >= slots.len() {
        return false;
    }
    slots.remove(index);
    true
}

/// Flip the display-only completion flag.
pub fn toggle_completed(slots: &mut [Slot], index: usize) -> bool {
    let Some(slot) = slots.get_mut(index) else {
        return false;
    };
    slot.completed = !slot.completed;
    true
}
