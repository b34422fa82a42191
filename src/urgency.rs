use chrono::NaiveDate;

pub const URGENT_THRESHOLD_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Urgent,
    Normal,
}

pub fn classify(days_remaining: i64) -> Urgency {
    if days_remaining <= URGENT_THRESHOLD_DAYS {
        Urgency::Urgent
    } else {
        Urgency::Normal
    }
}

pub fn is_urgent(days_remaining: i64) -> bool {
    classify(days_remaining) == Urgency::Urgent
}

/// Whole calendar days from `today` until `deadline`; negative once passed.
pub fn days_remaining(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

pub fn deadline_label(days_remaining: i64) -> String {
    match days_remaining {
        d if d < 0 => "Deadline passed".to_string(),
        0 => "Today!".to_string(),
        1 => "Tomorrow!".to_string(),
        d => format!("{} days left", d),
    }
}
