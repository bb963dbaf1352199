use chrono::{ DateTime, Duration, Utc };

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Urgent,
    High,
    Normal,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Follow-ups shown beside the chat.
#[derive(Clone, Debug, Default)]
pub struct ActionItems {
    items: Vec<ActionItem>,
}

impl ActionItems {
    /// The starting set, dated relative to `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let item = |id: &str, title: &str, description: &str, priority, age: Duration| ActionItem {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            created_at: now - age,
        };
        Self {
            items: vec![
                item(
                    "1",
                    "Schedule Follow-up Appointment",
                    "Book a follow-up appointment to discuss your test results and treatment plan.",
                    Priority::High,
                    Duration::hours(1)
                ),
                item(
                    "2",
                    "Update Medication List",
                    "Please update your current medications in your health profile.",
                    Priority::Normal,
                    Duration::hours(2)
                ),
                item(
                    "3",
                    "Complete Health Questionnaire",
                    "Fill out the pre-visit questionnaire before your next appointment.",
                    Priority::Normal,
                    Duration::days(1)
                )
            ],
        }
    }

    pub fn items(&self) -> &[ActionItem] {
        &self.items
    }

    pub fn push(&mut self, item: ActionItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, id: &str) -> Option<ActionItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    /// Most pressing first, older first within a priority.
    pub fn by_priority(&self) -> Vec<&ActionItem> {
        let mut sorted: Vec<&ActionItem> = self.items.iter().collect();
        sorted.sort_by_key(|i| (i.priority, i.created_at));
        sorted
    }

    pub fn count_label(&self) -> String {
        match self.items.len() {
            1 => "1 item".to_string(),
            n => format!("{} items", n),
        }
    }
}

/// "5m ago" style age used on the action cards.
pub fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - then;
    if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        format!("{}m ago", age.num_minutes())
    } else if age < Duration::days(1) {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}
