use serde::{Deserialize, Serialize};

/// Start labels offered for every service, in display order.
pub const CANONICAL_SLOTS: [&str; 7] = [
    "9:00 AM", "10:00 AM", "11:00 AM", "1:00 PM", "2:00 PM", "3:00 PM", "4:00 PM",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub label: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TimeSlot {
    pub fn open(label: &str) -> Self {
        Self {
            label: label.to_string(),
            available: true,
            reason: None,
        }
    }

    pub fn blocked(label: &str, reason: String) -> Self {
        Self {
            label: label.to_string(),
            available: false,
            reason: Some(reason),
        }
    }
}
