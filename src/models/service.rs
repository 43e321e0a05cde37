use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}
