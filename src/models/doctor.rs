use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MemberId;

/// Doctor directory entry attached to one family member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub member_id: MemberId,
    pub name: String,
    pub specialization: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hospital_name: Option<String>,
    pub address: Option<String>,
    pub visiting_hours: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}
