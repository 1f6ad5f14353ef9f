use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Opaque member identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyMemberId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MemberId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

/// A person tracked under an account: the account holder or a relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: MemberId,
    /// Owning account. Reads are always scoped to it.
    pub account_id: String,
    pub name: String,
    pub relation: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub is_account_head: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FamilyMember {
    /// Minimal member with only the required fields set.
    pub fn new(account_id: &str, name: &str, relation: &str) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: MemberId::generate(),
            account_id: account_id.to_string(),
            name: name.to_string(),
            relation: relation.to_string(),
            age: None,
            gender: None,
            phone: None,
            email: None,
            blood_group: None,
            allergies: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            is_account_head: false,
            created_at: now,
            updated_at: now,
        }
    }
}
