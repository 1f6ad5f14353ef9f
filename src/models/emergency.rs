use serde::{Deserialize, Serialize};

use super::{Doctor, FamilyMember};

/// Editable view-model behind one emergency card generation.
///
/// Prefilled from the member record, then adjusted by the user. Lives only
/// for the duration of a generation request and is never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyCardData {
    pub blood_group: String,
    pub allergies: String,
    pub ongoing_medicines: String,
    /// Past medical history. Embedded into the timeline link when present.
    pub medical_conditions: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub doctor_name: String,
    pub doctor_phone: String,
}

impl EmergencyCardData {
    pub fn from_member(member: &FamilyMember) -> Self {
        Self {
            blood_group: member.blood_group.clone().unwrap_or_default(),
            allergies: member.allergies.clone().unwrap_or_default(),
            emergency_contact_name: member.emergency_contact_name.clone().unwrap_or_default(),
            emergency_contact_phone: member.emergency_contact_phone.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Fill the doctor fields from a directory entry, unless the user
    /// already typed a doctor name.
    pub fn with_primary_doctor(mut self, doctor: Option<&Doctor>) -> Self {
        if let Some(doctor) = doctor {
            if self.doctor_name.trim().is_empty() {
                self.doctor_name = doctor.name.clone();
                self.doctor_phone = doctor.phone.clone().unwrap_or_default();
            }
        }
        self
    }

    /// Trimmed past medical history, `None` when blank.
    pub fn medical_history(&self) -> Option<&str> {
        let trimmed = self.medical_conditions.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
