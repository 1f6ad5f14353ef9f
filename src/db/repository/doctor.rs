use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::member::parse_datetime;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, family_member_id, doctor_name, specialization, phone, email,
         hospital_name, address, visiting_hours, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doctor.id.to_string(),
            doctor.member_id.as_str(),
            doctor.name,
            doctor.specialization,
            doctor.phone,
            doctor.email,
            doctor.hospital_name,
            doctor.address,
            doctor.visiting_hours,
            doctor.notes,
            doctor.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

/// Doctors of one member, oldest entry first. The first one is treated as
/// the primary doctor when prefilling an emergency card.
pub fn list_doctors_for_member(
    conn: &Connection,
    member_id: &MemberId,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, family_member_id, doctor_name, specialization, phone, email,
                hospital_name, address, visiting_hours, notes, created_at
         FROM doctors WHERE family_member_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![member_id.as_str()], doctor_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    let id: String = row.get(0)?;
    let member_id: String = row.get(1)?;
    let created_at: String = row.get(10)?;

    Ok(Doctor {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        member_id: MemberId::new(member_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        name: row.get(2)?,
        specialization: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        hospital_name: row.get(6)?,
        address: row.get(7)?,
        visiting_hours: row.get(8)?,
        notes: row.get(9)?,
        created_at: parse_datetime(&created_at),
    })
}
