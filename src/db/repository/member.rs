use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MEMBER_COLUMNS: &str = "id, user_id, name, relation, age, gender, phone, email, blood_group,
     allergies, emergency_contact_name, emergency_contact_phone, is_account_head,
     created_at, updated_at";

pub fn insert_family_member(conn: &Connection, member: &FamilyMember) -> Result<(), DatabaseError> {
    if member.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "Member name is required".into(),
        ));
    }
    conn.execute(
        "INSERT INTO family_members (id, user_id, name, relation, age, gender, phone, email,
         blood_group, allergies, emergency_contact_name, emergency_contact_phone,
         is_account_head, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            member.id.as_str(),
            member.account_id,
            member.name,
            member.relation,
            member.age,
            member.gender,
            member.phone,
            member.email,
            member.blood_group,
            member.allergies,
            member.emergency_contact_name,
            member.emergency_contact_phone,
            member.is_account_head as i32,
            member.created_at.format(DATETIME_FORMAT).to_string(),
            member.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    tracing::debug!(member_id = %member.id, "Family member inserted");
    Ok(())
}

/// Fetch one member, scoped to the owning account.
///
/// A member that exists under another account is reported as not found.
pub fn fetch_family_member(
    conn: &Connection,
    member_id: &MemberId,
    account_id: &str,
) -> Result<FamilyMember, DatabaseError> {
    let sql = format!("SELECT {MEMBER_COLUMNS} FROM family_members WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![member_id.as_str(), account_id], member_from_row)
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "FamilyMember".into(),
            id: member_id.to_string(),
        })
}

/// All members of an account, account head first, then by creation time.
pub fn list_family_members(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<FamilyMember>, DatabaseError> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM family_members WHERE user_id = ?1
         ORDER BY is_account_head DESC, created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_id], member_from_row)?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn delete_family_member(
    conn: &Connection,
    member_id: &MemberId,
    account_id: &str,
) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM family_members WHERE id = ?1 AND user_id = ?2",
        params![member_id.as_str(), account_id],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "FamilyMember".into(),
            id: member_id.to_string(),
        });
    }
    Ok(())
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<FamilyMember> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    let id = MemberId::new(id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(FamilyMember {
        id,
        account_id: row.get(1)?,
        name: row.get(2)?,
        relation: row.get(3)?,
        age: row.get(4)?,
        gender: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
        blood_group: row.get(8)?,
        allergies: row.get(9)?,
        emergency_contact_name: row.get(10)?,
        emergency_contact_phone: row.get(11)?,
        is_account_head: row.get::<_, i32>(12)? != 0,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

pub(crate) fn parse_datetime(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .unwrap_or_else(|_| chrono::Local::now().naive_local())
}
