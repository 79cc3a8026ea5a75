use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        decode_tags, encode_tags, format_datetime, parse_datetime, parse_lead_status,
        parse_optional_datetime, parse_priority, parse_source,
    },
    models::{Lead, LeadPatch, LeadStatus},
};

const LEAD_COLUMNS: &str = "id, name, email, phone, company, position, source, status, priority, value, notes, tags, created_at, updated_at, last_contacted_at, next_follow_up_at";

fn row_to_lead(row: &Row) -> Result<Lead> {
    let source: String = row.get("source")?;
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let tags: Option<String> = row.get("tags")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_contacted_at: Option<String> = row.get("last_contacted_at")?;
    let next_follow_up_at: Option<String> = row.get("next_follow_up_at")?;

    Ok(Lead {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        company: row.get("company")?,
        position: row.get("position")?,
        source: parse_source(&source)?,
        status: parse_lead_status(&status)?,
        priority: parse_priority(&priority)?,
        value: row.get("value")?,
        notes: row.get("notes")?,
        tags: decode_tags(tags)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
        last_contacted_at: parse_optional_datetime(last_contacted_at, "last_contacted_at")?,
        next_follow_up_at: parse_optional_datetime(next_follow_up_at, "next_follow_up_at")?,
    })
}

fn collect_leads(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<Lead>> {
    let mut leads = Vec::new();
    while let Some(row) = rows.next()? {
        leads.push(row_to_lead(row)?);
    }
    Ok(leads)
}

impl Database {
    pub async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        let record = lead.clone();
        self.execute(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO leads ({LEAD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    record.id,
                    record.name,
                    record.email,
                    record.phone,
                    record.company,
                    record.position,
                    record.source.as_str(),
                    record.status.as_str(),
                    record.priority.as_str(),
                    record.value,
                    record.notes,
                    encode_tags(&record.tags)?,
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                    record.last_contacted_at.as_ref().map(format_datetime),
                    record.next_follow_up_at.as_ref().map(format_datetime),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All leads, newest first.
    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC"
            ))?;
            let mut rows = stmt.query([])?;
            collect_leads(&mut rows)
        })
        .await
    }

    pub async fn list_leads_paginated(&self, limit: usize, offset: usize) -> Result<Vec<Lead>> {
        let limit = limit as i64;
        let offset = offset as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 ORDER BY created_at DESC
                 LIMIT ?1 OFFSET ?2"
            ))?;
            let mut rows = stmt.query(params![limit, offset])?;
            collect_leads(&mut rows)
        })
        .await
    }

    pub async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        let lead_id = lead_id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"))?;
            let mut rows = stmt.query(params![lead_id])?;
            let lead = match rows.next()? {
                Some(row) => Some(row_to_lead(row)?),
                None => None,
            };
            Ok(lead)
        })
        .await
    }

    /// Writes the `Some` fields of `patch` and bumps `updated_at`.
    pub async fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> Result<()> {
        let lead_id = lead_id.to_string();
        let patch = patch.clone();
        self.execute(move |conn| {
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(at) = patch.last_contacted_at {
                updates.push("last_contacted_at = ?");
                params_vec.push(Box::new(format_datetime(&at)));
            }
            if let Some(status) = patch.status {
                updates.push("status = ?");
                params_vec.push(Box::new(status.as_str()));
            }
            if let Some(notes) = patch.notes {
                updates.push("notes = ?");
                params_vec.push(Box::new(notes));
            }
            if let Some(tags) = patch.tags {
                updates.push("tags = ?");
                params_vec.push(Box::new(encode_tags(&tags)?));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(format_datetime(&Utc::now())));

            let query = format!("UPDATE leads SET {} WHERE id = ?", updates.join(", "));
            params_vec.push(Box::new(lead_id));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = conn.execute(&query, params_refs.as_slice())?;
            if rows_affected == 0 {
                return Err(anyhow!("Lead not found"));
            }

            Ok(())
        })
        .await
    }

    /// Delete a lead together with its call history.
    pub async fn delete_lead(&self, lead_id: &str) -> Result<()> {
        let lead_id = lead_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM call_logs WHERE lead_id = ?1", params![lead_id])?;
            let rows_affected = tx.execute("DELETE FROM leads WHERE id = ?1", params![lead_id])?;
            if rows_affected == 0 {
                return Err(anyhow!("Lead not found"));
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Case-insensitive substring search over name, company, phone, email and notes.
    pub async fn search_leads(&self, query: &str) -> Result<Vec<Lead>> {
        let needle = query.to_lowercase();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE instr(lower(name), ?1) > 0
                    OR instr(lower(coalesce(company, '')), ?1) > 0
                    OR instr(lower(coalesce(phone, '')), ?1) > 0
                    OR instr(lower(coalesce(email, '')), ?1) > 0
                    OR instr(lower(coalesce(notes, '')), ?1) > 0
                 ORDER BY created_at DESC"
            ))?;
            let mut rows = stmt.query(params![needle])?;
            collect_leads(&mut rows)
        })
        .await
    }

    pub async fn list_leads_by_status(&self, status: LeadStatus) -> Result<Vec<Lead>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads WHERE status = ?1 ORDER BY created_at DESC"
            ))?;
            let mut rows = stmt.query(params![status.as_str()])?;
            collect_leads(&mut rows)
        })
        .await
    }
}
