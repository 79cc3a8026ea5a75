use anyhow::Result;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_call_status, parse_call_type, parse_datetime, to_i64, to_u64},
    models::{CallLogEntry, Lead},
};

fn row_to_call_log(row: &Row) -> Result<CallLogEntry> {
    let call_type: String = row.get("call_type")?;
    let call_status: String = row.get("call_status")?;
    let duration_secs: i64 = row.get("duration_secs")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;

    Ok(CallLogEntry {
        id: row.get("id")?,
        lead_id: row.get("lead_id")?,
        phone_number: row.get("phone_number")?,
        call_type: parse_call_type(&call_type)?,
        call_status: parse_call_status(&call_status)?,
        duration_secs: to_u64(duration_secs, "duration_secs")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        notes: row.get("notes")?,
    })
}

/// Everything the user owns, in one serializable bundle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub leads: Vec<Lead>,
    pub call_logs: Vec<CallLogEntry>,
}

impl Database {
    pub async fn insert_call_log(&self, entry: &CallLogEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO call_logs (id, lead_id, phone_number, call_type, call_status, duration_secs, started_at, ended_at, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.lead_id,
                    record.phone_number,
                    record.call_type.as_str(),
                    record.call_status.as_str(),
                    to_i64(record.duration_secs)?,
                    format_datetime(&record.started_at),
                    format_datetime(&record.ended_at),
                    record.notes,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Call history newest first, optionally narrowed to one lead.
    pub async fn list_call_logs(&self, lead_id: Option<&str>) -> Result<Vec<CallLogEntry>> {
        let lead_id = lead_id.map(str::to_string);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lead_id, phone_number, call_type, call_status, duration_secs, started_at, ended_at, notes
                 FROM call_logs
                 WHERE ?1 IS NULL OR lead_id = ?1
                 ORDER BY started_at DESC",
            )?;

            let mut rows = stmt.query(params![lead_id])?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_call_log(row)?);
            }

            Ok(logs)
        })
        .await
    }

    pub async fn export_data(&self) -> Result<DataExport> {
        let leads = self.list_leads().await?;
        let call_logs = self.list_call_logs(None).await?;
        Ok(DataExport { leads, call_logs })
    }
}
