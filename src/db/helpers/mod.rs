use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::{CallStatus, CallType, LeadPriority, LeadSource, LeadStatus};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width UTC timestamps so `ORDER BY` on the TEXT column is chronological.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_lead_status(value: &str) -> Result<LeadStatus> {
    match value {
        "new" => Ok(LeadStatus::New),
        "contacted" => Ok(LeadStatus::Contacted),
        "qualified" => Ok(LeadStatus::Qualified),
        "proposal" => Ok(LeadStatus::Proposal),
        "closed_won" => Ok(LeadStatus::ClosedWon),
        "closed_lost" => Ok(LeadStatus::ClosedLost),
        other => Err(anyhow!("unknown lead status {other}")),
    }
}

pub fn parse_priority(value: &str) -> Result<LeadPriority> {
    match value {
        "low" => Ok(LeadPriority::Low),
        "medium" => Ok(LeadPriority::Medium),
        "high" => Ok(LeadPriority::High),
        "urgent" => Ok(LeadPriority::Urgent),
        other => Err(anyhow!("unknown lead priority {other}")),
    }
}

pub fn parse_source(value: &str) -> Result<LeadSource> {
    match value {
        "website" => Ok(LeadSource::Website),
        "social_media" => Ok(LeadSource::SocialMedia),
        "referral" => Ok(LeadSource::Referral),
        "cold_call" => Ok(LeadSource::ColdCall),
        "email_campaign" => Ok(LeadSource::EmailCampaign),
        "trade_show" => Ok(LeadSource::TradeShow),
        "advertising" => Ok(LeadSource::Advertising),
        "phone_call" => Ok(LeadSource::PhoneCall),
        "other" => Ok(LeadSource::Other),
        other => Err(anyhow!("unknown lead source {other}")),
    }
}

pub fn parse_call_type(value: &str) -> Result<CallType> {
    match value {
        "incoming" => Ok(CallType::Incoming),
        "outgoing" => Ok(CallType::Outgoing),
        "missed" => Ok(CallType::Missed),
        other => Err(anyhow!("unknown call type {other}")),
    }
}

pub fn parse_call_status(value: &str) -> Result<CallStatus> {
    match value {
        "completed" => Ok(CallStatus::Completed),
        "no_answer" => Ok(CallStatus::NoAnswer),
        "busy" => Ok(CallStatus::Busy),
        "failed" => Ok(CallStatus::Failed),
        other => Err(anyhow!("unknown call status {other}")),
    }
}

/// Tags are stored as a JSON array in a TEXT column.
pub fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).context("failed to encode tags")
}

pub fn decode_tags(raw: Option<String>) -> Result<Vec<String>> {
    match raw {
        Some(text) if !text.is_empty() => {
            serde_json::from_str(&text).context("failed to decode tags")
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parsers_accept_their_own_spelling() {
        for status in [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Qualified,
            LeadStatus::Proposal,
            LeadStatus::ClosedWon,
            LeadStatus::ClosedLost,
        ] {
            assert_eq!(parse_lead_status(status.as_str()).unwrap(), status);
        }
        assert_eq!(parse_source("phone_call").unwrap(), LeadSource::PhoneCall);
        assert_eq!(parse_call_status("no_answer").unwrap(), CallStatus::NoAnswer);
        assert!(parse_priority("critical").is_err());
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let earlier = parse_datetime("2024-03-01T10:00:00Z", "t").unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        assert!(format_datetime(&earlier) < format_datetime(&later));
        assert_eq!(
            parse_datetime(&format_datetime(&later), "t").unwrap(),
            later
        );
    }

    #[test]
    fn negative_integers_are_rejected() {
        assert!(to_u64(-1, "duration_secs").is_err());
        assert_eq!(to_u64(42, "duration_secs").unwrap(), 42);
    }

    #[test]
    fn missing_tags_decode_to_empty() {
        assert!(decode_tags(None).unwrap().is_empty());
        assert!(decode_tags(Some(String::new())).unwrap().is_empty());
        let tags = decode_tags(Some(encode_tags(&["Phone Call".into()]).unwrap())).unwrap();
        assert_eq!(tags, vec!["Phone Call".to_string()]);
    }
}
