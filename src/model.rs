use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::index::VisitIndex;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(VisitStatus::Scheduled),
            "completed" => Ok(VisitStatus::Completed),
            "cancelled" | "canceled" => Ok(VisitStatus::Cancelled),
            other => Err(format!("unknown visit status '{}'", other)),
        }
    }
}

/// A business visit to a hotel
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitRecord {
    /// Unique across both tiers; assigned on first save
    pub id: String,
    pub date: Option<NaiveDate>,
    /// Local wall-clock time, `HH:MM`
    pub time: Option<String>,
    /// Minutes
    pub duration: Option<u32>,
    pub hotel_id: Option<String>,
    pub hotel_name: Option<String>,
    pub purpose: Option<String>,
    pub status: Option<VisitStatus>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
    pub visit_summary: Option<String>,
    pub visit_outcome: Option<String>,
    pub visit_rating: Option<u8>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub archived: bool,
}

impl VisitRecord {
    /// The instant the tier policy ages this record from: the visit date at
    /// midnight UTC, falling back to the creation timestamp.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        match self.date {
            Some(date) => Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))),
            None => self.created_at,
        }
    }

    /// Bucket key for the date index
    pub fn date_key(&self) -> Option<String> {
        self.date
            .or_else(|| self.created_at.map(|ts| ts.date_naive()))
            .map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn days_since(&self, now: DateTime<Utc>) -> Option<f64> {
        self.reference_time()
            .map(|t| (now - t).num_milliseconds() as f64 / MILLIS_PER_DAY)
    }
}

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Archival encoding of a visit; short keys keep the archived tier small
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CompressedVisitRecord {
    pub id: String,
    #[serde(rename = "d")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "t")]
    pub time: Option<String>,
    #[serde(rename = "h")]
    pub hotel_id: Option<String>,
    #[serde(rename = "hn")]
    pub hotel_name: Option<String>,
    #[serde(rename = "p")]
    pub purpose: Option<String>,
    #[serde(rename = "s")]
    pub status: Option<VisitStatus>,
    #[serde(rename = "c")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "u")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "cp")]
    pub contact_person: Option<String>,
    #[serde(rename = "ce")]
    pub contact_email: Option<String>,
    #[serde(rename = "vs")]
    pub summary: String,
    #[serde(rename = "vo")]
    pub outcome: Option<String>,
    #[serde(rename = "vr")]
    pub rating: Option<u8>,
}

/// Input for scheduling a new visit
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub date: NaiveDate,
    pub time: Option<String>,
    pub duration: Option<u32>,
    pub hotel_id: String,
    pub hotel_name: Option<String>,
    pub purpose: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

impl NewVisit {
    pub fn into_record(self) -> VisitRecord {
        VisitRecord {
            date: Some(self.date),
            time: self.time,
            duration: self.duration,
            hotel_id: Some(self.hotel_id),
            hotel_name: self.hotel_name,
            purpose: self.purpose,
            status: Some(VisitStatus::Scheduled),
            contact_person: self.contact_person,
            contact_email: self.contact_email,
            notes: self.notes,
            ..Default::default()
        }
    }
}

/// Static reference data for a hotel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HotelRecord {
    pub id: String,
    pub name: String,
    pub area: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub revenue: f64,
    pub bookings: u32,
    pub priority: String,
}

/// Document stored under the metadata key
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    /// 0 means the layout predates versioning
    pub schema_version: u32,
    pub indexes: VisitIndex,
    pub settings: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub active_visits: usize,
    pub archived_visits: usize,
    pub total_visits: usize,
    pub active_size: usize,
    pub archived_size: usize,
    pub total_size: usize,
    /// Estimate against an assumed 500-byte average record
    pub compression_ratio: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub active_visits: Option<Vec<VisitRecord>>,
    #[serde(default)]
    pub archived_visits: Option<Vec<CompressedVisitRecord>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub export_date: DateTime<Utc>,
    #[serde(default)]
    pub version: Option<String>,
}
