//! Archival encoding for visit records.
//!
//! `compress` is lossy: fields outside the archival schema (duration, notes,
//! the archived flag) are dropped and the summary keeps only its first
//! [`SUMMARY_LIMIT`] characters. `decompress` therefore never round-trips a
//! record exactly; it always marks the result as archived.

use crate::model::{CompressedVisitRecord, VisitRecord};

pub const SUMMARY_LIMIT: usize = 200;

pub fn compress(visit: &VisitRecord) -> CompressedVisitRecord {
    compress_with_limit(visit, SUMMARY_LIMIT)
}

pub fn compress_with_limit(visit: &VisitRecord, summary_limit: usize) -> CompressedVisitRecord {
    CompressedVisitRecord {
        id: visit.id.clone(),
        date: visit.date,
        time: visit.time.clone(),
        hotel_id: visit.hotel_id.clone(),
        hotel_name: visit.hotel_name.clone(),
        purpose: visit.purpose.clone(),
        status: visit.status,
        created_at: visit.created_at,
        updated_at: visit.updated_at,
        contact_person: visit.contact_person.clone(),
        contact_email: visit.contact_email.clone(),
        summary: visit
            .visit_summary
            .as_deref()
            .map(|s| truncate_chars(s, summary_limit))
            .unwrap_or_default(),
        outcome: visit.visit_outcome.clone(),
        rating: visit.visit_rating,
    }
}

pub fn decompress(compressed: &CompressedVisitRecord) -> VisitRecord {
    VisitRecord {
        id: compressed.id.clone(),
        date: compressed.date,
        time: compressed.time.clone(),
        hotel_id: compressed.hotel_id.clone(),
        hotel_name: compressed.hotel_name.clone(),
        purpose: compressed.purpose.clone(),
        status: compressed.status,
        created_at: compressed.created_at,
        updated_at: compressed.updated_at,
        contact_person: compressed.contact_person.clone(),
        contact_email: compressed.contact_email.clone(),
        visit_summary: Some(compressed.summary.clone()),
        visit_outcome: compressed.outcome.clone(),
        visit_rating: compressed.rating,
        archived: true,
        ..Default::default()
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
