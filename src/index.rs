use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::VisitRecord;

type Buckets = BTreeMap<String, Vec<String>>;

/// Secondary lookup tables from date / hotel / status to visit ids.
///
/// Buckets keep insertion order and never hold an id twice. `remove` drops
/// buckets it empties; `prune` sweeps up any other empty bucket (for example
/// ones restored from an imported metadata document).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitIndex {
    pub visits_by_date: Buckets,
    pub visits_by_hotel: Buckets,
    pub visits_by_status: Buckets,
    pub last_updated: Option<DateTime<Utc>>,
}

impl VisitIndex {
    pub fn new() -> Self {
        Self { last_updated: Some(Utc::now()), ..Default::default() }
    }

    pub fn update(&mut self, visit: &VisitRecord) {
        if let Some(date_key) = visit.date_key() {
            insert_unique(&mut self.visits_by_date, date_key, &visit.id);
        }
        if let Some(hotel_id) = &visit.hotel_id {
            insert_unique(&mut self.visits_by_hotel, hotel_id.clone(), &visit.id);
        }
        if let Some(status) = visit.status {
            insert_unique(&mut self.visits_by_status, status.as_str().to_string(), &visit.id);
        }
        self.last_updated = Some(Utc::now());
    }

    /// Purges `id` from every bucket. Returns true if it was present anywhere.
    pub fn remove(&mut self, id: &str) -> bool {
        let mut found = false;
        for buckets in self.categories_mut() {
            buckets.retain(|_, ids| {
                let before = ids.len();
                ids.retain(|existing| existing != id);
                found |= ids.len() != before;
                !ids.is_empty()
            });
        }
        if found {
            self.last_updated = Some(Utc::now());
        }
        found
    }

    pub fn rebuild<'a, I>(&mut self, visits: I)
    where
        I: IntoIterator<Item = &'a VisitRecord>,
    {
        *self = Self::new();
        for visit in visits {
            self.update(visit);
        }
    }

    /// Drops empty buckets, returning how many were removed.
    pub fn prune(&mut self) -> usize {
        let mut dropped = 0;
        for buckets in self.categories_mut() {
            let before = buckets.len();
            buckets.retain(|_, ids| !ids.is_empty());
            dropped += before - buckets.len();
        }
        dropped
    }

    pub fn by_date(&self, date: &str) -> &[String] {
        lookup(&self.visits_by_date, date)
    }

    pub fn by_hotel(&self, hotel_id: &str) -> &[String] {
        lookup(&self.visits_by_hotel, hotel_id)
    }

    pub fn by_status(&self, status: &str) -> &[String] {
        lookup(&self.visits_by_status, status)
    }

    pub fn bucket_count(&self) -> usize {
        self.visits_by_date.len() + self.visits_by_hotel.len() + self.visits_by_status.len()
    }

    fn categories_mut(&mut self) -> [&mut Buckets; 3] {
        [&mut self.visits_by_date, &mut self.visits_by_hotel, &mut self.visits_by_status]
    }
}

fn insert_unique(buckets: &mut Buckets, key: String, id: &str) {
    let ids = buckets.entry(key).or_default();
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

fn lookup<'a>(buckets: &'a Buckets, key: &str) -> &'a [String] {
    buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
}
