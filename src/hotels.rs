use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::error::Result;
use crate::load_json;
use crate::model::HotelRecord;
use crate::storage::{KvStore, KEY_HOTELS};

const FILLER_COUNT: usize = 101;

// (name, area, address, phone, email, revenue, bookings)
const PRIORITY_HOTELS: [(&str, &str, &str, &str, &str, f64, u32); 10] = [
    ("THE PARK TOWER KNIGHTSBRIDGE", "Knightsbridge", "101 Knightsbridge, London SW1X 7RN", "+44 20 7235 8050", "reservations@theparktowerknightsbridge.com", 298_372.50, 1842),
    ("CLARIDGE'S", "Mayfair", "Brook Street, London W1K 4HR", "+44 20 7629 8860", "info@claridges.co.uk", 248_770.00, 1654),
    ("GROSVENOR HOUSE SUITES", "Mayfair", "86-90 Park Lane, London W1K 7TN", "+44 20 7499 6363", "reservations@grosvenorhouse-suites.com", 247_504.00, 1598),
    ("THE LANGHAM, LONDON", "Marylebone", "1C Portland Place, London W1B 1JA", "+44 20 7636 1000", "tllon.info@langhamhotels.com", 143_191.00, 987),
    ("JUMEIRAH CARLTON TOWER", "Knightsbridge", "Cadogan Place, London SW1X 9PY", "+44 20 7235 1234", "jctinfo@jumeirah.com", 137_940.00, 876),
    ("THE RITZ LONDON", "Piccadilly", "150 Piccadilly, London W1J 9BR", "+44 20 7493 8181", "enquire@theritzlondon.com", 111_049.00, 743),
    ("THE DORCHESTER", "Mayfair", "Park Lane, London W1K 1QA", "+44 20 7629 8888", "reservations@thedorchester.com", 98_765.00, 654),
    ("THE SAVOY", "Covent Garden", "Strand, London WC2R 0EU", "+44 20 7836 4343", "info@thesavoylondon.com", 87_432.00, 567),
    ("FOUR SEASONS HOTEL LONDON AT MAYFAIR", "Mayfair", "Hamilton Place, Park Lane, London W1J 7DR", "+44 20 7499 0888", "reservations.london@fourseasons.com", 76_543.00, 498),
    ("THE BERKELEY", "Knightsbridge", "Wilton Place, London SW1X 7RL", "+44 20 7235 6000", "info@the-berkeley.co.uk", 65_432.00, 432),
];

const FILLER_NAMES: [&str; 40] = [
    "THE LONDON EDITION", "COVENT GARDEN HOTEL", "THE SOHO HOTEL", "HAZLITT'S HOTEL",
    "THE FITZROY LONDON", "HOTEL 41", "THE MILESTONE HOTEL", "THE PELHAM HOTEL",
    "THE WESTMINSTER LONDON", "THE GRAND AT TRAFALGAR SQUARE", "ROSEWOOD LONDON",
    "THE CORINTHIA LONDON", "SHANGRI-LA HOTEL AT THE SHARD", "MANDARIN ORIENTAL HYDE PARK",
    "THE CONNAUGHT", "BROWN'S HOTEL", "THE ZETTER TOWNHOUSE", "CHARLOTTE STREET HOTEL",
    "THE BEAUMONT", "THE STAFFORD LONDON", "DUKES LONDON", "THE CHESTERFIELD MAYFAIR",
    "FLEMINGS MAYFAIR", "THE MAY FAIR HOTEL", "THE LONDONER", "THE STANDARD LONDON",
    "SEA CONTAINERS LONDON", "THE ROYAL HORSEGUARDS", "THE RUBENS AT THE PALACE", "THE GORING",
    "THE LANESBOROUGH", "THE CADOGAN", "THE DRAYCOTT HOTEL", "THE CAPITAL HOTEL",
    "THE EGERTON HOUSE HOTEL", "THE WELLESLEY", "THE ATHENAEUM", "THE MONTAGUE ON THE GARDENS",
    "THE ROOKERY HOTEL", "THE HENRIETTA HOTEL",
];

const FILLER_AREAS: [&str; 29] = [
    "Mayfair", "Knightsbridge", "Covent Garden", "Soho", "Fitzrovia", "Marylebone",
    "Bloomsbury", "King's Cross", "Shoreditch", "Southwark", "Borough", "Bankside",
    "Westminster", "Victoria", "Pimlico", "Belgravia", "Chelsea", "Kensington",
    "South Kensington", "Earl's Court", "Paddington", "Bayswater", "Notting Hill",
    "Holland Park", "Hammersmith", "Fulham", "Clapham", "Battersea", "Vauxhall",
];

/// Read-mostly hotel reference data kept under the `hotels` key.
pub struct HotelDirectory {
    store: Arc<dyn KvStore>,
}

impl HotelDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Writes the seed list if the directory is empty. Returns the number of
    /// hotels written (0 when already seeded).
    pub fn ensure_seeded(&self) -> Result<usize> {
        if !self.all()?.is_empty() {
            return Ok(0);
        }
        let hotels = seed_hotels(&mut rand::thread_rng());
        self.store.set(KEY_HOTELS, &serde_json::to_string(&hotels)?)?;
        info!("Initialized hotel directory with {} hotels", hotels.len());
        Ok(hotels.len())
    }

    pub fn all(&self) -> Result<Vec<HotelRecord>> {
        Ok(load_json(self.store.as_ref(), KEY_HOTELS)?.unwrap_or_default())
    }

    pub fn get(&self, id: &str) -> Result<Option<HotelRecord>> {
        Ok(self.all()?.into_iter().find(|h| h.id == id))
    }

    /// Case-insensitive match on name, area, address and email; the phone
    /// number is matched as typed.
    pub fn search(&self, query: &str) -> Result<Vec<HotelRecord>> {
        let needle = query.to_lowercase();
        Ok(self
            .all()?
            .into_iter()
            .filter(|h| {
                h.name.to_lowercase().contains(&needle)
                    || h.area.to_lowercase().contains(&needle)
                    || h.address.to_lowercase().contains(&needle)
                    || h.phone.contains(query)
                    || h.email.to_lowercase().contains(&needle)
            })
            .collect())
    }
}

pub fn seed_hotels<R: Rng>(rng: &mut R) -> Vec<HotelRecord> {
    let mut hotels: Vec<HotelRecord> = PRIORITY_HOTELS
        .iter()
        .enumerate()
        .map(|(i, &(name, area, address, phone, email, revenue, bookings))| HotelRecord {
            id: hotel_id(i + 1),
            name: name.to_string(),
            area: area.to_string(),
            address: address.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            revenue,
            bookings,
            priority: "P1".to_string(),
        })
        .collect();

    for i in 0..FILLER_COUNT {
        let base = FILLER_NAMES[i % FILLER_NAMES.len()];
        let area = FILLER_AREAS[i % FILLER_AREAS.len()];
        // Repeat names past the first lap get a lap number
        let name = match i / FILLER_NAMES.len() {
            0 => base.to_string(),
            lap => format!("{} {}", base, lap + 1),
        };
        let slug: String = base.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()).collect();

        hotels.push(HotelRecord {
            id: hotel_id(PRIORITY_HOTELS.len() + i + 1),
            name,
            area: area.to_string(),
            address: format!("{} {} Street, London", rng.gen_range(1..=200), area),
            phone: format!("+44 20 {} {}", rng.gen_range(1000..10000), rng.gen_range(1000..10000)),
            email: format!("info@{}.com", slug),
            revenue: f64::from(rng.gen_range(10_000u32..60_000)),
            bookings: rng.gen_range(100..600),
            priority: "P1".to_string(),
        });
    }
    hotels
}

fn hotel_id(n: usize) -> String {
    format!("hotel_{:03}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_seed_shape() {
        let hotels = seed_hotels(&mut StdRng::seed_from_u64(7));
        assert_eq!(hotels.len(), 111);
        assert_eq!(hotels[0].id, "hotel_001");
        assert_eq!(hotels[10].id, "hotel_011");
        assert_eq!(hotels[110].id, "hotel_111");
        assert_eq!(hotels[50].name, "THE LONDON EDITION 2");

        for h in &hotels[10..] {
            assert!((10_000.0..60_000.0).contains(&h.revenue));
            assert!((100..600).contains(&h.bookings));
        }
    }

    #[test]
    fn test_seeding_is_one_shot() {
        let directory = HotelDirectory::new(Arc::new(MemoryStore::new()));
        assert_eq!(directory.ensure_seeded().unwrap(), 111);
        assert_eq!(directory.ensure_seeded().unwrap(), 0);
        assert_eq!(directory.all().unwrap().len(), 111);
    }

    #[test]
    fn test_search_fields() {
        let directory = HotelDirectory::new(Arc::new(MemoryStore::new()));
        directory.ensure_seeded().unwrap();

        let savoy = directory.search("savoy").unwrap();
        assert_eq!(savoy.len(), 1);
        assert_eq!(savoy[0].id, "hotel_008");

        assert!(directory.search("W1K 4HR").unwrap().iter().any(|h| h.id == "hotel_002"));
        assert!(directory.search("7629 8888").unwrap().iter().any(|h| h.id == "hotel_007"));
        assert!(directory.search("no such hotel anywhere").unwrap().is_empty());

        assert_eq!(directory.get("hotel_006").unwrap().unwrap().name, "THE RITZ LONDON");
        assert!(directory.get("hotel_999").unwrap().is_none());
    }
}
