use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration number of a vehicle; the key for everything parked in the lot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl VehicleId {
    /// Normalizes surrounding whitespace and rejects blank identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vehicle size class. Each class occupies a fixed number of capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleCategory {
    A,
    B,
    C,
}

impl VehicleCategory {
    pub fn required_space(self) -> u32 {
        match self {
            VehicleCategory::A => 1,
            VehicleCategory::B => 2,
            VehicleCategory::C => 4,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VehicleCategory::A => "A",
            VehicleCategory::B => "B",
            VehicleCategory::C => "C",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Loyalty card presented at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromotionCard {
    Silver,
    Gold,
    Platinum,
}

impl PromotionCard {
    pub fn discount_percent(self) -> u32 {
        match self {
            PromotionCard::Silver => 10,
            PromotionCard::Gold => 15,
            PromotionCard::Platinum => 20,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            "platinum" => Some(Self::Platinum),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PromotionCard::Silver => "Silver",
            PromotionCard::Gold => "Gold",
            PromotionCard::Platinum => "Platinum",
        }
    }
}

/// Splits each day into a daytime window `[daily_start, nightly_start)` and a nighttime
/// window covering the rest, wrapping past midnight. Hour granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayNightWindow {
    daily_start: u8,
    nightly_start: u8,
}

impl DayNightWindow {
    pub fn new(daily_start: u8, nightly_start: u8) -> Result<Self, WindowError> {
        if nightly_start > 23 {
            return Err(WindowError::HourOutOfRange(nightly_start));
        }
        if daily_start >= nightly_start {
            return Err(WindowError::Inverted {
                daily_start,
                nightly_start,
            });
        }
        Ok(Self {
            daily_start,
            nightly_start,
        })
    }

    pub fn daily_start(&self) -> u8 {
        self.daily_start
    }

    pub fn nightly_start(&self) -> u8 {
        self.nightly_start
    }

    pub fn is_daytime(&self, hour: u32) -> bool {
        (self.daily_start as u32..self.nightly_start as u32).contains(&hour)
    }

    pub fn daytime_hours_per_day(&self) -> u32 {
        (self.nightly_start - self.daily_start) as u32
    }

    pub fn nighttime_hours_per_day(&self) -> u32 {
        24 - self.daytime_hours_per_day()
    }
}

impl Default for DayNightWindow {
    fn default() -> Self {
        Self {
            daily_start: 8,
            nightly_start: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u8),
    #[error("daytime must start before nighttime (daily {daily_start}, nightly {nightly_start})")]
    Inverted { daily_start: u8, nightly_start: u8 },
}

/// Billable hours split by rate class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayHours {
    pub daily: u32,
    pub nightly: u32,
}

impl StayHours {
    pub fn total(&self) -> u32 {
        self.daily + self.nightly
    }
}

/// Caller supplied data carried on the parked record. The admission core never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub category: Option<VehicleCategory>,
    pub promotion_card: Option<PromotionCard>,
}

/// A vehicle currently inside the lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub registered_at: DateTime<Utc>,
    pub category_space: u32,
    #[serde(default)]
    pub payload: RegistrationPayload,
}

/// Parked vehicles stored in an arena of slots with an id index, so membership checks and
/// removals never scan the whole lot.
#[derive(Debug, Clone, Default)]
pub struct ParkedVehicles {
    slots: Vec<Option<VehicleRecord>>,
    free: Vec<usize>,
    index: HashMap<VehicleId, usize>,
    occupied_space: u64,
}

impl ParkedVehicles {
    pub fn contains(&self, id: &VehicleId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &VehicleId) -> Option<&VehicleRecord> {
        self.index
            .get(id)
            .and_then(|slot| self.slots.get(*slot))
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sum of capacity units held by parked vehicles.
    pub fn occupied_space(&self) -> u64 {
        self.occupied_space
    }

    /// Records ordered by arrival, ties broken by id.
    pub fn in_arrival_order(&self) -> Vec<&VehicleRecord> {
        let mut records: Vec<&VehicleRecord> = self.slots.iter().flatten().collect();
        records.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Hands the record back when its id is already present.
    pub(crate) fn insert(&mut self, record: VehicleRecord) -> Result<(), VehicleRecord> {
        if self.index.contains_key(&record.id) {
            return Err(record);
        }

        self.occupied_space += u64::from(record.category_space);
        let id = record.id.clone();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(record);
                slot
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &VehicleId) -> Option<VehicleRecord> {
        let slot = self.index.remove(id)?;
        let record = self.slots.get_mut(slot).and_then(Option::take)?;
        self.free.push(slot);
        self.occupied_space -= u64::from(record.category_space);
        Some(record)
    }
}

/// The single shared capacity pool and its occupancy.
#[derive(Debug, Clone)]
pub struct Lot {
    pub(crate) total_space: u32,
    pub(crate) available_space: u32,
    pub(crate) window: DayNightWindow,
    pub(crate) vehicles: ParkedVehicles,
    pub(crate) modified_at: DateTime<Utc>,
}

/// What a store read hands back: a detached copy of the lot carrying its concurrency marker.
pub type LotSnapshot = Lot;

impl Lot {
    /// Empty lot with all capacity available.
    pub fn new(total_space: u32, window: DayNightWindow, created_at: DateTime<Utc>) -> Self {
        Self {
            total_space,
            available_space: total_space,
            window,
            vehicles: ParkedVehicles::default(),
            modified_at: created_at,
        }
    }

    pub fn total_space(&self) -> u32 {
        self.total_space
    }

    pub fn available_space(&self) -> u32 {
        self.available_space
    }

    pub fn window(&self) -> DayNightWindow {
        self.window
    }

    pub fn vehicles(&self) -> &ParkedVehicles {
        &self.vehicles
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn contains(&self, id: &VehicleId) -> bool {
        self.vehicles.contains(id)
    }

    pub fn has_space_for(&self, category_space: u32) -> bool {
        self.available_space >= category_space
    }

    /// Available space matches total minus what parked vehicles hold.
    pub fn is_consistent(&self) -> bool {
        self.available_space <= self.total_space
            && u64::from(self.total_space) - u64::from(self.available_space)
                == self.vehicles.occupied_space()
    }

    pub fn status(&self) -> LotStatus {
        LotStatus {
            total_space: self.total_space,
            available_space: self.available_space,
            parked: self.vehicles.len(),
            daily_start_hour: self.window.daily_start(),
            nightly_start_hour: self.window.nightly_start(),
        }
    }
}

/// Public view of the lot's occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotStatus {
    pub total_space: u32,
    pub available_space: u32,
    pub parked: usize,
    pub daily_start_hour: u8,
    pub nightly_start_hour: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, hour: u32, space: u32) -> VehicleRecord {
        VehicleRecord {
            id: VehicleId(id.to_string()),
            registered_at: Utc.with_ymd_and_hms(2025, 5, 1, hour, 0, 0).unwrap(),
            category_space: space,
            payload: RegistrationPayload::default(),
        }
    }

    #[test]
    fn window_rejects_inverted_or_out_of_range_hours() {
        assert_eq!(
            DayNightWindow::new(18, 8),
            Err(WindowError::Inverted {
                daily_start: 18,
                nightly_start: 8
            })
        );
        assert!(DayNightWindow::new(8, 8).is_err());
        assert_eq!(
            DayNightWindow::new(0, 24),
            Err(WindowError::HourOutOfRange(24))
        );
        let window = DayNightWindow::new(0, 23).expect("widest window");
        assert_eq!(window.daytime_hours_per_day(), 23);
        assert_eq!(window.nighttime_hours_per_day(), 1);
    }

    #[test]
    fn window_classifies_half_open_daytime() {
        let window = DayNightWindow::default();
        assert!(!window.is_daytime(7));
        assert!(window.is_daytime(8));
        assert!(window.is_daytime(17));
        assert!(!window.is_daytime(18));
        assert!(!window.is_daytime(0));
    }

    #[test]
    fn parked_vehicles_reject_duplicates_and_reuse_slots() {
        let mut parked = ParkedVehicles::default();
        parked.insert(record("CA1234", 9, 1)).expect("first insert");
        parked.insert(record("CB5678", 8, 4)).expect("second insert");
        assert!(parked.insert(record("CA1234", 10, 2)).is_err());
        assert_eq!(parked.len(), 2);
        assert_eq!(parked.occupied_space(), 5);

        let removed = parked
            .remove(&VehicleId("CA1234".to_string()))
            .expect("record removed");
        assert_eq!(removed.category_space, 1);
        assert!(parked.remove(&VehicleId("CA1234".to_string())).is_none());
        assert_eq!(parked.occupied_space(), 4);

        parked.insert(record("PB0001", 11, 2)).expect("slot reused");
        assert_eq!(parked.slots.len(), 2);
        let order: Vec<&str> = parked
            .in_arrival_order()
            .into_iter()
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(order, vec!["CB5678", "PB0001"]);
    }

    #[test]
    fn category_and_card_parse_case_insensitively() {
        assert_eq!(VehicleCategory::parse(" b "), Some(VehicleCategory::B));
        assert_eq!(VehicleCategory::parse("D"), None);
        assert_eq!(PromotionCard::parse("GOLD"), Some(PromotionCard::Gold));
        assert_eq!(PromotionCard::parse("bronze"), None);
        assert_eq!(VehicleCategory::C.required_space(), 4);
        assert_eq!(PromotionCard::Platinum.discount_percent(), 20);
    }

    #[test]
    fn vehicle_id_rejects_blank_input() {
        assert!(VehicleId::parse("   ").is_none());
        assert_eq!(
            VehicleId::parse(" CA1234XX ").map(|id| id.0),
            Some("CA1234XX".to_string())
        );
    }
}
