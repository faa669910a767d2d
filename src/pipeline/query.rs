//! Consumer-side filtering and aggregation of processed records.
//!
//! Ranges are inclusive and use each dimension's canonical order, so
//! `age: Some((EighteenToThirtyFour, SixtyFivePlus))` selects every adult
//! band.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{AgeBand, PriorityStatus, TransplantRecord, WaitingTime, WaitlistRecord};

/// Read access to the dimensions shared by both record variants.
pub trait Observation {
    fn center_code(&self) -> &str;
    fn age(&self) -> AgeBand;
    /// `None` for variants without a waiting-time dimension.
    fn waiting_time(&self) -> Option<WaitingTime>;
    fn status(&self) -> PriorityStatus;
    fn count(&self) -> u64;
}

impl Observation for WaitlistRecord {
    fn center_code(&self) -> &str {
        &self.center_code
    }
    fn age(&self) -> AgeBand {
        self.age
    }
    fn waiting_time(&self) -> Option<WaitingTime> {
        Some(self.waiting_time)
    }
    fn status(&self) -> PriorityStatus {
        self.status
    }
    fn count(&self) -> u64 {
        self.count
    }
}

impl Observation for TransplantRecord {
    fn center_code(&self) -> &str {
        &self.center_code
    }
    fn age(&self) -> AgeBand {
        self.age
    }
    fn waiting_time(&self) -> Option<WaitingTime> {
        None
    }
    fn status(&self) -> PriorityStatus {
        self.status
    }
    fn count(&self) -> u64 {
        self.count
    }
}

fn in_range<T: Ord>(value: T, range: &Option<(T, T)>) -> bool {
    match range {
        Some((lo, hi)) => *lo <= value && value <= *hi,
        None => true,
    }
}

/// Record selection by inclusive category ranges and an optional center set.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub age: Option<(AgeBand, AgeBand)>,
    pub waiting_time: Option<(WaitingTime, WaitingTime)>,
    pub status: Option<(PriorityStatus, PriorityStatus)>,
    pub centers: Option<HashSet<String>>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ages(mut self, from: AgeBand, to: AgeBand) -> Self {
        self.age = Some((from, to));
        self
    }

    pub fn waiting_times(mut self, from: WaitingTime, to: WaitingTime) -> Self {
        self.waiting_time = Some((from, to));
        self
    }

    pub fn statuses(mut self, from: PriorityStatus, to: PriorityStatus) -> Self {
        self.status = Some((from, to));
        self
    }

    pub fn centers(mut self, centers: impl IntoIterator<Item = String>) -> Self {
        self.centers = Some(centers.into_iter().collect());
        self
    }

    pub fn matches(&self, record: &impl Observation) -> bool {
        let waiting_ok = match record.waiting_time() {
            Some(waiting) => in_range(waiting, &self.waiting_time),
            None => true,
        };
        let center_ok = self
            .centers
            .as_ref()
            .is_none_or(|set| set.contains(record.center_code()));

        center_ok
            && waiting_ok
            && in_range(record.age(), &self.age)
            && in_range(record.status(), &self.status)
    }

    pub fn apply<'a, R: Observation>(&self, records: &'a [R]) -> Vec<&'a R> {
        records.iter().filter(|r| self.matches(*r)).collect()
    }
}

/// Axis along which `summarize` groups counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Center,
    Age,
    WaitingTime,
    Status,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Center => "center",
            Dimension::Age => AgeBand::DIMENSION,
            Dimension::WaitingTime => WaitingTime::DIMENSION,
            Dimension::Status => PriorityStatus::DIMENSION,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "center" | "center_code" => Ok(Dimension::Center),
            "age" => Ok(Dimension::Age),
            "waiting_time" | "waiting-time" => Ok(Dimension::WaitingTime),
            "status" => Ok(Dimension::Status),
            _ => Err(AppError::config(format!("Unknown dimension '{s}'"))),
        }
    }
}

/// Count totals per category.
///
/// Category dimensions list every category in canonical order, zero totals
/// included. Centers are listed alphabetically, present ones only.
pub fn summarize<'a, R, I>(records: I, dimension: Dimension) -> Vec<(String, u64)>
where
    R: Observation + 'a,
    I: IntoIterator<Item = &'a R>,
{
    fn totals<K: Ord + Copy>(
        all: &[K],
        label: impl Fn(&K) -> &'static str,
        counts: BTreeMap<K, u64>,
    ) -> Vec<(String, u64)> {
        all.iter()
            .map(|k| (label(k).to_string(), counts.get(k).copied().unwrap_or(0)))
            .collect()
    }

    match dimension {
        Dimension::Center => {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for r in records {
                *counts.entry(r.center_code().to_string()).or_default() += r.count();
            }
            counts.into_iter().collect()
        }
        Dimension::Age => {
            let mut counts: BTreeMap<AgeBand, u64> = BTreeMap::new();
            for r in records {
                *counts.entry(r.age()).or_default() += r.count();
            }
            totals(AgeBand::ALL, AgeBand::label, counts)
        }
        Dimension::WaitingTime => {
            let mut counts: BTreeMap<WaitingTime, u64> = BTreeMap::new();
            for r in records {
                if let Some(waiting) = r.waiting_time() {
                    *counts.entry(waiting).or_default() += r.count();
                }
            }
            totals(WaitingTime::ALL, WaitingTime::label, counts)
        }
        Dimension::Status => {
            let mut counts: BTreeMap<PriorityStatus, u64> = BTreeMap::new();
            for r in records {
                *counts.entry(r.status()).or_default() += r.count();
            }
            totals(PriorityStatus::ALL, PriorityStatus::label, counts)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    fn record(
        center: &str,
        age: AgeBand,
        waiting: WaitingTime,
        status: PriorityStatus,
        count: u64,
    ) -> WaitlistRecord {
        WaitlistRecord {
            center_code: center.into(),
            age,
            waiting_time: waiting,
            status,
            count,
            retrieved_dt: NaiveDateTime::default(),
        }
    }

    fn sample() -> Vec<WaitlistRecord> {
        use AgeBand::*;
        use PriorityStatus::*;
        use WaitingTime::*;
        vec![
            record("CTR1", UnderOne, UnderThirtyDays, Status1A, 2),
            record("CTR1", FiftyToSixtyFour, FivePlusYears, Meld20To24, 7),
            record("CTR2", SixtyFivePlus, OneToTwoYears, TemporarilyInactive, 4),
        ]
    }

    #[test]
    fn ranges_are_inclusive_in_canonical_order() {
        let records = sample();
        let adults =
            RecordFilter::new().ages(AgeBand::EighteenToThirtyFour, AgeBand::SixtyFivePlus);
        assert_eq!(adults.apply(&records).len(), 2);

        let urgent =
            RecordFilter::new().statuses(PriorityStatus::Status1A, PriorityStatus::Status1A);
        let hits = urgent.apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].count, 2);
    }

    #[test]
    fn center_set_restricts_records() {
        let records = sample();
        let filter = RecordFilter::new()
            .centers(["CTR2".to_string()])
            .waiting_times(WaitingTime::UnderThirtyDays, WaitingTime::FivePlusYears);
        let hits = filter.apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].center_code, "CTR2");
    }

    #[test]
    fn summary_lists_every_category_in_order() {
        let records = sample();
        let by_status = summarize(&records, Dimension::Status);
        assert_eq!(by_status.len(), PriorityStatus::ALL.len());
        assert_eq!(by_status[0], ("Status 1A".to_string(), 2));
        assert_eq!(by_status[1], ("Status 1B".to_string(), 0));
        assert_eq!(by_status[8], ("Temporarily Inactive".to_string(), 4));

        let by_center = summarize(&records, Dimension::Center);
        assert_eq!(
            by_center,
            vec![("CTR1".to_string(), 9), ("CTR2".to_string(), 4)]
        );
    }

    #[test]
    fn dimension_parses_from_cli_names() {
        assert_eq!(
            "waiting-time".parse::<Dimension>().unwrap(),
            Dimension::WaitingTime
        );
        assert!("colour".parse::<Dimension>().is_err());
    }
}
