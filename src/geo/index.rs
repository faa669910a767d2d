//! Pairwise distance index with radius queries.
//!
//! ## File format
//!
//! ```text
//! source<TAB>target<TAB>distance_nm
//! CACS<TAB>NYCP<TAB>2127.43
//! ```
//!
//! One line per ordered pair of distinct facilities, in facility order.
//! A facility with no neighbours (a single-facility index) is written as
//! a zero-distance line to itself so that it survives a reload.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::HaversineCache;
use crate::error::Result;
use crate::models::Facility;

/// Directed distance between two facilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceEdge {
    pub source: String,
    pub target: String,
    pub distance_nm: f64,
}

/// Directional lookup table over every ordered facility pair.
#[derive(Debug, Clone, Default)]
pub struct DistanceIndex {
    /// Facility codes in insertion order
    codes: Vec<String>,
    edges: HashMap<String, HashMap<String, f64>>,
}

impl DistanceIndex {
    /// Compute all pairwise distances. Later duplicates of a code are ignored.
    pub fn build(facilities: &[Facility], cache: &mut HaversineCache) -> Self {
        let mut unique: Vec<&Facility> = Vec::with_capacity(facilities.len());
        for facility in facilities {
            if unique.iter().any(|f| f.code == facility.code) {
                log::warn!("Duplicate facility code {}; keeping the first", facility.code);
            } else {
                unique.push(facility);
            }
        }

        let mut index = Self::default();
        for a in &unique {
            index.add_code(&a.code);
            for b in &unique {
                if a.code != b.code {
                    let distance = cache.distance(a.lat, a.lon, b.lat, b.lon);
                    index.insert(&a.code, &b.code, distance);
                }
            }
        }

        log::debug!(
            "Built distance index over {} facilities ({} cache hits, {} misses)",
            index.codes.len(),
            cache.hits(),
            cache.misses()
        );
        index
    }

    fn add_code(&mut self, code: &str) {
        if !self.edges.contains_key(code) {
            self.codes.push(code.to_string());
            self.edges.insert(code.to_string(), HashMap::new());
        }
    }

    fn insert(&mut self, source: &str, target: &str, distance: f64) {
        self.add_code(source);
        self.add_code(target);
        if let Some(targets) = self.edges.get_mut(source) {
            targets.insert(target.to_string(), distance);
        }
    }

    /// Facility codes known to the index.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Stored distance from `source` to `target`; zero to itself.
    pub fn distance(&self, source: &str, target: &str) -> Option<f64> {
        let targets = self.edges.get(source)?;
        if source == target {
            return Some(0.0);
        }
        targets.get(target).copied()
    }

    /// `center` plus every facility within `radius_nm` of it.
    ///
    /// An unknown center yields an empty list.
    pub fn within_radius(&self, center: &str, radius_nm: f64) -> Vec<String> {
        let Some(targets) = self.edges.get(center) else {
            return Vec::new();
        };

        let mut codes = vec![center.to_string()];
        codes.extend(
            self.codes
                .iter()
                .filter(|code| code.as_str() != center)
                .filter(|code| targets.get(code.as_str()).is_some_and(|d| *d <= radius_nm))
                .cloned(),
        );
        codes
    }

    /// Every stored edge in facility order.
    pub fn edges(&self) -> Vec<DistanceEdge> {
        let mut edges = Vec::new();
        for source in &self.codes {
            for target in &self.codes {
                if let Some(distance_nm) = self.edges.get(source).and_then(|t| t.get(target)) {
                    edges.push(DistanceEdge {
                        source: source.clone(),
                        target: target.clone(),
                        distance_nm: *distance_nm,
                    });
                }
            }
        }
        edges
    }

    pub fn from_edges(edges: impl IntoIterator<Item = DistanceEdge>) -> Self {
        let mut index = Self::default();
        for edge in edges {
            if edge.source == edge.target {
                index.add_code(&edge.source);
            } else {
                index.insert(&edge.source, &edge.target, edge.distance_nm);
            }
        }
        index
    }

    /// Write the index as TSV with two-decimal distances.
    pub fn write_tsv(&self, writer: impl Write) -> Result<()> {
        let mut tsv = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        tsv.write_record(["source", "target", "distance_nm"])?;
        for edge in self.edges() {
            let distance = format!("{:.2}", edge.distance_nm);
            tsv.write_record([edge.source.as_str(), edge.target.as_str(), distance.as_str()])?;
        }
        for code in &self.codes {
            if self.edges.get(code).is_none_or(HashMap::is_empty) {
                tsv.write_record([code.as_str(), code.as_str(), "0.00"])?;
            }
        }
        tsv.flush()?;
        Ok(())
    }

    pub fn write_tsv_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_tsv(File::create(path)?)
    }

    /// Load an index previously written by [`write_tsv`](Self::write_tsv).
    pub fn load_tsv(reader: impl Read) -> Result<Self> {
        let mut tsv = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let edges = tsv
            .deserialize::<DistanceEdge>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
        Ok(Self::from_edges(edges))
    }

    pub fn load_tsv_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_tsv(File::open(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(code: &str, lat: f64, lon: f64) -> Facility {
        Facility {
            code: code.into(),
            name: format!("{code} Hospital"),
            city: "City".into(),
            state: "ST".into(),
            lat,
            lon,
        }
    }

    fn sample() -> Vec<Facility> {
        vec![
            facility("CACS", 34.05, -118.24),
            facility("CAUC", 34.07, -118.45),
            facility("NYCP", 40.71, -74.0),
        ]
    }

    #[test]
    fn test_distances_are_symmetric() {
        let index = DistanceIndex::build(&sample(), &mut HaversineCache::default());
        for a in index.codes() {
            for b in index.codes() {
                let ab = index.distance(a, b).unwrap();
                let ba = index.distance(b, a).unwrap();
                assert!((ab - ba).abs() < 1e-9, "{a} -> {b}");
            }
        }
    }

    #[test]
    fn test_zero_radius_is_only_self() {
        let index = DistanceIndex::build(&sample(), &mut HaversineCache::default());
        assert_eq!(index.within_radius("CACS", 0.0), vec!["CACS"]);
    }

    #[test]
    fn test_radius_includes_nearby() {
        let index = DistanceIndex::build(&sample(), &mut HaversineCache::default());
        assert_eq!(index.within_radius("CAUC", 50.0), vec!["CAUC", "CACS"]);
        assert_eq!(index.within_radius("NYCP", 5000.0).len(), 3);
    }

    #[test]
    fn test_unknown_center_is_empty() {
        let index = DistanceIndex::build(&sample(), &mut HaversineCache::default());
        assert!(index.within_radius("ZZZZ", 1000.0).is_empty());
        assert_eq!(index.distance("ZZZZ", "CACS"), None);
    }

    #[test]
    fn test_tsv_layout_and_reload() {
        let index = DistanceIndex::build(&sample(), &mut HaversineCache::default());
        let mut buf = Vec::new();
        index.write_tsv(&mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "source\ttarget\tdistance_nm");
        assert_eq!(lines.len(), 1 + 3 * 2);
        assert!(lines[1].starts_with("CACS\tCAUC\t"));
        let decimals = lines[1].rsplit('.').next().unwrap();
        assert_eq!(decimals.len(), 2);

        let reloaded = DistanceIndex::load_tsv(buf.as_slice()).unwrap();
        assert_eq!(reloaded.codes(), index.codes());
        assert_eq!(reloaded.within_radius("CACS", 0.0), vec!["CACS"]);
        let original = index.distance("CACS", "NYCP").unwrap();
        let rounded = reloaded.distance("CACS", "NYCP").unwrap();
        assert!((original - rounded).abs() <= 0.005);
    }

    #[test]
    fn test_single_facility_survives_reload() {
        let facilities = [facility("CACS", 34.05, -118.24)];
        let index = DistanceIndex::build(&facilities, &mut HaversineCache::default());
        let mut buf = Vec::new();
        index.write_tsv(&mut buf).unwrap();

        let reloaded = DistanceIndex::load_tsv(buf.as_slice()).unwrap();
        assert_eq!(reloaded.codes(), ["CACS"]);
        assert_eq!(reloaded.within_radius("CACS", 100.0), vec!["CACS"]);
        assert_eq!(reloaded.distance("CACS", "CACS"), Some(0.0));
        assert!(reloaded.edges().is_empty());
    }

    #[test]
    fn test_duplicate_codes_keep_first() {
        let mut facilities = sample();
        facilities.push(facility("CACS", 0.0, 0.0));
        let index = DistanceIndex::build(&facilities, &mut HaversineCache::default());
        assert_eq!(index.len(), 3);
    }
}
