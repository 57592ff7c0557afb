//! Reconciliation of partial records from several sources into one record per device.
//!
//! Sources are applied in ascending precedence: a later source overwrites an
//! earlier one field by field and fills gaps the earlier one left. The merge is
//! deterministic for a given input order.

use crate::chip::ChipGeneration;
use crate::normalize::NameUtils;
use crate::types::{DeviceRecord, PartialRecord, Sku, SkuShape, SourceKind};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// A device being assembled from partial records
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDevice {
    pub name: String,
    pub key: String,
    pub sku: Vec<String>,
    pub sku_source: Option<SourceKind>,
    pub chip: Option<String>,
    pub ram: Option<String>,
    pub release_date: Option<chrono::NaiveDate>,
}

impl MergedDevice {
    fn new(name: String, key: String) -> Self {
        Self {
            name,
            key,
            sku: Vec::new(),
            sku_source: None,
            chip: None,
            ram: None,
            release_date: None,
        }
    }

    fn apply(&mut self, record: PartialRecord, shape: SkuShape) {
        if !record.sku.is_empty() {
            match shape {
                SkuShape::Single => {
                    self.sku = record.sku.last().cloned().into_iter().collect();
                }
                SkuShape::List => {
                    // Variants from one source accumulate; a later source replaces the list
                    if self.sku_source != Some(record.source) {
                        self.sku.clear();
                    }
                    for sku in record.sku {
                        if !self.sku.contains(&sku) {
                            self.sku.push(sku);
                        }
                    }
                }
            }
            self.sku_source = Some(record.source);
        }
        if record.chip.is_some() {
            self.chip = record.chip;
        }
        if record.ram.is_some() {
            self.ram = record.ram;
        }
        if record.release_date.is_some() {
            self.release_date = record.release_date;
        }
    }
}

/// Outcome of merging and filtering one family's records
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub devices: BTreeMap<String, DeviceRecord>,
    /// Devices missing sku, chip or RAM after every source was applied
    pub incomplete: Vec<String>,
    /// Complete devices whose chip is older than the cutoff (or unparseable)
    pub below_cutoff: Vec<String>,
    /// Devices whose RAM came from the family's chip-tier default
    pub defaulted_ram: Vec<String>,
    /// Records from sources not named in the precedence list
    pub ignored_records: usize,
}

/// Base RAM to assume for a chip when no source reports one
pub type RamFallback = fn(&str) -> String;

pub struct Reconciler {
    precedence: Vec<SourceKind>,
    sku_shape: SkuShape,
    match_cutoff: f64,
    devices: Vec<MergedDevice>,
    index: HashMap<String, usize>,
    ignored_records: usize,
    ram_fallback: Option<RamFallback>,
}

impl Reconciler {
    pub fn new(precedence: Vec<SourceKind>, sku_shape: SkuShape, match_cutoff: f64) -> Self {
        Self {
            precedence,
            sku_shape,
            match_cutoff,
            devices: Vec::new(),
            index: HashMap::new(),
            ignored_records: 0,
            ram_fallback: None,
        }
    }

    /// Fill missing RAM from the chip before the required-field check.
    pub fn with_ram_fallback(mut self, fallback: RamFallback) -> Self {
        self.ram_fallback = Some(fallback);
        self
    }

    fn rank(&self, source: SourceKind) -> Option<usize> {
        self.precedence.iter().position(|s| *s == source)
    }

    /// Merge records from any number of sources.
    ///
    /// Records are ordered by their source's precedence rank; records of the
    /// same source keep their input order.
    pub fn merge(&mut self, records: Vec<PartialRecord>) {
        let mut ranked: Vec<(usize, PartialRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match self.rank(record.source) {
                Some(rank) => ranked.push((rank, record)),
                None => {
                    warn!(
                        "Ignoring record {:?} from {}: source not in precedence list",
                        record.name, record.source
                    );
                    self.ignored_records += 1;
                }
            }
        }
        // stable: preserves input order within a source
        ranked.sort_by_key(|(rank, _)| *rank);

        for (_, record) in ranked {
            self.merge_one(record);
        }
    }

    fn merge_one(&mut self, mut record: PartialRecord) {
        record.name = NameUtils::clean_display_name(&record.name);
        let key = NameUtils::normalize_key(&record.name);
        if key.is_empty() || record.is_empty() {
            return;
        }

        let index = match self.resolve(&record.name, &key) {
            Some(index) => index,
            None => {
                self.devices
                    .push(MergedDevice::new(record.name.clone(), key.clone()));
                let index = self.devices.len() - 1;
                self.index.insert(key, index);
                index
            }
        };
        self.devices[index].apply(record, self.sku_shape);
    }

    /// Exact normalized key first, then the closest comparable existing device.
    fn resolve(&mut self, name: &str, key: &str) -> Option<usize> {
        if let Some(index) = self.index.get(key) {
            return Some(*index);
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, device) in self.devices.iter().enumerate() {
            if !NameUtils::comparable(name, &device.name) {
                continue;
            }
            let similarity = NameUtils::calculate_similarity(key, &device.key);
            if similarity >= self.match_cutoff && best.map_or(true, |(_, s)| similarity > s) {
                best = Some((index, similarity));
            }
        }

        let (index, similarity) = best?;
        debug!(
            "Matched {:?} to existing {:?} (similarity: {:.2})",
            name, self.devices[index].name, similarity
        );
        // Later spellings of the same device resolve directly
        self.index.insert(key.to_string(), index);
        Some(index)
    }

    pub fn devices(&self) -> &[MergedDevice] {
        &self.devices
    }

    /// Drop incomplete devices and devices below `cutoff`, producing final records.
    pub fn finish(self, cutoff: &ChipGeneration) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            ignored_records: self.ignored_records,
            ..MergeOutcome::default()
        };

        for mut device in self.devices {
            if device.ram.is_none() {
                if let (Some(chip), Some(fallback)) = (device.chip.as_deref(), self.ram_fallback) {
                    let ram = fallback(chip);
                    debug!("No RAM reported for {:?}, assuming {} from {}", device.name, ram, chip);
                    outcome.defaulted_ram.push(device.name.clone());
                    device.ram = Some(ram);
                }
            }

            let has_sku = !device.sku.is_empty();
            let (Some(chip), Some(ram), true) = (device.chip, device.ram, has_sku) else {
                outcome.incomplete.push(device.name);
                continue;
            };

            let recent = chip
                .parse::<ChipGeneration>()
                .map(|generation| generation.satisfies(cutoff))
                .unwrap_or(false);
            if !recent {
                debug!("Dropping {:?}: chip {} is below cutoff {}", device.name, chip, cutoff);
                outcome.below_cutoff.push(device.name);
                continue;
            }

            let sku = match self.sku_shape {
                SkuShape::Single => Sku::Single(device.sku[0].clone()),
                SkuShape::List => Sku::List(device.sku),
            };
            outcome.devices.insert(
                device.name,
                DeviceRecord {
                    sku,
                    chip,
                    ram,
                    release_date: device.release_date,
                },
            );
        }

        outcome
    }
}
