//! Hand-maintained corrections for devices the other sources get wrong or miss.

use crate::error::Result;
use crate::merge::RamFallback;
use crate::types::{DeviceFamily, DeviceSource, PartialRecord, SourceKind, SourceOutput};
use tracing::debug;

/// Board config (Xcode `Target`) to chip, iPad boards
#[rustfmt::skip]
const IPAD_BOARD_CHIPS: &[(&str, &str)] = &[
    ("j720ap", "M4"), ("j717ap", "M4"),
    ("j620ap", "M2"), ("j617ap", "M2"),
    ("j523ap", "M1"), ("j517ap", "M1"),
    ("j420ap", "A12Z"), ("j418ap", "A12Z"),
    ("j320ap", "A12X"), ("j317ap", "A12X"),
    ("j207ap", "A10X"), ("j120ap", "A10X"),
    ("j98aap", "A9X"), ("j127ap", "A9X"),
    ("j171ap", "A10"), ("j71bap", "A10"),
    ("j71tap", "A9"),
    ("j537ap", "M2"), ("j607ap", "M3"), ("j637ap", "M3"),
    ("j507ap", "M2"), ("j407ap", "M1"), ("j307ap", "A14"),
    ("j217ap", "A12"), ("j81ap", "A8X"), ("j71ap", "A7"),
    ("j410ap", "A17 Pro"), ("j310ap", "A15"), ("j210ap", "A12"),
    ("j96ap", "A8"), ("j85map", "A7"), ("j85ap", "A7"), ("p105ap", "A5"),
    ("j481ap", "A16"), ("j271ap", "A14"), ("j181ap", "A13"),
    ("j171aap", "A12"), ("p101ap", "A6X"), ("j1ap", "A5X"), ("k93ap", "A5"),
];

/// Board config to chip, Apple silicon Macs
#[rustfmt::skip]
const MAC_BOARD_CHIPS: &[(&str, &str)] = &[
    ("j720ap", "M4"), ("j717ap", "M4"),
    ("j620ap", "M3"), ("j617ap", "M3"), ("j637ap", "M3"),
    ("j523ap", "M2"), ("j517ap", "M2"), ("j607ap", "M2"),
    ("j420ap", "M1"), ("j418ap", "M1"), ("j407ap", "M1"),
];

const IPAD_CHIPS: &[(&str, &str)] = &[
    ("iPad Pro (11-inch) (2nd generation)", "A12Z"),
    ("iPad Pro (12.9-inch) (4th generation)", "A12Z"),
    ("iPad Pro (12.9-inch) (6th generation)", "M2"),
    ("iPad Pro (11-inch) (4th generation)", "M2"),
    ("iPad Air (4th generation)", "A14"),
    ("iPad Air (3rd generation)", "A12"),
    ("iPad Pro (12.9-inch) (5th generation)", "M1"),
];

const IPAD_RAM: &[(&str, &str)] = &[
    ("iPad (7th generation)", "3 GB"),
    ("iPad (6th generation)", "2 GB"),
    ("iPad (5th generation)", "2 GB"),
    ("iPad (4th generation)", "1 GB"),
    ("iPad (3rd generation)", "1 GB"),
    ("iPad 2", "512 MB"),
    ("iPad Air 2", "2 GB"),
    ("iPad Pro (11-inch)", "4 GB"),
    ("iPad Pro (12.9-inch) (3rd generation)", "4 GB"),
    ("iPad mini (6th generation)", "4 GB"),
    ("iPad (10th generation)", "4 GB"),
    ("iPad (9th generation)", "3 GB"),
    ("iPad (8th generation)", "3 GB"),
    ("iPad Air (3rd generation)", "3 GB"),
    ("iPad Air (4th generation)", "4 GB"),
    ("iPad Air (5th generation)", "8 GB"),
    ("iPad mini (5th generation)", "3 GB"),
    ("iPad Pro (12.9-inch) (5th generation)", "8 GB"),
];

/// Full SKU list for iPads whose Xcode product types are wrong or incomplete
const IPAD_SKUS: &[(&str, &[&str])] = &[
    ("iPad Pro (12.9-inch) (5th generation)", &["iPad13,8"]),
];

/// name, chip, base RAM, space-separated SKUs
const MAC_MODELS: &[(&str, &str, &str, &str)] = &[
    ("MacBook Air (2024, M4)", "M4", "8 GB", "Mac16,12 Mac16,13"),
    ("MacBook Pro (2024, M4)", "M4", "8 GB", "Mac16,1 Mac16,5 Mac16,6 Mac16,7 Mac16,8"),
    ("Mac mini (2024, M4)", "M4", "8 GB", "Mac16,10 Mac16,11"),
    ("iMac (2024, M4)", "M4", "8 GB", "Mac16,2 Mac16,3"),
    ("iMac (2023, M3)", "M3", "8 GB", "Mac15,4 Mac15,5"),
    ("MacBook Pro (2023, M3)", "M3", "8 GB", "Mac15,3 Mac15,6 Mac15,7 Mac15,8 Mac15,9"),
    ("MacBook Air (2024, M3)", "M3", "8 GB", "Mac15,12 Mac15,13"),
    ("MacBook Air (2022, M2)", "M2", "8 GB", "Mac14,2 Mac14,15"),
    ("MacBook Pro (2022, M2)", "M2", "8 GB", "Mac14,7 Mac14,5 Mac14,6 Mac14,9 Mac14,10"),
    ("Mac Mini (2023, M2)", "M2", "8 GB", "Mac14,3 Mac14,12"),
    ("Mac Pro (2023, M2)", "M2", "64 GB", "Mac14,8"),
    ("Mac Studio (2022, M2)", "M2 Ultra", "32 GB", "Mac14,13 Mac14,14"),
    ("MacBook Pro (2020, M1)", "M1", "8 GB", "MacBookPro17,1 MacBookPro18,1 MacBookPro19,1"),
    ("MacBook Air (2020, M1)", "M1", "8 GB", "MacBookAir10,1"),
    ("Mac Mini (2020, M1)", "M1", "8 GB", "Macmini9,1"),
    ("iMac (2021, M1)", "M1", "8 GB", "iMac21,1 iMac21,2"),
    ("Mac Studio (2022, M1)", "M1", "32 GB", "Mac13,1 Mac13,2"),
    ("Mac Studio (M4 Max)", "M4 Max", "36 GB", "Mac16,9 Mac16,10"),
    ("Mac Studio (M3 Ultra)", "M3 Ultra", "96 GB", "Mac15,17 Mac15,18"),
];

/// Base RAM of a Mac by chip tier, for models no source reports RAM for
pub fn mac_tier_ram(chip: &str) -> String {
    let ram = if chip.contains("Pro") {
        "16 GB"
    } else if chip.contains("Max") {
        "32 GB"
    } else if chip.contains("Ultra") {
        "64 GB"
    } else {
        "8 GB"
    };
    ram.to_string()
}

/// RAM default applied before the required-field check, if the family has one
pub fn ram_fallback(family: DeviceFamily) -> Option<RamFallback> {
    match family {
        DeviceFamily::Mac => Some(mac_tier_ram),
        DeviceFamily::IPhone | DeviceFamily::IPad => None,
    }
}

/// Chip for an Xcode board config: exact match first, then the first prefix match.
pub fn board_chip(family: DeviceFamily, target: &str) -> Option<&'static str> {
    let table = match family {
        DeviceFamily::IPhone => return None,
        DeviceFamily::IPad => IPAD_BOARD_CHIPS,
        DeviceFamily::Mac => MAC_BOARD_CHIPS,
    };
    let target = target.trim().to_lowercase();
    table
        .iter()
        .find(|(board, _)| *board == target)
        .or_else(|| table.iter().find(|(board, _)| target.starts_with(*board)))
        .map(|(_, chip)| *chip)
}

/// Correction tables as partial records, in table order
pub fn override_records(family: DeviceFamily) -> Vec<PartialRecord> {
    let source = SourceKind::Overrides;
    match family {
        DeviceFamily::IPhone => Vec::new(),
        DeviceFamily::IPad => {
            let mut records: Vec<PartialRecord> = IPAD_CHIPS
                .iter()
                .map(|(name, chip)| PartialRecord::new(*name, source).with_chip(*chip))
                .collect();
            records.extend(
                IPAD_RAM
                    .iter()
                    .map(|(name, ram)| PartialRecord::new(*name, source).with_ram(*ram)),
            );
            // One record per device so the override replaces the whole SKU list
            records.extend(IPAD_SKUS.iter().map(|(name, skus)| {
                let mut record = PartialRecord::new(*name, source);
                record.sku = skus.iter().map(|sku| sku.to_string()).collect();
                record
            }));
            records
        }
        DeviceFamily::Mac => MAC_MODELS
            .iter()
            .map(|(name, chip, ram, skus)| {
                let mut record = PartialRecord::new(*name, source).with_chip(*chip).with_ram(*ram);
                record.sku = skus.split_whitespace().map(str::to_string).collect();
                record
            })
            .collect(),
    }
}

pub struct OverrideSource {
    family: DeviceFamily,
}

impl OverrideSource {
    pub fn new(family: DeviceFamily) -> Self {
        Self { family }
    }
}

#[async_trait::async_trait]
impl DeviceSource for OverrideSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Overrides
    }

    async fn collect(&self) -> Result<SourceOutput> {
        let records = override_records(self.family);
        debug!("Loaded {} manual overrides for {}", records.len(), self.family);
        Ok(SourceOutput::new(SourceKind::Overrides, records, 0))
    }
}
