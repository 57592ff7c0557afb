use crate::types::DeviceFamily;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static A_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bA(\d+)([XZ])?(?:\s+(Pro))?\b").expect("valid A-series regex")
});
static M_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bM(\d+)(?:\s+(Pro|Max|Ultra))?\b").expect("valid M-series regex")
});
static LEGACY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bS5L89\d\d\b").expect("valid S5L regex"));
static GENERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Apple\s+)?([AaMm])(\d+)").expect("valid generation regex"));

/// Pull a chip name out of a free-form CPU description.
///
/// A-series names keep their `X`/`Z`/`Pro` suffix and lose `Bionic`/`Fusion`;
/// Macs only ever report M-series chips.
pub fn extract_chip(text: &str, family: DeviceFamily) -> Option<String> {
    let m_series = || {
        M_SERIES.captures(text).map(|caps| match caps.get(2) {
            Some(tier) => format!("M{} {}", &caps[1], tier.as_str()),
            None => format!("M{}", &caps[1]),
        })
    };

    if family == DeviceFamily::Mac {
        return m_series();
    }

    // "A7 with M7 motion coprocessor": the A-series part is the SoC
    if let Some(caps) = A_SERIES.captures(text) {
        let mut chip = format!("A{}", &caps[1]);
        if let Some(suffix) = caps.get(2) {
            chip.push_str(suffix.as_str());
        }
        if caps.get(3).is_some() {
            chip.push_str(" Pro");
        }
        return Some(chip);
    }

    m_series().or_else(|| LEGACY.find(text).map(|m| m.as_str().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipSeries {
    A,
    M,
}

/// Generation of an Apple SoC, used as the recency cutoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChipGeneration {
    pub series: ChipSeries,
    pub number: u32,
}

impl ChipGeneration {
    pub fn new(series: ChipSeries, number: u32) -> Self {
        Self { series, number }
    }

    /// M-series chips postdate every A-series cutoff; A-series never meets an M cutoff.
    pub fn satisfies(&self, minimum: &ChipGeneration) -> bool {
        match (self.series, minimum.series) {
            (ChipSeries::A, ChipSeries::A) | (ChipSeries::M, ChipSeries::M) => {
                self.number >= minimum.number
            }
            (ChipSeries::M, ChipSeries::A) => true,
            (ChipSeries::A, ChipSeries::M) => false,
        }
    }
}

impl FromStr for ChipGeneration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = GENERATION
            .captures(s.trim())
            .ok_or_else(|| format!("not an A- or M-series chip: {s:?}"))?;
        let series = match &caps[1] {
            "A" | "a" => ChipSeries::A,
            _ => ChipSeries::M,
        };
        let number = caps[2]
            .parse()
            .map_err(|e| format!("bad chip generation in {s:?}: {e}"))?;
        Ok(Self { series, number })
    }
}

impl TryFrom<String> for ChipGeneration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChipGeneration> for String {
    fn from(value: ChipGeneration) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ChipGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.series {
            ChipSeries::A => "A",
            ChipSeries::M => "M",
        };
        write!(f, "{prefix}{}", self.number)
    }
}
