use crate::chip::extract_chip;
use crate::error::{Result, SpecsError};
use crate::http_client::HttpFetcher;
use crate::normalize::{standardize_ram, NameUtils};
use crate::types::{DeviceFamily, DeviceSource, PartialRecord, SourceKind, SourceOutput};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument};

static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"==\s*\[\[(.*?)\]\]\s*==").expect("valid heading regex"));
static CPU_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*\*+\s*CPU:\s*(.+)$").expect("valid CPU regex"));
static RAM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*\*+\s*RAM:\s*(.+)$").expect("valid RAM regex"));
static WIKI_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|]*)(?:\|([^\]]*))?\]\]").expect("valid link regex"));

/// Device list pages on The Apple Wiki, read through the MediaWiki API
pub struct AppleWikiSource {
    http: HttpFetcher,
    api_url: String,
    page: String,
    family: DeviceFamily,
}

impl AppleWikiSource {
    pub fn new(http: HttpFetcher, api_url: String, page: String, family: DeviceFamily) -> Self {
        Self {
            http,
            api_url,
            page,
            family,
        }
    }
}

#[async_trait::async_trait]
impl DeviceSource for AppleWikiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::AppleWiki
    }

    #[instrument(skip(self), fields(family = %self.family, page = %self.page))]
    async fn collect(&self) -> Result<SourceOutput> {
        let query = [
            ("action", "query"),
            ("titles", self.page.as_str()),
            ("prop", "revisions"),
            ("rvprop", "content"),
            ("format", "json"),
        ];
        let body = self
            .http
            .get_text(SourceKind::AppleWiki, &self.api_url, &query)
            .await?;
        let wikitext = extract_wikitext(&body)?;
        let (records, skipped) = parse_wikitext(&wikitext, self.family);

        info!(
            "Parsed {} {} models from the Apple Wiki ({} sections skipped)",
            records.len(),
            self.family,
            skipped
        );
        Ok(SourceOutput::new(SourceKind::AppleWiki, records, skipped))
    }
}

/// Pull the page wikitext out of a MediaWiki `prop=revisions` response.
pub fn extract_wikitext(body: &str) -> Result<String> {
    let data: Value = serde_json::from_str(body).map_err(|e| {
        SpecsError::fetch(SourceKind::AppleWiki.as_str(), format!("malformed response: {e}"))
    })?;
    let pages = data["query"]["pages"].as_object().ok_or_else(|| {
        SpecsError::fetch(SourceKind::AppleWiki.as_str(), "query.pages not found")
    })?;

    pages
        .values()
        .filter_map(|page| page["revisions"].as_array())
        .find_map(|revisions| revisions.first())
        .and_then(|revision| revision["*"].as_str())
        .map(str::to_string)
        .ok_or_else(|| SpecsError::fetch(SourceKind::AppleWiki.as_str(), "wiki text not found"))
}

/// Split wikitext on `== [[Device]] ==` headings and read each section.
///
/// Returns the records and the number of device sections that yielded
/// neither a chip nor RAM.
pub fn parse_wikitext(text: &str, family: DeviceFamily) -> (Vec<PartialRecord>, usize) {
    let headings: Vec<_> = SECTION_HEADING.captures_iter(text).collect();
    let mut records = Vec::new();
    let mut skipped = 0;

    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(link)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let block_end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let block = &text[whole.end()..block_end];

        let name = link.as_str().split('|').next().unwrap_or_default();
        let name = NameUtils::clean_display_name(name);
        if name.is_empty() || name.starts_with("File:") {
            continue;
        }
        if !mentions_family(&name, block, family) {
            continue;
        }

        match parse_section(&name, block, family) {
            Some(record) => records.push(record),
            None => {
                debug!("Skipping wiki section {:?}: no chip or RAM", name);
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

fn mentions_family(name: &str, block: &str, family: DeviceFamily) -> bool {
    let keyword = family.display_name().to_lowercase();
    name.to_lowercase().contains(&keyword) || block.to_lowercase().contains(&keyword)
}

fn parse_section(name: &str, block: &str, family: DeviceFamily) -> Option<PartialRecord> {
    let chip = CPU_LINE
        .captures(block)
        .and_then(|caps| extract_chip(&strip_markup(&caps[1]), family));
    let ram = RAM_LINE
        .captures(block)
        .and_then(|caps| standardize_ram(&strip_markup(&caps[1])));

    if chip.is_none() && ram.is_none() {
        return None;
    }

    let mut record = PartialRecord::new(name, SourceKind::AppleWiki);
    record.chip = chip;
    record.ram = ram;
    Some(record)
}

/// Replace `[[target|label]]` links with their label and drop quote markup.
fn strip_markup(value: &str) -> String {
    let unlinked = WIKI_LINK.replace_all(value, |caps: &regex::Captures| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    unlinked.replace("'''", "").replace("''", "").replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_WIKITEXT: &str = r#"
Intro text.
== [[iPhone XR]] ==
[[File:iPhone XR.png|thumb]]
* CPU: [[Apple A12 Bionic|A12 Bionic]]
* RAM: 3 GB LPDDR4X
== [[iPhone 13|iPhone 13]] ==
* CPU: Apple A15 Bionic
* RAM: 4GB
== [[iPhone 15 Pro]] ==
* CPU: "A17 Pro"
* RAM: 8 GB
== [[File:Lineup.png]] ==
* CPU: A99
== [[iPhone (prototype)]] ==
* Notes: nothing useful
"#;

    #[test]
    fn test_parse_wikitext_iphone() {
        let (records, skipped) = parse_wikitext(IPHONE_WIKITEXT, DeviceFamily::IPhone);
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].name, "iPhone XR");
        assert_eq!(records[0].chip.as_deref(), Some("A12"));
        assert_eq!(records[0].ram.as_deref(), Some("3 GB"));

        assert_eq!(records[1].name, "iPhone 13");
        assert_eq!(records[1].chip.as_deref(), Some("A15"));
        assert_eq!(records[1].ram.as_deref(), Some("4 GB"));

        assert_eq!(records[2].chip.as_deref(), Some("A17 Pro"));
        assert!(records.iter().all(|r| r.source == SourceKind::AppleWiki));
    }

    #[test]
    fn test_parse_wikitext_filters_other_families() {
        let text = concat!(
            "== [[Apple TV 4K]] ==\n* CPU: A15\n* RAM: 4 GB\n",
            "== [[iPad Air (5th generation)]] ==\n* CPU: Apple M1\n* RAM: 8 GB\n",
        );
        let (records, skipped) = parse_wikitext(text, DeviceFamily::IPad);
        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "iPad Air (5th generation)");
        assert_eq!(records[0].chip.as_deref(), Some("M1"));
    }

    #[test]
    fn test_parse_section_with_only_ram() {
        let text = "== [[iPad mini (6th generation)]] ==\n* RAM: 4 GB\n";
        let (records, _) = parse_wikitext(text, DeviceFamily::IPad);
        assert_eq!(records[0].chip, None);
        assert_eq!(records[0].ram.as_deref(), Some("4 GB"));
    }

    #[test]
    fn test_extract_wikitext() {
        let body = r#"{
            "batchcomplete": "",
            "query": {"pages": {
                "-1": {"title": "Missing"},
                "123": {"pageid": 123, "revisions": [{"*": "== [[iPhone 13]] =="}]}
            }}
        }"#;
        assert_eq!(extract_wikitext(body).unwrap(), "== [[iPhone 13]] ==");
    }

    #[test]
    fn test_extract_wikitext_without_revisions_is_fetch_error() {
        let body = r#"{"query":{"pages":{"-1":{"title":"List_of_iPhones","missing":""}}}}"#;
        let err = extract_wikitext(body).unwrap_err();
        assert!(matches!(err, SpecsError::Fetch { .. }));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("[[Apple A15 Bionic|A15]] chip"), "A15 chip");
        assert_eq!(strip_markup("'''[[Apple M2]]'''"), "Apple M2");
    }
}
