use once_cell::sync::Lazy;
use regex::Regex;

static RAM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(GB|MB|G|M)").expect("valid RAM regex"));
static MODEL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]+|\d+").expect("valid token regex"));

/// Words every name in a family shares; they say nothing about the model
const GENERIC_WORDS: &[&str] = &[
    "iphone", "ipad", "mac", "generation", "gen", "inch", "in", "st", "nd", "rd", "th",
];

/// String similarity and normalization utilities for device name matching
pub struct NameUtils;

impl NameUtils {
    /// Replace typographic characters that sources use inconsistently
    pub fn clean_display_name(name: &str) -> String {
        name.replace(['\u{a0}', '\u{2009}', '\u{202f}'], " ")
            .replace(['\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}'], "-")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Merge key: lowercase with punctuation and whitespace removed
    pub fn normalize_key(name: &str) -> String {
        Self::clean_display_name(name)
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Letter and digit runs that identify a model, in order of appearance.
    ///
    /// `"iPhone 16e"` gives `["16", "e"]`, `"iPad Pro (12.9-inch) (5th generation)"`
    /// gives `["pro", "12", "9", "5"]`.
    pub fn model_tokens(name: &str) -> Vec<String> {
        let lower = name.to_lowercase();
        MODEL_TOKEN
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|token| !GENERIC_WORDS.contains(token))
            .map(|token| {
                if token.bytes().all(|b| b.is_ascii_digit()) {
                    let trimmed = token.trim_start_matches('0');
                    if trimmed.is_empty() { "0" } else { trimmed }.to_string()
                } else {
                    token.to_string()
                }
            })
            .collect()
    }

    /// Two names may be fuzzily matched only when they carry the same model tokens,
    /// so `16` never meets `16e` and `X` never meets `XR`.
    pub fn comparable(a: &str, b: &str) -> bool {
        let mut left = Self::model_tokens(a);
        let mut right = Self::model_tokens(b);
        left.sort_unstable();
        right.sort_unstable();
        left == right
    }

    /// Calculate string similarity using Levenshtein distance
    pub fn calculate_similarity(s1: &str, s2: &str) -> f64 {
        if s1 == s2 {
            return 1.0;
        }

        let len1 = s1.chars().count();
        let len2 = s2.chars().count();

        if len1 == 0 || len2 == 0 {
            return 0.0;
        }

        let max_len = len1.max(len2);
        let distance = Self::levenshtein_distance(s1, s2);

        1.0 - (distance as f64 / max_len as f64)
    }

    fn levenshtein_distance(s1: &str, s2: &str) -> usize {
        let chars1: Vec<char> = s1.chars().collect();
        let chars2: Vec<char> = s2.chars().collect();

        let mut prev: Vec<usize> = (0..=chars2.len()).collect();
        let mut curr = vec![0; chars2.len() + 1];

        for i in 1..=chars1.len() {
            curr[0] = i;
            for j in 1..=chars2.len() {
                let cost = usize::from(chars1[i - 1] != chars2[j - 1]);
                curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[chars2.len()]
    }
}

/// Standardize a free-form RAM description to `"<n> GB"` or `"<n> MB"`.
///
/// Returns `None` when no size can be found, e.g. `"Unknown"`.
pub fn standardize_ram(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let caps = RAM_PATTERN.captures(&upper)?;
    let number = &caps[1];
    let unit = match &caps[2] {
        "G" | "GB" => "GB",
        _ => "MB",
    };
    Some(format!("{number} {unit}"))
}
