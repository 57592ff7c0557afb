//! Source endpoints, file locations and other fixed names used across the crate.

// MediaWiki API of The Apple Wiki and the list pages per family
pub const APPLE_WIKI_API_URL: &str = "https://theapplewiki.com/api.php";
pub const APPLE_WIKI_IPHONE_PAGE: &str = "List_of_iPhones";
pub const APPLE_WIKI_IPAD_PAGE: &str = "List_of_iPads";
pub const APPLE_WIKI_MAC_PAGE: &str = "List_of_Macs";

pub const WIKIPEDIA_IPHONE_URL: &str = "https://en.wikipedia.org/wiki/List_of_iPhone_models";

// Wikipedia rejects requests without a descriptive agent
pub const USER_AGENT: &str = concat!(
    "apple_device_specs/",
    env!("CARGO_PKG_VERSION"),
    " (device spec generator)"
);

// Xcode layout
pub const APPLICATIONS_DIR: &str = "/Applications";
pub const DEVICE_TRAITS_DB_SUBPATH: &str =
    "Contents/Developer/Platforms/iPhoneOS.platform/usr/standalone/device_traits.db";
pub const XCODEBUILD_SUBPATH: &str = "Contents/Developer/usr/bin/xcodebuild";

// Output
pub const OUTPUT_DIR: &str = "apple";
pub const DEFAULT_CONFIG_FILE: &str = "device_specs.toml";

// Environment
pub const XCODE_DB_ENV: &str = "DEVICE_SPECS_XCODE_DB";

pub const DEFAULT_MATCH_CUTOFF: f64 = 0.85;

pub const UNKNOWN_VERSION: &str = "Unknown";
