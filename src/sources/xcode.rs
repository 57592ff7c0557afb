use crate::constants::{DEVICE_TRAITS_DB_SUBPATH, UNKNOWN_VERSION, XCODEBUILD_SUBPATH};
use crate::error::{Result, SpecsError};
use crate::sources::overrides::board_chip;
use crate::types::{DeviceFamily, DeviceSource, PartialRecord, SourceKind, SourceOutput};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, instrument, warn};

static VARIANT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-[A-Z]$").expect("valid suffix regex"));

const DEVICE_QUERY: &str = r#"
    SELECT
        d.ProductDescription,
        d.ProductType,
        d.Target,
        dt.DevicePerformanceMemoryClass
    FROM Devices d
    LEFT JOIN DeviceTraits dt ON d.DeviceTraitSet = dt.DeviceTraitSetID
    WHERE d.ProductType LIKE ?1
    ORDER BY d.ProductType DESC
"#;

/// A `device_traits.db` and the Xcode bundle it ships in, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcodeDatabase {
    pub path: PathBuf,
    pub label: String,
    pub app_root: Option<PathBuf>,
}

impl XcodeDatabase {
    /// Describe a database given by path, finding the enclosing `.app` bundle.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let app_root = path
            .ancestors()
            .find(|p| p.extension().is_some_and(|ext| ext == "app"))
            .map(Path::to_path_buf);
        let label = app_root
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "Xcode".to_string());
        Self {
            path,
            label,
            app_root,
        }
    }

    /// Version reported by the bundle's `xcodebuild`, then the bundle name.
    pub fn version(&self) -> String {
        self.app_root
            .as_deref()
            .and_then(xcodebuild_version)
            .unwrap_or_else(|| {
                if self.app_root.is_some() {
                    self.label.clone()
                } else {
                    UNKNOWN_VERSION.to_string()
                }
            })
    }
}

/// Every `Xcode*.app` under `applications_dir` that carries a device database,
/// sorted by bundle name.
pub fn discover_databases(applications_dir: &Path) -> Vec<XcodeDatabase> {
    let Ok(entries) = fs::read_dir(applications_dir) else {
        debug!("Cannot read {}", applications_dir.display());
        return Vec::new();
    };

    let mut found: Vec<XcodeDatabase> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.starts_with("Xcode") && name.ends_with(".app"))
        })
        .map(|app| app.join(DEVICE_TRAITS_DB_SUBPATH))
        .filter(|db| db.is_file())
        .map(XcodeDatabase::from_path)
        .collect();

    found.sort_by(|a, b| a.label.cmp(&b.label));
    found
}

/// Prefer a beta or developer build, otherwise the last bundle by name.
pub fn select_database(mut candidates: Vec<XcodeDatabase>) -> Option<XcodeDatabase> {
    candidates.sort_by(|a, b| a.label.cmp(&b.label));
    let preferred = candidates
        .iter()
        .position(|db| {
            let label = db.label.to_lowercase();
            label.contains("beta") || label.contains("developer")
        });
    match preferred {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.pop(),
    }
}

fn xcodebuild_version(app_root: &Path) -> Option<String> {
    let xcodebuild = app_root.join(XCODEBUILD_SUBPATH);
    if !xcodebuild.is_file() {
        return None;
    }
    match Command::new(&xcodebuild).arg("-version").output() {
        Ok(output) if output.status.success() => {
            parse_xcodebuild_version(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            warn!("xcodebuild -version exited with {}", output.status);
            None
        }
        Err(e) => {
            warn!("Failed to run {}: {}", xcodebuild.display(), e);
            None
        }
    }
}

/// `"Xcode 16.0\nBuild version 16A242d"` becomes `"Version 16.0 (16A242d)"`.
pub fn parse_xcodebuild_version(output: &str) -> Option<String> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let version = lines.next()?.replacen("Xcode ", "Version ", 1);
    let build = lines.next()?.replacen("Build version ", "", 1);
    Some(format!("{version} ({build})"))
}

/// One row of the `Devices` table joined with its traits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcodeRow {
    pub description: String,
    pub product_type: String,
    pub target: Option<String>,
    pub memory_class: Option<i64>,
}

pub fn read_rows(db_path: &Path, family: DeviceFamily) -> Result<Vec<XcodeRow>> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(DEVICE_QUERY)?;
    let pattern = format!("{}%", family.display_name());
    let rows = stmt.query_map(params![pattern], |row| {
        Ok(XcodeRow {
            description: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            product_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            target: row.get::<_, Option<String>>(2)?,
            // Some Xcode releases store the class as text
            memory_class: row.get::<_, Option<i64>>(3).ok().flatten(),
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Turn device rows into partial records carrying SKU, board chip and RAM class.
pub fn rows_to_records(rows: &[XcodeRow], family: DeviceFamily) -> (Vec<PartialRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in rows {
        let name = row.description.trim();
        let product_type = row.product_type.trim();
        if name.is_empty() || product_type.is_empty() {
            debug!("Skipping Xcode row without description or product type: {:?}", row);
            skipped += 1;
            continue;
        }

        let sku = VARIANT_SUFFIX.replace(product_type, "").to_string();
        let mut record = PartialRecord::new(name, SourceKind::Xcode).with_sku(sku);
        record.chip = row
            .target
            .as_deref()
            .and_then(|target| board_chip(family, target))
            .map(str::to_string);
        record.ram = row
            .memory_class
            .filter(|class| *class > 0)
            .map(|class| format!("{class} GB"));
        records.push(record);
    }

    (records, skipped)
}

/// SKUs (product types) from the device database bundled with Xcode
pub struct XcodeSource {
    family: DeviceFamily,
    explicit_paths: Vec<PathBuf>,
    applications_dir: PathBuf,
}

impl XcodeSource {
    pub fn new(
        family: DeviceFamily,
        explicit_paths: Vec<PathBuf>,
        applications_dir: PathBuf,
    ) -> Self {
        Self {
            family,
            explicit_paths,
            applications_dir,
        }
    }

    /// Configured paths win over scanning the applications directory.
    pub fn locate(&self) -> Result<XcodeDatabase> {
        let candidates = if self.explicit_paths.is_empty() {
            discover_databases(&self.applications_dir)
        } else {
            self.explicit_paths
                .iter()
                .filter(|path| path.is_file())
                .map(XcodeDatabase::from_path)
                .collect()
        };

        for db in &candidates {
            info!("Found Xcode database {} ({})", db.label, db.path.display());
        }

        select_database(candidates).ok_or_else(|| {
            SpecsError::fetch(
                SourceKind::Xcode.as_str(),
                format!(
                    "no device_traits.db found (searched {})",
                    if self.explicit_paths.is_empty() {
                        self.applications_dir.display().to_string()
                    } else {
                        format!("{:?}", self.explicit_paths)
                    }
                ),
            )
        })
    }
}

#[async_trait::async_trait]
impl DeviceSource for XcodeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Xcode
    }

    #[instrument(skip(self), fields(family = %self.family))]
    async fn collect(&self) -> Result<SourceOutput> {
        let db = self.locate()?;
        info!("Using {} database at {}", db.label, db.path.display());

        let rows = read_rows(&db.path, self.family)?;
        let (records, skipped) = rows_to_records(&rows, self.family);
        info!(
            "Read {} {} rows from Xcode ({} skipped)",
            records.len(),
            self.family,
            skipped
        );

        let mut output = SourceOutput::new(SourceKind::Xcode, records, skipped);
        output.provenance = Some(db.version());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_fixture_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE Devices (
                ProductDescription TEXT,
                ProductType TEXT,
                Target TEXT,
                Platform TEXT,
                DeviceTraitSet INTEGER
            );
            CREATE TABLE DeviceTraits (
                DeviceTraitSetID INTEGER PRIMARY KEY,
                DevicePerformanceMemoryClass INTEGER
            );
            INSERT INTO DeviceTraits VALUES (1, 4), (2, 8), (3, 0);
            INSERT INTO Devices VALUES
                ('iPhone 13', 'iPhone14,5', 'd17ap', 'iphoneos', 1),
                ('iPhone XR', 'iPhone11,8', 'n841ap', 'iphoneos', 3),
                ('iPad Air (5th generation)', 'iPad13,16', 'j407ap', 'iphoneos', 2),
                ('iPad Air (5th generation)', 'iPad13,17-A', 'j408ap', 'iphoneos', 2),
                ('', 'iPad99,1', 'x', 'iphoneos', NULL);
            "#,
        )
        .unwrap();
    }

    #[test]
    fn test_read_rows_filters_by_family() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("device_traits.db");
        create_fixture_db(&db_path);

        let rows = read_rows(&db_path, DeviceFamily::IPhone).unwrap();
        assert_eq!(rows.len(), 2);
        // ordered by ProductType DESC
        assert_eq!(rows[0].product_type, "iPhone14,5");
        assert_eq!(rows[0].memory_class, Some(4));
        assert_eq!(rows[1].description, "iPhone XR");
    }

    #[test]
    fn test_rows_to_records_for_ipad() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("device_traits.db");
        create_fixture_db(&db_path);

        let rows = read_rows(&db_path, DeviceFamily::IPad).unwrap();
        let (records, skipped) = rows_to_records(&rows, DeviceFamily::IPad);
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 2);

        let skus: Vec<&str> = records.iter().map(|r| r.sku[0].as_str()).collect();
        assert!(skus.contains(&"iPad13,16"));
        // trailing variant letter is stripped
        assert!(skus.contains(&"iPad13,17"));

        let air = records.iter().find(|r| r.sku[0] == "iPad13,16").unwrap();
        assert_eq!(air.name, "iPad Air (5th generation)");
        assert_eq!(air.chip.as_deref(), Some("M1"));
        assert_eq!(air.ram.as_deref(), Some("8 GB"));
    }

    #[test]
    fn test_zero_memory_class_gives_no_ram() {
        let rows = vec![XcodeRow {
            description: "iPhone XR".into(),
            product_type: "iPhone11,8".into(),
            target: None,
            memory_class: Some(0),
        }];
        let (records, _) = rows_to_records(&rows, DeviceFamily::IPhone);
        assert_eq!(records[0].ram, None);
        assert_eq!(records[0].chip, None);
    }

    #[test]
    fn test_select_database_prefers_beta() {
        let stable = XcodeDatabase::from_path("/Applications/Xcode.app/db");
        let beta = XcodeDatabase::from_path("/Applications/Xcode-Beta.app/db");
        let chosen = select_database(vec![beta.clone(), stable.clone()]).unwrap();
        assert_eq!(chosen, beta);

        let older = XcodeDatabase::from_path("/Applications/Xcode-15.4.app/db");
        let chosen = select_database(vec![older.clone(), stable]).unwrap();
        assert_eq!(chosen, older);
        assert!(select_database(Vec::new()).is_none());
    }

    #[test]
    fn test_select_database_prefers_lowercase_beta() {
        // name order alone would pick Xcode_16, which sorts after Xcode-beta
        let beta = XcodeDatabase::from_path("/Applications/Xcode-beta.app/db");
        let later = XcodeDatabase::from_path("/Applications/Xcode_16.app/db");
        let chosen = select_database(vec![later, beta.clone()]).unwrap();
        assert_eq!(chosen, beta);
    }

    #[test]
    fn test_from_path_finds_app_bundle() {
        let db = XcodeDatabase::from_path(
            Path::new("/Applications/Xcode-beta.app").join(DEVICE_TRAITS_DB_SUBPATH),
        );
        assert_eq!(db.label, "Xcode-beta");
        assert_eq!(db.app_root, Some(PathBuf::from("/Applications/Xcode-beta.app")));

        let loose = XcodeDatabase::from_path("/tmp/device_traits.db");
        assert_eq!(loose.app_root, None);
        assert_eq!(loose.version(), UNKNOWN_VERSION);
    }

    #[test]
    fn test_discover_databases() {
        let dir = tempdir().unwrap();
        for app in ["Xcode.app", "Xcode-beta.app", "Other.app"] {
            let db = dir.path().join(app).join(DEVICE_TRAITS_DB_SUBPATH);
            fs::create_dir_all(db.parent().unwrap()).unwrap();
            fs::write(&db, b"").unwrap();
        }
        fs::create_dir_all(dir.path().join("Xcode-empty.app")).unwrap();

        let found = discover_databases(dir.path());
        let labels: Vec<&str> = found.iter().map(|db| db.label.as_str()).collect();
        assert_eq!(labels, vec!["Xcode", "Xcode-beta"]);
    }

    #[test]
    fn test_parse_xcodebuild_version() {
        assert_eq!(
            parse_xcodebuild_version("Xcode 16.0\nBuild version 16A242d\n").as_deref(),
            Some("Version 16.0 (16A242d)")
        );
        assert_eq!(parse_xcodebuild_version("garbage"), None);
    }
}
