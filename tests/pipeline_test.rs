use anyhow::Result;
use apple_device_specs::config::PipelineConfig;
use apple_device_specs::document::Document;
use apple_device_specs::error::SpecsError;
use apple_device_specs::pipeline::Pipeline;
use apple_device_specs::sources::{OverrideSource, XcodeSource};
use apple_device_specs::types::{
    DeviceFamily, DeviceSource, PartialRecord, Sku, SourceKind, SourceOutput,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;

/// Serves canned records in place of a network source
struct StaticSource {
    kind: SourceKind,
    records: Vec<PartialRecord>,
}

#[async_trait::async_trait]
impl DeviceSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn collect(&self) -> apple_device_specs::error::Result<SourceOutput> {
        Ok(SourceOutput::new(self.kind, self.records.clone(), 0))
    }
}

struct FailingSource(SourceKind);

#[async_trait::async_trait]
impl DeviceSource for FailingSource {
    fn kind(&self) -> SourceKind {
        self.0
    }

    async fn collect(&self) -> apple_device_specs::error::Result<SourceOutput> {
        Err(SpecsError::fetch(self.0.as_str(), "HTTP 503"))
    }
}

fn create_device_db(path: &Path) -> Result<()> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE Devices (
            ProductDescription TEXT,
            ProductType TEXT,
            Target TEXT,
            DeviceTraitSet INTEGER
        );
        CREATE TABLE DeviceTraits (
            DeviceTraitSetID INTEGER PRIMARY KEY,
            DevicePerformanceMemoryClass INTEGER
        );
        INSERT INTO DeviceTraits VALUES (1, 4), (2, 8), (3, 3);
        INSERT INTO Devices VALUES
            ('iPhone 13', 'iPhone14,5', 'd17ap', 1),
            ('iPhone XR', 'iPhone11,8', 'n841ap', 3),
            ('iPad Air (5th generation)', 'iPad13,16', 'j407ap', 2),
            ('iPad Air (5th generation)', 'iPad13,17', 'j408ap', 2);
        "#,
    )?;
    Ok(())
}

fn apple_wiki_iphones() -> Vec<PartialRecord> {
    vec![
        PartialRecord::new("iPhone 13", SourceKind::AppleWiki)
            .with_chip("A15")
            .with_ram("4 GB"),
        PartialRecord::new("iPhone XR", SourceKind::AppleWiki)
            .with_chip("A12")
            .with_ram("3 GB"),
    ]
}

fn wikipedia_iphones() -> Vec<PartialRecord> {
    vec![PartialRecord::new("iPhone 13", SourceKind::Wikipedia)
        .with_release_date(NaiveDate::from_ymd_opt(2021, 9, 24).unwrap())]
}

fn iphone_pipeline(db: &Path, output: &Path) -> Pipeline {
    let mut config = PipelineConfig::defaults(DeviceFamily::IPhone);
    config.output_path = output.to_path_buf();
    config.source_endpoints.xcode_db_paths = vec![db.to_path_buf()];

    let sources: Vec<Box<dyn DeviceSource>> = vec![
        Box::new(XcodeSource::new(
            DeviceFamily::IPhone,
            config.source_endpoints.xcode_db_paths.clone(),
            config.source_endpoints.applications_dir.clone(),
        )),
        Box::new(StaticSource {
            kind: SourceKind::AppleWiki,
            records: apple_wiki_iphones(),
        }),
        Box::new(StaticSource {
            kind: SourceKind::Wikipedia,
            records: wikipedia_iphones(),
        }),
    ];
    Pipeline::with_sources(config, sources)
}

#[tokio::test]
async fn test_iphone_pipeline_filters_by_chip() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("device_traits.db");
    create_device_db(&db)?;
    let output = dir.path().join("apple").join("iPhone.json");

    let result = iphone_pipeline(&db, &output).run().await?;
    assert_eq!(result.written_devices, 1);
    assert_eq!(result.below_cutoff, vec!["iPhone XR".to_string()]);
    // database outside an Xcode bundle
    assert_eq!(result.xcode_version.as_deref(), Some("Unknown"));

    let doc = Document::load(&output)?;
    assert!(!doc.total_menu.contains_key("iPhone XR"));
    let iphone13 = &doc.total_menu["iPhone 13"];
    assert_eq!(iphone13.sku, Sku::Single("iPhone14,5".into()));
    assert_eq!(iphone13.chip, "A15");
    assert_eq!(iphone13.ram, "4 GB");
    assert_eq!(iphone13.release_date, NaiveDate::from_ymd_opt(2021, 9, 24));
    Ok(())
}

#[tokio::test]
async fn test_ipad_pipeline_keeps_every_sku() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("device_traits.db");
    create_device_db(&db)?;
    let output = dir.path().join("iPad.json");

    let mut config = PipelineConfig::defaults(DeviceFamily::IPad);
    config.output_path = output.clone();
    let sources: Vec<Box<dyn DeviceSource>> = vec![
        Box::new(XcodeSource::new(
            DeviceFamily::IPad,
            vec![db.clone()],
            config.source_endpoints.applications_dir.clone(),
        )),
        Box::new(StaticSource {
            kind: SourceKind::AppleWiki,
            records: vec![PartialRecord::new("iPad Air (5th generation)", SourceKind::AppleWiki)
                .with_chip("M1")],
        }),
        Box::new(OverrideSource::new(DeviceFamily::IPad)),
    ];

    let result = Pipeline::with_sources(config, sources).run().await?;
    assert_eq!(result.sources.len(), 3);

    let doc = Document::load(&output)?;
    let air = &doc.total_menu["iPad Air (5th generation)"];
    // database rows come back in descending product type order
    assert_eq!(air.sku, Sku::List(vec!["iPad13,17".into(), "iPad13,16".into()]));
    assert_eq!(air.chip, "M1");
    assert_eq!(air.ram, "8 GB");
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_identical_apart_from_timestamp() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("device_traits.db");
    create_device_db(&db)?;
    let output = dir.path().join("iPhone.json");

    iphone_pipeline(&db, &output).run().await?;
    let first = Document::load(&output)?;
    iphone_pipeline(&db, &output).run().await?;
    let second = Document::load(&output)?;

    assert_eq!(first.total_menu, second.total_menu);
    assert_eq!(first.xcode_version, second.xcode_version);
    assert_eq!(
        serde_json::to_string(&first.total_menu)?,
        serde_json::to_string(&second.total_menu)?
    );
    Ok(())
}

#[tokio::test]
async fn test_source_failure_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("apple").join("iPhone.json");

    let mut config = PipelineConfig::defaults(DeviceFamily::IPhone);
    config.output_path = output.clone();
    let sources: Vec<Box<dyn DeviceSource>> = vec![
        Box::new(StaticSource {
            kind: SourceKind::Xcode,
            records: vec![
                PartialRecord::new("iPhone 13", SourceKind::Xcode).with_sku("iPhone14,5")
            ],
        }),
        Box::new(FailingSource(SourceKind::AppleWiki)),
    ];

    let err = Pipeline::with_sources(config, sources).run().await.unwrap_err();
    assert!(matches!(err, SpecsError::Fetch { .. }));
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_run_keeps_previous_document() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("device_traits.db");
    create_device_db(&db)?;
    let output = dir.path().join("iPhone.json");

    iphone_pipeline(&db, &output).run().await?;
    let before = std::fs::read_to_string(&output)?;

    let mut config = PipelineConfig::defaults(DeviceFamily::IPhone);
    config.output_path = output.clone();
    let sources: Vec<Box<dyn DeviceSource>> = vec![Box::new(FailingSource(SourceKind::Wikipedia))];
    assert!(Pipeline::with_sources(config, sources).run().await.is_err());

    assert_eq!(std::fs::read_to_string(&output)?, before);
    Ok(())
}

#[tokio::test]
async fn test_missing_xcode_database_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("iPhone.json");

    let mut config = PipelineConfig::defaults(DeviceFamily::IPhone);
    config.output_path = output.clone();
    let sources: Vec<Box<dyn DeviceSource>> = vec![Box::new(XcodeSource::new(
        DeviceFamily::IPhone,
        Vec::new(),
        dir.path().join("Applications"),
    ))];

    let err = Pipeline::with_sources(config, sources).run().await.unwrap_err();
    assert!(matches!(err, SpecsError::Fetch { .. }));
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_mac_ram_defaults_from_chip_tier() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("Mac.json");

    let mut config = PipelineConfig::defaults(DeviceFamily::Mac);
    config.output_path = output.clone();
    let sources: Vec<Box<dyn DeviceSource>> = vec![
        Box::new(StaticSource {
            kind: SourceKind::Xcode,
            records: vec![
                PartialRecord::new("MacBook Pro (14-inch, Nov 2023)", SourceKind::Xcode)
                    .with_sku("Mac15,6"),
                PartialRecord::new("Mac Studio (2023)", SourceKind::Xcode).with_sku("Mac14,14"),
            ],
        }),
        Box::new(StaticSource {
            kind: SourceKind::AppleWiki,
            records: vec![
                PartialRecord::new("MacBook Pro (14-inch, Nov 2023)", SourceKind::AppleWiki)
                    .with_chip("M3 Pro"),
                PartialRecord::new("Mac Studio (2023)", SourceKind::AppleWiki)
                    .with_chip("M2 Ultra")
                    .with_ram("64 GB"),
            ],
        }),
    ];

    let result = Pipeline::with_sources(config, sources).run().await?;
    assert_eq!(
        result.defaulted_ram,
        vec!["MacBook Pro (14-inch, Nov 2023)".to_string()]
    );
    assert!(result.incomplete.is_empty());

    let doc = Document::load(&output)?;
    let pro = &doc.total_menu["MacBook Pro (14-inch, Nov 2023)"];
    assert_eq!(pro.ram, "16 GB");
    assert_eq!(pro.sku, Sku::List(vec!["Mac15,6".into()]));
    assert_eq!(doc.total_menu["Mac Studio (2023)"].ram, "64 GB");
    Ok(())
}
