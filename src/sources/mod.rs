pub mod apple_wiki;
pub mod overrides;
pub mod wikipedia;
pub mod xcode;

pub use apple_wiki::AppleWikiSource;
pub use overrides::OverrideSource;
pub use wikipedia::WikipediaSource;
pub use xcode::XcodeSource;

use crate::config::PipelineConfig;
use crate::error::{Result, SpecsError};
use crate::http_client::HttpFetcher;
use crate::types::{DeviceSource, SourceKind};

/// Build the sources named in the pipeline's precedence list, in that order.
pub fn sources_for(config: &PipelineConfig) -> Result<Vec<Box<dyn DeviceSource>>> {
    let endpoints = &config.source_endpoints;
    let http = HttpFetcher::new()?;

    let mut sources: Vec<Box<dyn DeviceSource>> = Vec::with_capacity(config.precedence.len());
    for kind in &config.precedence {
        let source: Box<dyn DeviceSource> = match kind {
            SourceKind::Xcode => Box::new(XcodeSource::new(
                config.family,
                endpoints.xcode_db_paths.clone(),
                endpoints.applications_dir.clone(),
            )),
            SourceKind::AppleWiki => Box::new(AppleWikiSource::new(
                http.clone(),
                endpoints.apple_wiki_api.clone(),
                endpoints.apple_wiki_page.clone(),
                config.family,
            )),
            SourceKind::Wikipedia => {
                let url = endpoints.wikipedia_url.clone().ok_or_else(|| {
                    SpecsError::Config(format!(
                        "wikipedia is listed as a source for {} but no wikipedia_url is set",
                        config.family
                    ))
                })?;
                Box::new(WikipediaSource::new(http.clone(), url))
            }
            SourceKind::Overrides => Box::new(OverrideSource::new(config.family)),
        };
        sources.push(source);
    }
    Ok(sources)
}
