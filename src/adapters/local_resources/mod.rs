// Local-first resource adapter - Self-hosted engine resources with a fallback

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::ports::*;

/// Resolves engine resources from a self-hosted directory, falling back to
/// `fallback_base` when the self-hosted copy cannot be read.
pub struct LocalFirstResources {
    self_hosted_dir: Option<PathBuf>,
    fallback_base: String,
}

impl LocalFirstResources {
    pub fn new(self_hosted_dir: Option<PathBuf>, fallback_base: impl Into<String>) -> Self {
        Self {
            self_hosted_dir,
            fallback_base: fallback_base.into(),
        }
    }

    /// Fallback location: `<base>/<name>`, or the bare name for an empty base
    fn fallback_location(&self, name: &str) -> String {
        let base = self.fallback_base.trim_end_matches('/');
        if base.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", base, name)
        }
    }
}

#[async_trait]
impl ResourcePort for LocalFirstResources {
    async fn acquire(&self, name: &str) -> Result<EngineResource, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ResourceUnavailable(
                "resource name is empty".to_string(),
            ));
        }

        if let Some(dir) = &self.self_hosted_dir {
            let path = dir.join(name);
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    debug!(resource = name, path = %path.display(), "Using self-hosted resource");
                    return Ok(EngineResource {
                        name: name.to_string(),
                        location: ResourceLocation::SelfHosted(path),
                    });
                }
                Ok(_) => debug!(path = %path.display(), "Self-hosted resource is not a file"),
                Err(e) => debug!(path = %path.display(), "Self-hosted resource unavailable: {}", e),
            }
        }

        let location = self.fallback_location(name);
        info!(resource = name, location = %location, "Using fallback resource");
        Ok(EngineResource {
            name: name.to_string(),
            location: ResourceLocation::Fallback(location),
        })
    }
}
