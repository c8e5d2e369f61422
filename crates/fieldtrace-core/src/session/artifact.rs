use std::time::SystemTime;

use crate::stages::{ArtifactKind, StageId};

/// Reference to the output of one successful stage run.
///
/// Artifacts are never mutated: a re-run mints a new one with a higher
/// `generation`, which is also the cache-defeating token in every URL.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub stage: StageId,
    pub name: &'static str,
    pub kind: ArtifactKind,
    pub preview: Option<&'static str>,
    pub generation: u64,
    pub generated_at: SystemTime,
}

impl Artifact {
    /// Retrieval URL for the artifact itself.
    pub fn url(&self, base_url: &str) -> String {
        let route = match self.kind {
            ArtifactKind::Image => "display",
            ArtifactKind::Document => "documents",
        };
        self.route_url(base_url, route, self.name)
    }

    /// Retrieval URL for the preview image, if the stage has one separate
    /// from its artifact.
    pub fn preview_url(&self, base_url: &str) -> Option<String> {
        self.preview
            .map(|name| self.route_url(base_url, "display", name))
    }

    /// Image the presentation layer should show for this stage.
    pub fn display_url(&self, base_url: &str) -> Option<String> {
        match self.kind {
            ArtifactKind::Image => Some(self.url(base_url)),
            ArtifactKind::Document => self.preview_url(base_url),
        }
    }

    fn route_url(&self, base_url: &str, route: &str, name: &str) -> String {
        format!(
            "{}/{route}/{}?v={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(name),
            self.generation
        )
    }
}
