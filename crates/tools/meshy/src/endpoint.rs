//! Endpoint routing
//!
//! Each job family lives under exactly one `(root, version)` pair on the
//! server. The mapping is an exhaustive match, so a family without a route
//! does not compile.

use crate::error::{MeshyError, Result};
use crate::types::TaskId;
use reqwest::Url;
use std::fmt;
use std::str::FromStr;

/// Generation mode a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobFamily {
    Texture,
    TextTo3DLegacy,
    TextTo3DPreview,
    TextTo3DRefine,
    ImageTo3D,
}

impl JobFamily {
    pub const ALL: [JobFamily; 5] = [
        JobFamily::Texture,
        JobFamily::TextTo3DLegacy,
        JobFamily::TextTo3DPreview,
        JobFamily::TextTo3DRefine,
        JobFamily::ImageTo3D,
    ];

    /// Path segment the family lives under
    pub fn root(&self) -> &'static str {
        match self {
            JobFamily::Texture => "text-to-texture",
            JobFamily::TextTo3DLegacy | JobFamily::TextTo3DPreview | JobFamily::TextTo3DRefine => {
                "text-to-3d"
            }
            JobFamily::ImageTo3D => "image-to-3d",
        }
    }

    pub fn version(&self) -> ApiVersion {
        match self {
            JobFamily::TextTo3DPreview | JobFamily::TextTo3DRefine => ApiVersion::V2,
            JobFamily::Texture | JobFamily::TextTo3DLegacy | JobFamily::ImageTo3D => {
                ApiVersion::V1
            }
        }
    }

    /// Whether the server can list tasks of this family.
    ///
    /// Image-to-3D listing is not offered by the API.
    pub fn supports_listing(&self) -> bool {
        !matches!(self, JobFamily::ImageTo3D)
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobFamily::Texture => "texture",
            JobFamily::TextTo3DLegacy => "text-to-3d-legacy",
            JobFamily::TextTo3DPreview => "text-to-3d-preview",
            JobFamily::TextTo3DRefine => "text-to-3d-refine",
            JobFamily::ImageTo3D => "image-to-3d",
        }
    }
}

impl fmt::Display for JobFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        JobFamily::ALL
            .into_iter()
            .find(|family| family.name() == normalized)
            .or(match normalized.as_str() {
                "text-to-texture" => Some(JobFamily::Texture),
                "preview" => Some(JobFamily::TextTo3DPreview),
                "refine" => Some(JobFamily::TextTo3DRefine),
                "legacy" => Some(JobFamily::TextTo3DLegacy),
                _ => None,
            })
            .ok_or_else(|| {
                format!(
                    "Unknown job family '{}' (expected one of: {})",
                    s,
                    JobFamily::ALL.map(|f| f.name()).join(", ")
                )
            })
    }
}

/// API generation a family is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

/// What a request does to a family's collection
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Create,
    List,
    Retrieve(&'a TaskId),
}

/// Builds fully qualified request URLs
#[derive(Debug, Clone)]
pub struct EndpointRouter {
    base_url: Url,
}

impl EndpointRouter {
    /// `base_url` is scheme and host, e.g. `https://api.meshy.ai`
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MeshyError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MeshyError::Config(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve the URL for `operation` on `family`, appending `query` pairs
    /// in the order given
    pub fn url(
        &self,
        family: JobFamily,
        operation: Operation<'_>,
        query: &[(&str, String)],
    ) -> String {
        match operation {
            Operation::Retrieve(id) => {
                self.resource_url(family.version(), &[family.root(), id.as_str()], query)
            }
            Operation::Create | Operation::List => {
                self.resource_url(family.version(), &[family.root()], query)
            }
        }
    }

    /// `{base}/{version}/{segments...}[?query]` for resources outside the
    /// task families, such as the account
    pub fn resource_url(
        &self,
        version: ApiVersion,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> String {
        let mut url = self.base_url.clone();

        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(version.as_str()).extend(segments);
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        url.to_string()
    }
}
