//! Meshy - client for the Meshy 3D generation API
//!
//! This crate submits generation jobs to [Meshy](https://www.meshy.ai)
//! (texturing, text-to-3D, image-to-3D), polls them until they finish, and
//! lists or retrieves past jobs. Every job runs remotely; the client only
//! tracks it by the id the server hands back.
//!
//! ## Job Families
//!
//! | Family                 | Endpoint             | Version |
//! |------------------------|----------------------|---------|
//! | texture                | `text-to-texture`    | v1      |
//! | text-to-3d-legacy      | `text-to-3d`         | v1      |
//! | text-to-3d-preview     | `text-to-3d`         | v2      |
//! | text-to-3d-refine      | `text-to-3d`         | v2      |
//! | image-to-3d            | `image-to-3d`        | v1      |
//!
//! Account credits and subscription tier are available through
//! [`MeshyClient::credit_balance`] and [`MeshyClient::subscription`].
//!
//! ## Architecture
//!
//! ```text
//! TaskRequest
//!     ↓ validate (no network on failure)
//! MeshyClient::submit
//!     ├─ JSON body, or multipart when a file is attached
//!     └─ POST {base}/{version}/{root} → {"result": "<id>"}
//!     ↓
//! TaskRef (family + id)
//!     ↓
//! MeshyClient::poll
//!     ├─ GET {base}/{version}/{root}/{id}
//!     ├─ 429 → back off and retry
//!     ├─ PENDING / IN_PROGRESS → report, sleep, repeat
//!     └─ SUCCEEDED / FAILED / EXPIRED → return
//!     ↓
//! TaskResult (model_urls, texture_urls, task_error, ...)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshy::{MeshyClient, PreviewRequest, RefineRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key from MESHY_API_KEY or a .meshy file
//!     let client = MeshyClient::from_env()?;
//!     let cancel = CancellationToken::new();
//!
//!     // Untextured preview first
//!     let preview = client
//!         .submit_and_poll(
//!             &PreviewRequest::new("A wooden chair").into(),
//!             |r| println!("{}", r.progress_report()),
//!             &cancel,
//!         )
//!         .await?;
//!
//!     // Then texture it
//!     let refined = client
//!         .submit_and_poll(
//!             &RefineRequest::from_preview(&preview)?.into(),
//!             |r| println!("{}", r.progress_report()),
//!             &cancel,
//!         )
//!         .await?;
//!
//!     if let Some(glb) = refined.model_urls.and_then(|urls| urls.glb) {
//!         println!("Download: {}", glb);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod poller;
pub mod request;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use account::{CreditBalance, Subscription};
pub use auth::{ApiKey, API_KEY_ENV, CONFIG_FILE};
pub use cache::TaskCache;
pub use client::{ListQuery, MeshyClient, TaskRef};
pub use config::{ClientConfig, DEFAULT_DOMAIN, DEFAULT_POLLING_INTERVAL};
pub use endpoint::{ApiVersion, EndpointRouter, JobFamily, Operation};
pub use error::{MeshyError, Result};
pub use poller::PollHandle;
pub use request::{
    ArtStyle, BinaryPayload, ImageTo3DRequest, PreviewRequest, RefineRequest, Resolution,
    SourceRef, TaskRequest, TextTo3DLegacyRequest, TextureRequest, TextureRichness,
};
pub use transport::{HttpResponse, MultipartForm, RequestBody, ReqwestTransport, Transport};
pub use types::{
    ModelUrls, ProgressView, SortOrder, Status, TaskError, TaskId, TaskProgress, TaskResult,
    TextureUrls,
};
