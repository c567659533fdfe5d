//! Task requests for every job family
//!
//! A [`TaskRequest`] is a closed enum; each variant carries only the fields
//! its family understands. Requests serialise to the JSON body the server
//! expects, with `None` fields omitted. Requests that carry a binary payload
//! are sent as multipart forms instead, see [`TaskRequest::to_body`].

use crate::endpoint::JobFamily;
use crate::error::{MeshyError, Result};
use crate::transport::{MultipartForm, RequestBody};
use crate::types::{Status, TaskId, TaskResult};
use serde::{Serialize, Serializer};
use std::path::Path;

/// Art style of the generated asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtStyle {
    Realistic,
    /// Not accepted by text-to-texture tasks; disables PBR maps
    Voxel,
    #[serde(rename = "fake-3d-cartoon")]
    Fake3DCartoon,
    JapaneseAnime,
    CartoonLineArt,
    RealisticHandDrawn,
    #[serde(rename = "fake-3d-hand-drawn")]
    Fake3DHandDrawn,
    OrientalComicInk,
    /// v2 text-to-3D only
    Sculpture,
    /// v2 text-to-3D only
    Pbr,
}

impl ArtStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtStyle::Realistic => "realistic",
            ArtStyle::Voxel => "voxel",
            ArtStyle::Fake3DCartoon => "fake-3d-cartoon",
            ArtStyle::JapaneseAnime => "japanese-anime",
            ArtStyle::CartoonLineArt => "cartoon-line-art",
            ArtStyle::RealisticHandDrawn => "realistic-hand-drawn",
            ArtStyle::Fake3DHandDrawn => "fake-3d-hand-drawn",
            ArtStyle::OrientalComicInk => "oriental-comic-ink",
            ArtStyle::Sculpture => "sculpture",
            ArtStyle::Pbr => "pbr",
        }
    }
}

impl std::str::FromStr for ArtStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [ArtStyle; 10] = [
            ArtStyle::Realistic,
            ArtStyle::Voxel,
            ArtStyle::Fake3DCartoon,
            ArtStyle::JapaneseAnime,
            ArtStyle::CartoonLineArt,
            ArtStyle::RealisticHandDrawn,
            ArtStyle::Fake3DHandDrawn,
            ArtStyle::OrientalComicInk,
            ArtStyle::Sculpture,
            ArtStyle::Pbr,
        ];
        ALL.into_iter()
            .find(|style| style.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown art style '{}'", s))
    }
}

/// Texture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    #[serde(rename = "1024")]
    X1024,
    #[serde(rename = "2048")]
    X2048,
    #[serde(rename = "4096")]
    X4096,
}

/// Texture detail for refine tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureRichness {
    High,
    #[default]
    Medium,
    Low,
    None,
}

impl std::str::FromStr for TextureRichness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(TextureRichness::High),
            "medium" => Ok(TextureRichness::Medium),
            "low" => Ok(TextureRichness::Low),
            "none" => Ok(TextureRichness::None),
            other => Err(format!("Unknown texture richness '{}'", other)),
        }
    }
}

/// File uploaded alongside a request
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl BinaryPayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Read a payload from disk, naming it after the file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

impl std::fmt::Debug for BinaryPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryPayload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "obj" => "model/obj",
        "fbx" | "stl" => "application/octet-stream",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Where the server finds the input asset: an upload, a URL, or nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceRef {
    Binary(BinaryPayload),
    Url(String),
    #[default]
    None,
}

impl SourceRef {
    fn is_not_url(&self) -> bool {
        !matches!(self, SourceRef::Url(_))
    }

    fn serialize_url<S: Serializer>(
        source: &SourceRef,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match source {
            SourceRef::Url(url) => serializer.serialize_str(url),
            _ => serializer.serialize_none(),
        }
    }

    fn binary(&self) -> Option<&BinaryPayload> {
        match self {
            SourceRef::Binary(payload) => Some(payload),
            _ => None,
        }
    }

    fn check(&self, what: &str) -> Result<()> {
        match self {
            SourceRef::None => Err(MeshyError::Validation(format!(
                "missing {} reference (URL or file)",
                what
            ))),
            SourceRef::Url(url) if url.trim().is_empty() => Err(MeshyError::Validation(
                format!("{} URL cannot be empty", what),
            )),
            SourceRef::Binary(payload) if payload.bytes.is_empty() => Err(
                MeshyError::Validation(format!("{} file '{}' is empty", what, payload.file_name)),
            ),
            _ => Ok(()),
        }
    }
}

/// Texture an existing model from text prompts
#[derive(Debug, Clone, Serialize)]
pub struct TextureRequest {
    #[serde(
        rename = "model_url",
        skip_serializing_if = "SourceRef::is_not_url",
        serialize_with = "SourceRef::serialize_url"
    )]
    pub model: SourceRef,

    /// What kind of object the model is
    pub object_prompt: String,

    /// Desired style of the object
    pub style_prompt: String,

    /// Reuse the model's UVs instead of generating new ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_original_uv: Option<bool>,

    /// Generate metallic, roughness and normal maps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pbr: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_style: Option<ArtStyle>,
}

impl TextureRequest {
    pub fn new(object_prompt: impl Into<String>, style_prompt: impl Into<String>) -> Self {
        Self {
            model: SourceRef::None,
            object_prompt: object_prompt.into(),
            style_prompt: style_prompt.into(),
            enable_original_uv: Some(true),
            enable_pbr: Some(true),
            negative_prompt: None,
            resolution: None,
            art_style: None,
        }
    }

    pub fn with_model_url(mut self, url: impl Into<String>) -> Self {
        self.model = SourceRef::Url(url.into());
        self
    }

    pub fn with_model_file(mut self, payload: BinaryPayload) -> Self {
        self.model = SourceRef::Binary(payload);
        self
    }

    pub fn with_original_uv(mut self, enable: bool) -> Self {
        self.enable_original_uv = Some(enable);
        self
    }

    pub fn with_pbr(mut self, enable: bool) -> Self {
        self.enable_pbr = Some(enable);
        self
    }

    pub fn with_negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_art_style(mut self, style: ArtStyle) -> Self {
        self.art_style = Some(style);
        self
    }
}

/// First generation text-to-3D task (v1)
#[derive(Debug, Clone, Serialize)]
pub struct TextTo3DLegacyRequest {
    pub object_prompt: String,
    pub style_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pbr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_style: Option<ArtStyle>,
}

impl TextTo3DLegacyRequest {
    pub fn new(object_prompt: impl Into<String>, style_prompt: impl Into<String>) -> Self {
        Self {
            object_prompt: object_prompt.into(),
            style_prompt: style_prompt.into(),
            enable_pbr: Some(true),
            negative_prompt: None,
            resolution: None,
            art_style: None,
        }
    }

    pub fn with_pbr(mut self, enable: bool) -> Self {
        self.enable_pbr = Some(enable);
        self
    }

    pub fn with_negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_art_style(mut self, style: ArtStyle) -> Self {
        self.art_style = Some(style);
        self
    }
}

/// Untextured draft model (v2, `mode = preview`)
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_style: Option<ArtStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl PreviewRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            art_style: None,
            seed: None,
        }
    }

    pub fn with_negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }

    pub fn with_art_style(mut self, style: ArtStyle) -> Self {
        self.art_style = Some(style);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Texture a finished preview task (v2, `mode = refine`)
#[derive(Debug, Clone, Serialize)]
pub struct RefineRequest {
    pub preview_task_id: TaskId,
    pub texture_richness: TextureRichness,
}

impl RefineRequest {
    /// Refine by id; the id must name a preview task
    pub fn new(preview_task_id: impl Into<TaskId>) -> Self {
        Self {
            preview_task_id: preview_task_id.into(),
            texture_richness: TextureRichness::default(),
        }
    }

    /// Refine a preview result, checking that it is a finished preview
    pub fn from_preview(preview: &TaskResult) -> Result<Self> {
        if let Some(mode) = preview.mode.as_deref() {
            if mode != "preview" {
                return Err(MeshyError::Validation(format!(
                    "task {} is a '{}' task, only preview tasks can be refined",
                    preview.id, mode
                )));
            }
        }
        if preview.status != Status::Succeeded {
            return Err(MeshyError::Validation(format!(
                "preview task {} has status {}, expected SUCCEEDED",
                preview.id, preview.status
            )));
        }
        Ok(Self::new(preview.id.clone()))
    }

    pub fn with_texture_richness(mut self, richness: TextureRichness) -> Self {
        self.texture_richness = richness;
        self
    }
}

/// Turn a single image into a 3D model
#[derive(Debug, Clone, Serialize)]
pub struct ImageTo3DRequest {
    #[serde(
        rename = "image_url",
        skip_serializing_if = "SourceRef::is_not_url",
        serialize_with = "SourceRef::serialize_url"
    )]
    pub image: SourceRef,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pbr: Option<bool>,
}

impl ImageTo3DRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            image: SourceRef::Url(url.into()),
            enable_pbr: Some(true),
        }
    }

    pub fn from_file(payload: BinaryPayload) -> Self {
        Self {
            image: SourceRef::Binary(payload),
            enable_pbr: Some(true),
        }
    }

    pub fn with_pbr(mut self, enable: bool) -> Self {
        self.enable_pbr = Some(enable);
        self
    }
}

/// A generation job of any family
#[derive(Debug, Clone)]
pub enum TaskRequest {
    Texture(TextureRequest),
    TextTo3DLegacy(TextTo3DLegacyRequest),
    TextTo3DPreview(PreviewRequest),
    TextTo3DRefine(RefineRequest),
    ImageTo3D(ImageTo3DRequest),
}

impl TaskRequest {
    pub fn family(&self) -> JobFamily {
        match self {
            TaskRequest::Texture(_) => JobFamily::Texture,
            TaskRequest::TextTo3DLegacy(_) => JobFamily::TextTo3DLegacy,
            TaskRequest::TextTo3DPreview(_) => JobFamily::TextTo3DPreview,
            TaskRequest::TextTo3DRefine(_) => JobFamily::TextTo3DRefine,
            TaskRequest::ImageTo3D(_) => JobFamily::ImageTo3D,
        }
    }

    /// Structural checks done before any network call
    pub fn validate(&self) -> Result<()> {
        match self {
            TaskRequest::Texture(r) => {
                require("object_prompt", &r.object_prompt)?;
                require("style_prompt", &r.style_prompt)?;
                r.model.check("model")
            }
            TaskRequest::TextTo3DLegacy(r) => {
                require("object_prompt", &r.object_prompt)?;
                require("style_prompt", &r.style_prompt)
            }
            TaskRequest::TextTo3DPreview(r) => require("prompt", &r.prompt),
            TaskRequest::TextTo3DRefine(r) => require("preview_task_id", r.preview_task_id.as_str()),
            TaskRequest::ImageTo3D(r) => r.image.check("image"),
        }
    }

    /// Multipart file field name and payload, if this request uploads a file
    pub fn binary_payload(&self) -> Option<(&'static str, &BinaryPayload)> {
        match self {
            TaskRequest::Texture(r) => r.model.binary().map(|p| ("model_file", p)),
            TaskRequest::ImageTo3D(r) => r.image.binary().map(|p| ("image_file", p)),
            _ => None,
        }
    }

    /// JSON object of all non-null scalar fields
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        let (value, mode) = match self {
            TaskRequest::Texture(r) => (serde_json::to_value(r), None),
            TaskRequest::TextTo3DLegacy(r) => (serde_json::to_value(r), None),
            TaskRequest::TextTo3DPreview(r) => (serde_json::to_value(r), Some("preview")),
            TaskRequest::TextTo3DRefine(r) => (serde_json::to_value(r), Some("refine")),
            TaskRequest::ImageTo3D(r) => (serde_json::to_value(r), None),
        };
        let mut value = value
            .map_err(|e| MeshyError::Validation(format!("request is not serializable: {}", e)))?;

        if let (Some(mode), Some(object)) = (mode, value.as_object_mut()) {
            object.insert("mode".to_string(), serde_json::Value::from(mode));
        }
        Ok(value)
    }

    /// Encode the request body: multipart when a file is attached, JSON
    /// otherwise
    pub fn to_body(&self) -> Result<RequestBody> {
        let value = self.to_json_value()?;

        let Some((field, payload)) = self.binary_payload() else {
            return Ok(RequestBody::Json(value.to_string()));
        };

        let mut form = MultipartForm::new().file(field, payload.clone());
        if let serde_json::Value::Object(fields) = value {
            for (name, value) in fields {
                let text = match value {
                    serde_json::Value::Null => continue,
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                form = form.text(name, text);
            }
        }
        Ok(RequestBody::Multipart(form))
    }
}

impl From<TextureRequest> for TaskRequest {
    fn from(r: TextureRequest) -> Self {
        TaskRequest::Texture(r)
    }
}

impl From<TextTo3DLegacyRequest> for TaskRequest {
    fn from(r: TextTo3DLegacyRequest) -> Self {
        TaskRequest::TextTo3DLegacy(r)
    }
}

impl From<PreviewRequest> for TaskRequest {
    fn from(r: PreviewRequest) -> Self {
        TaskRequest::TextTo3DPreview(r)
    }
}

impl From<RefineRequest> for TaskRequest {
    fn from(r: RefineRequest) -> Self {
        TaskRequest::TextTo3DRefine(r)
    }
}

impl From<ImageTo3DRequest> for TaskRequest {
    fn from(r: ImageTo3DRequest) -> Self {
        TaskRequest::ImageTo3D(r)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MeshyError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}
