//! Request and response bodies shared by the server and the client.
//!
//! Field names match the JSON the HTTP API has always produced, so these
//! types double as the wire contract.

use serde::{Deserialize, Serialize};

// =============================================================================
// Errors
// =============================================================================

/// Body of every non-success response: `{"detail": "..."}`.
///
/// Clients surface `detail` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// =============================================================================
// Voice design (generation)
// =============================================================================

/// Inputs for a preview generated from a natural-language voice description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub description: String,
    #[serde(default = "PreviewRequest::default_sample_text")]
    pub sample_text: String,
    #[serde(default = "PreviewRequest::default_model_id")]
    pub model_id: String,
    #[serde(default = "PreviewRequest::default_temperature")]
    pub temperature: f64,
}

impl PreviewRequest {
    pub const DEFAULT_SAMPLE_TEXT: &'static str =
        "Hello, this is a preview of my custom voice. I hope you like how it sounds.";
    pub const DEFAULT_TEMPERATURE: f64 = 1.0;

    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sample_text: Self::default_sample_text(),
            model_id: Self::default_model_id(),
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn with_sample_text(mut self, text: impl Into<String>) -> Self {
        self.sample_text = text.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Form fields in the order the endpoint declares them.
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("description", self.description.clone()),
            ("sample_text", self.sample_text.clone()),
            ("model_id", self.model_id.clone()),
            ("temperature", self.temperature.to_string()),
        ]
    }

    fn default_sample_text() -> String {
        Self::DEFAULT_SAMPLE_TEXT.to_string()
    }

    fn default_model_id() -> String {
        default_voice_model().id
    }

    const fn default_temperature() -> f64 {
        Self::DEFAULT_TEMPERATURE
    }
}

/// Successful preview generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    /// Server-relative URL of the generated audio, e.g.
    /// `/api/previews/20260220/preview_abc123def456.wav`.
    pub audio_url: String,
    /// Audio length in seconds.
    pub duration: f64,
    pub model_id: String,
}

/// One entry of the voice design model catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceModelInfo {
    pub id: String,
    pub hf_name: String,
    pub name: String,
    /// 1-5, higher is better.
    pub quality: u8,
    /// 1-5, higher is faster.
    pub speed: u8,
    pub vram_gb: f64,
    pub download_gb: f64,
    pub description: String,
    pub sample_rate: u32,
    #[serde(default)]
    pub default: bool,
}

struct CatalogEntry {
    id: &'static str,
    hf_name: &'static str,
    name: &'static str,
    quality: u8,
    speed: u8,
    vram_gb: f64,
    download_gb: f64,
    description: &'static str,
    default: bool,
}

const CATALOG_SAMPLE_RATE: u32 = 44_100;

const CATALOG: [CatalogEntry; 3] = [
    CatalogEntry {
        id: "parler-mini-v1.1",
        hf_name: "parler-tts/parler-tts-mini-v1.1",
        name: "Parler Mini v1.1",
        quality: 4,
        speed: 4,
        vram_gb: 1.1,
        download_gb: 2.2,
        description: "Best balance of quality and speed. Good for most voices.",
        default: true,
    },
    CatalogEntry {
        id: "parler-large-v1",
        hf_name: "parler-tts/parler-tts-large-v1",
        name: "Parler Large v1",
        quality: 5,
        speed: 2,
        vram_gb: 2.3,
        download_gb: 4.5,
        description: "Highest quality but slow (~5-7 min). Rich detail, natural prosody, accurate accents.",
        default: false,
    },
    CatalogEntry {
        id: "parler-mini-v1",
        hf_name: "parler-tts/parler-tts-mini-v1",
        name: "Parler Mini v1",
        quality: 3,
        speed: 4,
        vram_gb: 1.1,
        download_gb: 2.2,
        description: "Fast generation, smaller download. Some mispronunciations. Good for quick tests.",
        default: false,
    },
];

impl From<&CatalogEntry> for VoiceModelInfo {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            hf_name: entry.hf_name.to_string(),
            name: entry.name.to_string(),
            quality: entry.quality,
            speed: entry.speed,
            vram_gb: entry.vram_gb,
            download_gb: entry.download_gb,
            description: entry.description.to_string(),
            sample_rate: CATALOG_SAMPLE_RATE,
            default: entry.default,
        }
    }
}

/// All known voice design models.
pub fn voice_model_catalog() -> Vec<VoiceModelInfo> {
    CATALOG.iter().map(VoiceModelInfo::from).collect()
}

/// Look up a catalogue model by id.
pub fn find_voice_model(id: &str) -> Option<VoiceModelInfo> {
    CATALOG
        .iter()
        .find(|entry| entry.id == id)
        .map(VoiceModelInfo::from)
}

/// The model used when a request does not name one.
pub fn default_voice_model() -> VoiceModelInfo {
    let entry = CATALOG
        .iter()
        .find(|entry| entry.default)
        .unwrap_or(&CATALOG[0]);
    VoiceModelInfo::from(entry)
}

/// `GET /api/voices/create/parler-status`.
///
/// `models` is empty when the design backend is not installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlerStatus {
    pub available: bool,
    #[serde(default)]
    pub models: Vec<VoiceModelInfo>,
}

// =============================================================================
// Install / repair
// =============================================================================

/// Result of an engine install or the CUDA repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInstallResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    pub message: String,
}

impl EngineInstallResult {
    pub fn ok(engine: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            engine: engine.map(str::to_string),
            message: message.into(),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub gpu_available: bool,
    pub gpu_name: Option<String>,
}

/// `GET /api/gpu/status`.
///
/// When `available` is false only `error` is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_total_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_free_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_utilization: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GpuStatus {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// External collaborators (consumed as plain request/response)
// =============================================================================

/// `GET /api/tts/engines` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub supports_cloning: bool,
    pub supports_emotion: bool,
    pub required_vram_gb: f64,
    #[serde(default)]
    pub builtin_voices: Vec<String>,
    pub loaded: bool,
}

/// `GET /api/voices` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub engine: String,
    pub created_at: String,
}
