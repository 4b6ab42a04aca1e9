//! Messages carried on the progress event channel.
//!
//! The channel payload is deliberately schemaless: a JSON object with a
//! mandatory `type` discriminator and whatever fields that type carries.
//! Consumers look at the types they understand and ignore the rest, so a
//! server can add new message types without breaking older clients.
//!
//! # Wire Format
//!
//! ```json
//! {"type": "progress", "stage": "loading_model", "message": "Loading tokenizer...", "percent": 80}
//! {"type": "install_progress", "engine": "kokoro", "stage": "installing", "message": "Collecting kokoro"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced when a raw channel payload cannot be decoded.
///
/// Decode errors are never fatal: the receive loop drops the payload and
/// carries on without touching connection state.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The payload was JSON but not an object.
    #[error("Channel message must be a JSON object")]
    NotAnObject,

    /// The object had no string `type` field.
    #[error("Missing or invalid 'type' field")]
    MissingType,
}

/// A decoded message from the progress event channel.
///
/// Wraps the raw JSON object. The `type` field is guaranteed to be present
/// and to be a string; every other field is type-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ChannelMessage {
    fields: Map<String, Value>,
}

impl ChannelMessage {
    /// Discriminator for generation progress messages.
    pub const PROGRESS: &'static str = "progress";

    /// Discriminator for engine install / repair progress messages.
    pub const INSTALL_PROGRESS: &'static str = "install_progress";

    /// Create an empty message of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::String(kind.into()));
        Self { fields }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Decode a raw UTF-8 text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(fields) => Self::try_from(fields),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// The `type` discriminator.
    pub fn kind(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Whether this message has the given `type`.
    pub fn is(&self, kind: &str) -> bool {
        self.kind() == kind
    }

    /// Raw access to a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A string field, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// A numeric field, if present and a number.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// All fields, including `type`.
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Build a generation `progress` message.
    ///
    /// `percent` is on the 0–100 scale the server has always emitted.
    pub fn progress(stage: &str, message: impl Into<String>, percent: u8) -> Self {
        Self::new(Self::PROGRESS)
            .with("stage", stage)
            .with("message", message.into())
            .with("percent", percent.min(100))
    }

    /// Build an `install_progress` message.
    pub fn install_progress(engine: &str, stage: InstallStage, message: impl Into<String>) -> Self {
        Self::new(Self::INSTALL_PROGRESS)
            .with("engine", engine)
            .with("stage", stage.as_str())
            .with("message", message.into())
    }

    /// View this message as a generation progress update.
    ///
    /// Returns `None` for any other message type.
    pub fn as_progress(&self) -> Option<ProgressUpdate> {
        if !self.is(Self::PROGRESS) {
            return None;
        }

        let fraction = self
            .f64_field("progress")
            .or_else(|| self.f64_field("percent").map(|p| p / 100.0))
            .filter(|f| f.is_finite())
            .map(|f| f.clamp(0.0, 1.0));

        Some(ProgressUpdate {
            message: self.str_field("message").unwrap_or_default().to_string(),
            fraction,
            stage: self.str_field("stage").map(str::to_string),
            engine: self.str_field("engine").map(str::to_string),
        })
    }

    /// View this message as an install progress update.
    ///
    /// Returns `None` for other message types, and for install messages
    /// with no engine identifier or an unrecognised stage.
    pub fn as_install_progress(&self) -> Option<InstallProgress> {
        if !self.is(Self::INSTALL_PROGRESS) {
            return None;
        }

        Some(InstallProgress {
            engine: self.str_field("engine")?.to_string(),
            stage: InstallStage::parse(self.str_field("stage")?)?,
            message: self.str_field("message").unwrap_or_default().to_string(),
        })
    }
}

impl TryFrom<Map<String, Value>> for ChannelMessage {
    type Error = DecodeError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("type") {
            Some(Value::String(_)) => Ok(Self { fields }),
            _ => Err(DecodeError::MissingType),
        }
    }
}

impl From<ChannelMessage> for Map<String, Value> {
    fn from(message: ChannelMessage) -> Self {
        message.fields
    }
}

/// Typed view of a `progress` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Human-readable status line.
    pub message: String,
    /// Completion in `0.0..=1.0`, when the message carried one.
    pub fraction: Option<f64>,
    /// Server-side stage name (`loading_model`, `generating`, `complete`, ...).
    pub stage: Option<String>,
    /// Engine name, when the emitter set one.
    pub engine: Option<String>,
}

/// Stage of an install / repair operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStage {
    /// The operation was accepted and is preparing.
    Starting,
    /// Package manager output is streaming.
    Installing,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Error,
}

impl InstallStage {
    /// Parse a wire stage name.
    pub fn parse(stage: &str) -> Option<Self> {
        match stage {
            "starting" => Some(Self::Starting),
            "installing" => Some(Self::Installing),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Wire name of this stage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Installing => "installing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Whether no further messages follow for this operation.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Typed view of an `install_progress` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallProgress {
    /// Operation identifier (engine name, or `cuda` for the CUDA repair).
    pub engine: String,
    /// Current stage.
    pub stage: InstallStage,
    /// Human-readable status line or a line of package manager output.
    pub message: String,
}
