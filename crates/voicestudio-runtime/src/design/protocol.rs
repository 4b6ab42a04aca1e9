//! Line protocol spoken by the voice design helper.
//!
//! Each stdout line is one JSON object with a `status` field:
//!
//! ```json
//! {"status": "progress", "stage": "loading_model", "message": "Loading tokenizer...", "percent": 80}
//! {"status": "complete", "duration": 2.41}
//! {"status": "error", "message": "CUDA out of memory"}
//! ```

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing or invalid 'status' field")]
    InvalidStatus,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DesignEvent {
    Progress {
        stage: String,
        message: String,
        /// 0-100.
        percent: u8,
    },
    Complete {
        duration_secs: f64,
    },
    Error {
        message: String,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    status: Option<String>,
    stage: Option<String>,
    message: Option<String>,
    percent: Option<f64>,
    duration: Option<f64>,
}

pub fn parse_line(line: &str) -> Result<DesignEvent, ProtocolError> {
    let envelope: RawEnvelope = serde_json::from_str(line)?;
    let status = envelope.status.ok_or(ProtocolError::InvalidStatus)?;

    match status.as_str() {
        "progress" => Ok(DesignEvent::Progress {
            stage: envelope.stage.unwrap_or_else(|| "generating".to_string()),
            message: envelope.message.ok_or(ProtocolError::MissingField("message"))?,
            percent: clamp_percent(envelope.percent.unwrap_or(0.0)),
        }),
        "complete" => Ok(DesignEvent::Complete {
            duration_secs: envelope
                .duration
                .ok_or(ProtocolError::MissingField("duration"))?,
        }),
        "error" => Ok(DesignEvent::Error {
            message: envelope
                .message
                .unwrap_or_else(|| "Unknown error".to_string()),
        }),
        other => Err(ProtocolError::UnknownStatus(other.to_string())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress() {
        let event = parse_line(
            r#"{"status":"progress","stage":"loading_model","message":"Loading tokenizer...","percent":80}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            DesignEvent::Progress {
                stage: "loading_model".to_string(),
                message: "Loading tokenizer...".to_string(),
                percent: 80,
            }
        );
    }

    #[test]
    fn out_of_range_percent_is_clamped() {
        let event =
            parse_line(r#"{"status":"progress","message":"x","percent":140.2}"#).unwrap();
        assert!(matches!(event, DesignEvent::Progress { percent: 100, .. }));
    }

    #[test]
    fn parses_complete_and_error() {
        assert_eq!(
            parse_line(r#"{"status":"complete","duration":2.5}"#).unwrap(),
            DesignEvent::Complete { duration_secs: 2.5 }
        );
        assert_eq!(
            parse_line(r#"{"status":"error","message":"CUDA out of memory"}"#).unwrap(),
            DesignEvent::Error {
                message: "CUDA out of memory".to_string()
            }
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_line("Loading checkpoint shards: 100%"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_line(r#"{"message":"hi"}"#),
            Err(ProtocolError::InvalidStatus)
        ));
        assert!(matches!(
            parse_line(r#"{"status":"complete"}"#),
            Err(ProtocolError::MissingField("duration"))
        ));
        assert!(matches!(
            parse_line(r#"{"status":"paused"}"#),
            Err(ProtocolError::UnknownStatus(s)) if s == "paused"
        ));
    }
}
