//! Messages between the controlling side and the playback worker.
//!
//! Both directions are serde-tagged so they can cross a process or socket
//! boundary as JSON, e.g. `{"command":"seek","time_secs":12.5}`.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::presenter::PresentationTarget;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum WorkerCommand {
    /// Open a source and prepare the decoder. Replaces any existing session.
    Initialize {
        source: String,
        #[serde(default)]
        target: PresentationTarget,
    },
    /// Start the clock, optionally from an explicit media time.
    Play {
        #[serde(default)]
        media_time_secs: Option<f64>,
    },
    Pause,
    Seek { time_secs: f64 },
    /// External clock reading, e.g. from an audio device.
    UpdateClock {
        media_time_secs: f64,
        /// When the reading was taken. Defaults to when the command is handled.
        #[serde(skip)]
        captured_at: Option<Instant>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "reply", rename_all = "kebab-case")]
pub enum WorkerReply {
    InitializeDone {
        codec: String,
        width: Option<u32>,
        height: Option<u32>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
        duration_secs: f64,
    },
    SeekDone {
        requested_secs: f64,
        position_secs: f64,
    },
    /// Every frame of the stream has been presented or dropped.
    EndOfStream,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_value(WorkerCommand::Seek { time_secs: 12.5 }).unwrap();
        assert_eq!(json, serde_json::json!({"command": "seek", "time_secs": 12.5}));

        let command: WorkerCommand =
            serde_json::from_str(r#"{"command":"initialize","source":"/tmp/a.mp4"}"#).unwrap();
        assert_eq!(
            command,
            WorkerCommand::Initialize {
                source: "/tmp/a.mp4".into(),
                target: PresentationTarget::Log,
            }
        );

        let command: WorkerCommand =
            serde_json::from_str(r#"{"command":"update-clock","media_time_secs":3.0}"#).unwrap();
        assert_eq!(
            command,
            WorkerCommand::UpdateClock {
                media_time_secs: 3.0,
                captured_at: None,
            }
        );
        let command: WorkerCommand = serde_json::from_str(r#"{"command":"play"}"#).unwrap();
        assert_eq!(command, WorkerCommand::Play { media_time_secs: None });
    }

    #[test]
    fn test_reply_wire_format() {
        let json = serde_json::to_value(WorkerReply::Error {
            message: "no video track".into(),
        })
        .unwrap();
        assert_eq!(json["reply"], "error");
        assert_eq!(json["message"], "no video track");

        let json = serde_json::to_value(WorkerReply::EndOfStream).unwrap();
        assert_eq!(json, serde_json::json!({"reply": "end-of-stream"}));
    }
}
