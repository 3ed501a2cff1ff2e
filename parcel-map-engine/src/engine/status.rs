use crate::rpc::web_rpc::WebRpcInterface;
use bevy::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

/// User-facing status text. Every message is mirrored to the host as a
/// `status` notification.
#[derive(Resource, Debug, Default)]
pub struct StatusLine {
    current: Option<StatusMessage>,
    unsent: Vec<StatusMessage>,
}

impl StatusLine {
    pub fn info(&mut self, text: impl Into<String>) {
        self.push(StatusLevel::Info, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(StatusLevel::Error, text.into());
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    pub fn current_text(&self) -> Option<&str> {
        self.current.as_ref().map(|m| m.text.as_str())
    }

    fn push(&mut self, level: StatusLevel, text: String) {
        match level {
            StatusLevel::Info => info!("Status: {}", text),
            StatusLevel::Error => warn!("Status: {}", text),
        }
        let message = StatusMessage { level, text };
        self.unsent.push(message.clone());
        self.current = Some(message);
    }

    fn take_unsent(&mut self) -> Vec<StatusMessage> {
        std::mem::take(&mut self.unsent)
    }
}

pub fn publish_status(mut status: ResMut<StatusLine>, mut rpc_interface: ResMut<WebRpcInterface>) {
    for message in status.take_unsent() {
        rpc_interface.send_notification(
            "status",
            serde_json::json!({
                "level": message.level,
                "message": message.text,
            }),
        );
    }
}
