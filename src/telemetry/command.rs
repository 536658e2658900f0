use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::On => "ON",
            Command::Off => "OFF",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body published on the control topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlMessage<'a> {
    pub target_client_id: &'a str,

    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_message_wire_shape() {
        let message = ControlMessage {
            target_client_id: "dev-1",
            command: Command::On,
        };

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"target_client_id":"dev-1","command":"ON"}"#);
    }

    #[test]
    fn display_matches_wire_value() {
        assert_eq!(Command::On.to_string(), "ON");
        assert_eq!(Command::Off.to_string(), Command::Off.as_str());
    }
}
