//! Gateway events consumed by the correlator.
//!
//! Only the fields the reply parser and the dispatcher read are modeled;
//! everything else in a dispatch frame is ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Discord's ephemeral message flag.
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// One event delivered by the gateway, already narrowed to the kinds the
/// correlator cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// `MESSAGE_CREATE`
    MessageCreate(MessagePayload),
    /// `MESSAGE_UPDATE`. Kept raw: edits are partial and only accumulated.
    MessageUpdate(Value),
    /// `INTERACTION_CREATE`, the acknowledgement of our own interaction.
    InteractionCreate {
        interaction_id: String,
        nonce: Option<String>,
    },
    /// `INTERACTION_SUCCESS`
    InteractionSuccess {
        interaction_id: String,
        nonce: Option<String>,
    },
}

impl GatewayEvent {
    /// Decode a raw gateway frame (`{"op": 0, "t": ..., "d": ...}`).
    /// Returns `None` for non-dispatch frames and event types we ignore.
    pub fn from_frame(frame: &Value) -> Option<Self> {
        if frame.get("op").and_then(Value::as_u64) != Some(0) {
            return None;
        }
        let kind = frame.get("t")?.as_str()?;
        let data = frame.get("d")?;

        match kind {
            "MESSAGE_CREATE" => match serde_json::from_value(data.clone()) {
                Ok(message) => Some(Self::MessageCreate(message)),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable MESSAGE_CREATE");
                    None
                }
            },
            "MESSAGE_UPDATE" => Some(Self::MessageUpdate(data.clone())),
            "INTERACTION_CREATE" | "INTERACTION_SUCCESS" => {
                let interaction_id = snowflake_field(data, "id")?;
                let nonce = snowflake_field(data, "nonce");
                Some(if kind == "INTERACTION_CREATE" {
                    Self::InteractionCreate { interaction_id, nonce }
                } else {
                    Self::InteractionSuccess { interaction_id, nonce }
                })
            }
            _ => None,
        }
    }

    /// Correlation token carried directly by the event, if any.
    pub fn nonce(&self) -> Option<&str> {
        match self {
            Self::MessageCreate(message) => message.nonce.as_deref(),
            Self::MessageUpdate(raw) => raw.get("nonce").and_then(Value::as_str),
            Self::InteractionCreate { nonce, .. } | Self::InteractionSuccess { nonce, .. } => {
                nonce.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A newly created message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub flags: u64,
    #[serde(default, deserialize_with = "lenient_snowflake")]
    pub nonce: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub interaction: Option<InteractionRef>,
    #[serde(default)]
    pub interaction_metadata: Option<InteractionRef>,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
}

impl MessagePayload {
    pub fn author_id(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.id.as_str())
    }

    /// Id of the interaction this message answers.
    pub fn interaction_id(&self) -> Option<&str> {
        self.interaction_metadata
            .as_ref()
            .or(self.interaction.as_ref())
            .map(|i| i.id.as_str())
    }

    /// Id of the message this one replies to.
    pub fn referenced_message_id(&self) -> Option<&str> {
        self.message_reference
            .as_ref()
            .and_then(|r| r.message_id.as_deref())
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags & EPHEMERAL_FLAG != 0
    }

    /// Presentation text: first embed description, else the plain content.
    pub fn text(&self) -> Option<&str> {
        self.embeds
            .first()
            .and_then(|e| e.description.as_deref())
            .or_else(|| Some(self.content.as_str()).filter(|c| !c.is_empty()))
    }
}

/// Presentation text of a raw `MESSAGE_UPDATE` fragment.
pub fn update_text(raw: &Value) -> Option<&str> {
    raw.get("embeds")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| {
            raw.get("content")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
        })
}

/// Discord sends snowflakes and nonces either as strings or as integers.
fn snowflake_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_snowflake<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_message_create() {
        let frame = json!({
            "op": 0,
            "t": "MESSAGE_CREATE",
            "d": {
                "id": "900",
                "channel_id": "10",
                "content": "",
                "nonce": 1234567,
                "flags": 64,
                "author": {"id": "270904126974590976", "bot": true},
                "interaction_metadata": {"id": "77"},
                "embeds": [{"description": "You got **⏣ 5**"}]
            }
        });
        let Some(GatewayEvent::MessageCreate(message)) = GatewayEvent::from_frame(&frame) else {
            panic!("expected a message");
        };
        assert_eq!(message.nonce.as_deref(), Some("1234567"));
        assert_eq!(message.interaction_id(), Some("77"));
        assert!(message.is_ephemeral());
        assert_eq!(message.text(), Some("You got **⏣ 5**"));
    }

    #[test]
    fn test_decode_interaction_events() {
        let frame = json!({"op": 0, "t": "INTERACTION_SUCCESS", "d": {"id": "5", "nonce": "abc"}});
        assert_eq!(
            GatewayEvent::from_frame(&frame),
            Some(GatewayEvent::InteractionSuccess {
                interaction_id: "5".into(),
                nonce: Some("abc".into()),
            })
        );
        let ack = json!({"op": 0, "t": "INTERACTION_CREATE", "d": {"id": 6}});
        assert_eq!(GatewayEvent::from_frame(&ack).and_then(|e| e.nonce().map(String::from)), None);
    }

    #[test]
    fn test_ignores_other_frames() {
        assert_eq!(GatewayEvent::from_frame(&json!({"op": 11})), None);
        assert_eq!(
            GatewayEvent::from_frame(&json!({"op": 0, "t": "TYPING_START", "d": {}})),
            None
        );
    }

    #[test]
    fn test_text_falls_back_to_content() {
        let message = MessagePayload {
            content: "hello".into(),
            ..Default::default()
        };
        assert_eq!(message.text(), Some("hello"));
        assert_eq!(MessagePayload::default().text(), None);
        assert_eq!(update_text(&json!({"id": "1", "content": "edited"})), Some("edited"));
        assert_eq!(
            update_text(&json!({"embeds": [{"description": "new"}], "content": "old"})),
            Some("new")
        );
    }
}
