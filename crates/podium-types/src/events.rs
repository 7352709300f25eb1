use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Navigation state broadcast on a reveal channel. `sender` is the client id
/// of the viewer that performed the transition; receivers drop payloads
/// carrying their own id (the sender already applied the change locally).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatePayload {
    pub current_index: usize,
    pub show_intro: bool,
    pub sender: Uuid,
}

/// Commands sent FROM a reveal viewer TO the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RevealCommand {
    /// Must be the first command on the socket; the server loads the item
    /// count before subscribing because clamping depends on it.
    Subscribe,

    /// Advance one slide (intro -> first item -> ... -> last item).
    Next,

    /// Step back one slide (first item -> intro).
    Prev,

    /// Jump directly to a navigation state; the server clamps the index.
    Navigate { current_index: usize, show_intro: bool },
}

/// Events sent FROM the server TO a reveal viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RevealEvent {
    /// Subscription confirmed; the viewer starts on the intro slide.
    Ready { client_id: Uuid, item_count: usize },

    /// A viewer (possibly this one) navigated.
    Navigate {
        current_index: usize,
        show_intro: bool,
        sender: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let cmd: RevealCommand = serde_json::from_str(r#"{"type":"Next"}"#).unwrap();
        assert!(matches!(cmd, RevealCommand::Next));

        let cmd: RevealCommand = serde_json::from_str(
            r#"{"type":"Navigate","data":{"current_index":3,"show_intro":false}}"#,
        )
        .unwrap();
        match cmd {
            RevealCommand::Navigate { current_index, show_intro } => {
                assert_eq!(current_index, 3);
                assert!(!show_intro);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn event_roundtrip() {
        let sender = Uuid::new_v4();
        let event = RevealEvent::Navigate {
            current_index: 1,
            show_intro: false,
            sender,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: RevealEvent = serde_json::from_str(&json).unwrap();
        match back {
            RevealEvent::Navigate { current_index, show_intro, sender: s } => {
                assert_eq!(current_index, 1);
                assert!(!show_intro);
                assert_eq!(s, sender);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
