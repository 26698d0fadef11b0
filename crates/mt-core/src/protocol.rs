//! Broadcast messages exchanged by tracker clients.
//!
//! Every message goes to every subscriber, sender included. There are no
//! replies; receivers decide locally what a message means for them.

use serde::{Deserialize, Serialize};

use crate::authority::UserId;
use crate::geometry::TokenId;
use crate::scene::SceneId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Init,
    Open,
    Close,
    ChangeTarget,
}

/// Marks a message as an informational echo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notify {
    Notify,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub owner_id: UserId,
    pub tracked_token_id: Option<TokenId>,
    pub viewed_scene_id: Option<SceneId>,
    /// `None` addresses every user.
    pub target_id: Option<UserId>,
    pub sender_id: UserId,
    pub notify: Option<Notify>,
}

impl TrackerMessage {
    pub fn new(kind: MessageKind, sender: &str, owner: &str) -> Self {
        Self {
            kind,
            owner_id: owner.to_string(),
            tracked_token_id: None,
            viewed_scene_id: None,
            target_id: None,
            sender_id: sender.to_string(),
            notify: None,
        }
    }

    pub fn tracking(mut self, scene: &str, token: Option<&str>) -> Self {
        self.viewed_scene_id = Some(scene.to_string());
        self.tracked_token_id = token.map(str::to_string);
        self
    }

    pub fn for_user(mut self, target: Option<&str>) -> Self {
        self.target_id = target.map(str::to_string);
        self
    }

    pub fn as_notify(mut self) -> Self {
        self.notify = Some(Notify::Notify);
        self
    }

    pub fn is_notify(&self) -> bool {
        self.notify.is_some()
    }

    /// Whether the message addresses `user`.
    pub fn applies_to(&self, user: &str) -> bool {
        self.target_id.as_deref().is_none_or(|t| t == user)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = TrackerMessage::new(MessageKind::ChangeTarget, "u1", "u1")
            .tracking("scene", Some("tok"));
        let v: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "changeTarget");
        assert_eq!(v["ownerId"], "u1");
        assert_eq!(v["trackedTokenId"], "tok");
        assert_eq!(v["viewedSceneId"], "scene");
        assert!(v["targetId"].is_null());
        assert!(v["notify"].is_null());
    }

    #[test]
    fn test_parses_notify_echo() {
        let text = r#"{"type":"close","ownerId":"gm","trackedTokenId":null,
            "viewedSceneId":null,"targetId":"p1","senderId":"p1","notify":"notify"}"#;
        let msg = TrackerMessage::from_json(text).unwrap();
        assert_eq!(msg.kind, MessageKind::Close);
        assert!(msg.is_notify());
        assert!(msg.applies_to("p1"));
        assert!(!msg.applies_to("p2"));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let text = r#"{"type":"update","ownerId":"gm","trackedTokenId":null,
            "viewedSceneId":null,"targetId":null,"senderId":"gm","notify":null}"#;
        assert!(TrackerMessage::from_json(text).is_err());
    }

    #[test]
    fn test_broadcast_applies_to_everyone() {
        let msg = TrackerMessage::new(MessageKind::Open, "gm", "gm");
        assert!(msg.applies_to("anyone"));
    }
}
