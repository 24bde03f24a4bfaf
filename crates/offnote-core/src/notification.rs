//! Push notification payloads and where tapping them navigates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NoteShared,
    DailyPrompt,
    NoteUpdated,
}

/// The `data` member of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
}

impl NotificationKind {
    /// In-app route for a tapped notification of this kind.
    pub fn navigation_target(self, note_id: Option<&str>) -> String {
        match (self, note_id) {
            (NotificationKind::NoteShared, Some(id)) => format!("/shared/{}", id),
            (NotificationKind::NoteShared, None) => "/shared".to_string(),
            (NotificationKind::NoteUpdated, Some(id)) => format!("/notes/{}", id),
            (NotificationKind::NoteUpdated, None) => "/notes".to_string(),
            (NotificationKind::DailyPrompt, _) => "/notes/new".to_string(),
        }
    }
}

impl NotificationPayload {
    /// Typed view of `data`, if it names a known kind.
    pub fn parsed_data(&self) -> Option<NotificationData> {
        serde_json::from_value(self.data.clone()?).ok()
    }

    /// Where to navigate when the notification is tapped. Unknown or missing
    /// data goes to the app root.
    pub fn navigation_target(&self) -> String {
        match self.parsed_data() {
            Some(data) => data.kind.navigation_target(data.note_id.as_deref()),
            None => "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(data: serde_json::Value) -> NotificationPayload {
        serde_json::from_value(json!({
            "title": "Offnote",
            "body": "Something happened",
            "data": data
        }))
        .unwrap()
    }

    #[test]
    fn test_navigation_targets() {
        assert_eq!(
            payload(json!({"type": "note_shared", "noteId": "n1"})).navigation_target(),
            "/shared/n1"
        );
        assert_eq!(
            payload(json!({"type": "note_updated", "noteId": "n2"})).navigation_target(),
            "/notes/n2"
        );
        assert_eq!(
            payload(json!({"type": "daily_prompt"})).navigation_target(),
            "/notes/new"
        );
        assert_eq!(payload(json!({"type": "note_shared"})).navigation_target(), "/shared");
    }

    #[test]
    fn test_unknown_kind_goes_home() {
        assert_eq!(payload(json!({"type": "promo"})).navigation_target(), "/");

        let bare: NotificationPayload =
            serde_json::from_value(json!({"title": "t", "body": "b"})).unwrap();
        assert_eq!(bare.navigation_target(), "/");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let bare: NotificationPayload =
            serde_json::from_value(json!({"title": "t", "body": "b"})).unwrap();
        let value = serde_json::to_value(&bare).unwrap();
        assert_eq!(value, json!({"title": "t", "body": "b"}));
    }
}
