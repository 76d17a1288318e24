use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationCreate {
    #[serde(default)]
    pub travel_plan_id: Option<String>,
    pub message: String,
    pub sender: Sender,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub travel_plan_id: Option<String>,
    pub message: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sender_must_be_known() {
        let ok: ConversationCreate =
            serde_json::from_value(json!({"message": "hi", "sender": "system"})).unwrap();
        assert_eq!(ok.sender, Sender::System);
        assert!(ok.travel_plan_id.is_none());

        let bad = serde_json::from_value::<ConversationCreate>(
            json!({"message": "hi", "sender": "assistant"}),
        );
        assert!(bad.is_err());
    }
}
