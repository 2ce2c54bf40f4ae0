use uuid::Uuid;

pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Offline identity passed to the game. Authentication is not performed; the
/// token fields carry the placeholder values the client accepts offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineProfile {
    pub username: String,
    /// Fresh per launch.
    pub uuid: String,
    pub access_token: String,
    pub xuid: String,
    pub user_type: String,
    pub client_id: String,
}

impl OfflineProfile {
    pub fn new(username: &str) -> Self {
        let username = username.trim();
        Self {
            username: if username.is_empty() {
                DEFAULT_PLAYER_NAME.to_string()
            } else {
                username.to_string()
            },
            uuid: Uuid::new_v4().to_string(),
            access_token: "0".into(),
            xuid: "0".into(),
            user_type: "mojang".into(),
            client_id: "0".into(),
        }
    }
}
