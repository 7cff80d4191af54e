use serde::{Deserialize, Serialize};

/// A user profile row, joined into messages and the inbox view for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub profile_image: Option<String>,
    pub birthday: Option<String>,
    pub updated_at: Option<String>,
}
