use serde::{Deserialize, Serialize};

/// A presentable artifact. Only metadata lives here; the document itself
/// is stored and converted elsewhere.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    #[serde(skip)]
    pub user_id: String,
    pub title: String,
    pub uploaded: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUpload {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUpload {
    pub title: String,
}
