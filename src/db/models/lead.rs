//! Contact form lead models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub license_category: String,
    pub message: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    /// Defaults to category B, by far the most requested
    #[serde(default = "default_license_category")]
    pub license_category: String,
    pub message: Option<String>,
}

fn default_license_category() -> String {
    "B".to_string()
}

/// Filters for the admin lead listing
#[derive(Debug, Deserialize)]
pub struct LeadQuery {
    /// `true` shows only unread leads
    pub unread: Option<bool>,
    pub service: Option<String>,
}
