//! Site profile model for the public landing page.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Singleton row (id = "site"). Holds the instructor presentation text,
/// photo and social links shown on the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SiteProfile {
    #[serde(skip_serializing)]
    pub id: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub whatsapp: Option<String>,
    pub updated_at: String,
}

/// Wholesale replacement of the profile. Omitted fields clear the value.
#[derive(Debug, Deserialize)]
pub struct UpdateSiteProfileRequest {
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub whatsapp: Option<String>,
}
