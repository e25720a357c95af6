//! Rows the application assumes exist, inserted at startup when missing.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Row id of the single site_profile record.
pub const SITE_PROFILE_ID: &str = "site";

/// Ensure the site profile singleton exists so GET and PUT always have a row
/// to work with. Existing content is never overwritten.
pub async fn seed_site_profile(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO site_profile
            (id, description, image_url, facebook, instagram, tiktok, whatsapp, updated_at)
        VALUES (?, NULL, NULL, NULL, NULL, NULL, NULL, ?)
        "#,
    )
    .bind(SITE_PROFILE_ID)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!("Seeded empty site profile");
    }

    Ok(())
}
