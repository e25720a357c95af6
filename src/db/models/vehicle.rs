//! Training fleet models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub license_plate: String,
    pub transmission: String,
    pub is_active: bool,
    pub last_maintenance: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVehicleRequest {
    pub make: String,
    pub model: String,
    pub year: i64,
    pub license_plate: String,
    pub transmission: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVehicleRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub license_plate: Option<String>,
    pub transmission: Option<String>,
    pub is_active: Option<bool>,
    pub last_maintenance: Option<String>,
    pub notes: Option<String>,
}
