//! Training fleet endpoints (admin only).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    actions, resource_types, CreateVehicleRequest, UpdateVehicleRequest, Vehicle,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_date, validate_license_plate, validate_text, validate_transmission, validate_uuid,
    validate_year,
};

fn validate_required_label(value: &str, field_name: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if trimmed.len() > 50 {
        return Err(format!("{} is too long (max 50 characters)", field_name));
    }
    Ok(())
}

/// Validate a CreateVehicleRequest
fn validate_create_request(req: &CreateVehicleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_required_label(&req.make, "make") {
        errors.add("make", &e);
    }

    if let Err(e) = validate_required_label(&req.model, "model") {
        errors.add("model", &e);
    }

    if let Err(e) = validate_year(req.year, "year") {
        errors.add("year", &e);
    }

    if let Err(e) = validate_license_plate(&req.license_plate.trim().to_uppercase()) {
        errors.add("license_plate", &e);
    }

    if let Err(e) = validate_transmission(&req.transmission) {
        errors.add("transmission", &e);
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    errors.finish()
}

/// Validate an UpdateVehicleRequest
fn validate_update_request(req: &UpdateVehicleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(make) = &req.make {
        if let Err(e) = validate_required_label(make, "make") {
            errors.add("make", &e);
        }
    }

    if let Some(model) = &req.model {
        if let Err(e) = validate_required_label(model, "model") {
            errors.add("model", &e);
        }
    }

    if let Some(year) = req.year {
        if let Err(e) = validate_year(year, "year") {
            errors.add("year", &e);
        }
    }

    if let Some(plate) = &req.license_plate {
        if let Err(e) = validate_license_plate(&plate.trim().to_uppercase()) {
            errors.add("license_plate", &e);
        }
    }

    if let Some(transmission) = &req.transmission {
        if let Err(e) = validate_transmission(transmission) {
            errors.add("transmission", &e);
        }
    }

    if let Some(date) = &req.last_maintenance {
        if let Err(e) = validate_date(date, "last_maintenance") {
            errors.add("last_maintenance", &e);
        }
    }

    if let Some(notes) = &req.notes {
        if let Err(e) = validate_text(notes, "notes", 2000) {
            errors.add("notes", &e);
        }
    }

    errors.finish()
}

/// List the fleet, active vehicles first
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Vehicle>>, ApiError> {
    let vehicles = sqlx::query_as::<_, Vehicle>(
        "SELECT * FROM vehicles ORDER BY is_active DESC, make ASC, model ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(vehicles))
}

/// Get a single vehicle
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vehicle>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "vehicle_id") {
        return Err(ApiError::validation_field("vehicle_id", e));
    }

    let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    Ok(Json(vehicle))
}

/// Add a vehicle to the fleet
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    // Validate request
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let plate = req.license_plate.trim().to_uppercase();

    sqlx::query(
        r#"
        INSERT INTO vehicles (id, make, model, year, license_plate, transmission,
                              is_active, last_maintenance, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, NULL, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.make.trim())
    .bind(req.model.trim())
    .bind(req.year)
    .bind(&plate)
    .bind(&req.transmission)
    .bind(&req.notes)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create vehicle: {}", e);
        // Check for unique constraint violation
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("A vehicle with this license plate already exists")
        } else {
            ApiError::database("Failed to create vehicle")
        }
    })?;

    let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::VEHICLE_CREATE,
        resource_types::VEHICLE,
        Some(&vehicle.id),
        Some(&vehicle.license_plate),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    tracing::info!(plate = %vehicle.license_plate, "Vehicle added to fleet");

    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// Update a vehicle; absent fields keep their current value
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateVehicleRequest>,
) -> Result<Json<Vehicle>, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "vehicle_id") {
        return Err(ApiError::validation_field("vehicle_id", e));
    }

    // Validate request
    validate_update_request(&req)?;

    // Check if vehicle exists
    let _existing = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    let plate = req
        .license_plate
        .as_deref()
        .map(|p| p.trim().to_uppercase());
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE vehicles SET
            make = COALESCE(?, make),
            model = COALESCE(?, model),
            year = COALESCE(?, year),
            license_plate = COALESCE(?, license_plate),
            transmission = COALESCE(?, transmission),
            is_active = COALESCE(?, is_active),
            last_maintenance = COALESCE(?, last_maintenance),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.make.as_deref().map(str::trim))
    .bind(req.model.as_deref().map(str::trim))
    .bind(req.year)
    .bind(&plate)
    .bind(&req.transmission)
    .bind(req.is_active)
    .bind(&req.last_maintenance)
    .bind(&req.notes)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update vehicle: {}", e);
        // Check for unique constraint violation
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("A vehicle with this license plate already exists")
        } else {
            ApiError::database("Failed to update vehicle")
        }
    })?;

    let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::VEHICLE_UPDATE,
        resource_types::VEHICLE,
        Some(&vehicle.id),
        Some(&vehicle.license_plate),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(vehicle))
}

/// Remove a vehicle from the fleet. Lessons that used it keep their
/// other fields; the vehicle reference is nulled out.
pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    // Validate ID format
    if let Err(e) = validate_uuid(&id, "vehicle_id") {
        return Err(ApiError::validation_field("vehicle_id", e));
    }

    // Get vehicle before deleting for audit log
    let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    let result = sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Vehicle not found"));
    }

    // Log audit event
    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        actions::VEHICLE_DELETE,
        resource_types::VEHICLE,
        Some(&vehicle.id),
        Some(&vehicle.license_plate),
        Some(&user.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateVehicleRequest {
        CreateVehicleRequest {
            make: "Dacia".to_string(),
            model: "Logan".to_string(),
            year: 2022,
            license_plate: "b 123 drv".to_string(),
            transmission: "manual".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_create_validation_uppercases_plate() {
        // lowercase input is accepted because the handler stores it uppercased
        assert!(validate_create_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_create_validation_rejects_bad_transmission() {
        let req = CreateVehicleRequest {
            transmission: "tiptronic".to_string(),
            ..valid_request()
        };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_create_validation_rejects_missing_make() {
        let req = CreateVehicleRequest { make: " ".to_string(), ..valid_request() };
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_update_validation_rejects_bad_date() {
        let req = UpdateVehicleRequest {
            make: None,
            model: None,
            year: None,
            license_plate: None,
            transmission: None,
            is_active: None,
            last_maintenance: Some("last tuesday".to_string()),
            notes: None,
        };
        assert!(validate_update_request(&req).is_err());
    }
}
