//! Input validation for API requests.
//!
//! This module provides validation functions for API request data,
//! ensuring all inputs meet the required format and constraints.
//!
//! For collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::models::{LessonStatus, LessonType, LicenseCategory, ServiceKind, Transmission};

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();

    /// Regex for validating phone numbers (digits, spaces, dashes, parens,
    /// optional +). National formats may open with a parenthesized prefix.
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9(][0-9 ()./-]{4,18}[0-9]$"
    ).unwrap();

    /// Regex for validating HTTP/HTTPS URLs (profile images and social links)
    static ref HTTP_URL_REGEX: Regex = Regex::new(
        r"^https?://[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)*(:\d+)?(/[-a-zA-Z0-9_%&=+@~.]*)*(\?[-a-zA-Z0-9_%&=+@~./]*)?$"
    ).unwrap();

    /// Regex for validating vehicle license plates
    static ref LICENSE_PLATE_REGEX: Regex = Regex::new(
        r"^[A-Z0-9][A-Z0-9 -]{0,10}[A-Z0-9]$"
    ).unwrap();
}

/// Validate a person or contact name
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    if trimmed.chars().any(char::is_control) {
        return Err("Name contains control characters".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate an email address when the field is optional
pub fn validate_optional_email(email: &Option<String>) -> Result<(), String> {
    if let Some(e) = email {
        if e.is_empty() {
            return Ok(()); // Empty string treated as no email
        }
        return validate_email(e);
    }

    Ok(())
}

/// Validate a phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }

    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number format".to_string());
    }

    Ok(())
}

/// Validate a phone number when the field is optional
pub fn validate_optional_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }
        return validate_phone(p);
    }

    Ok(())
}

/// Validate an HTTP(S) URL (optional field, used for images and social links)
pub fn validate_url(url: &Option<String>, field_name: &str) -> Result<(), String> {
    if let Some(u) = url {
        if u.is_empty() {
            return Ok(()); // Empty string treated as no URL
        }

        if u.len() > 2048 {
            return Err(format!("{} is too long (max 2048 characters)", field_name));
        }

        if !HTTP_URL_REGEX.is_match(u) {
            return Err(format!("Invalid {} format. Must be an HTTP(S) URL", field_name));
        }
    }

    Ok(())
}

/// Validate free-form text like messages, comments and notes
pub fn validate_text(text: &str, field_name: &str, max_len: usize) -> Result<(), String> {
    if text.len() > max_len {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, max_len
        ));
    }

    Ok(())
}

/// Validate a review rating (1 to 5 stars)
pub fn validate_rating(rating: i64) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be between 1 and 5".to_string());
    }

    Ok(())
}

/// Validate a requested service
pub fn validate_service(service: &str) -> Result<(), String> {
    service
        .parse::<ServiceKind>()
        .map(|_| ())
        .map_err(|_| "Invalid service. Must be one of: driving-lessons, car-rental".to_string())
}

/// Validate a license category
pub fn validate_license_category(category: &str) -> Result<(), String> {
    category
        .parse::<LicenseCategory>()
        .map(|_| ())
        .map_err(|_| "Invalid license category. Must be one of: B, A, A1, A2".to_string())
}

/// Validate a lesson type
pub fn validate_lesson_type(lesson_type: &str) -> Result<(), String> {
    lesson_type.parse::<LessonType>().map(|_| ()).map_err(|_| {
        "Invalid lesson type. Must be one of: theory, practical, test-preparation, mock-test"
            .to_string()
    })
}

/// Validate a lesson status
pub fn validate_lesson_status(status: &str) -> Result<(), String> {
    status.parse::<LessonStatus>().map(|_| ()).map_err(|_| {
        "Invalid lesson status. Must be one of: scheduled, completed, cancelled, no-show"
            .to_string()
    })
}

/// Validate a vehicle transmission
pub fn validate_transmission(transmission: &str) -> Result<(), String> {
    transmission
        .parse::<Transmission>()
        .map(|_| ())
        .map_err(|_| "Invalid transmission. Must be one of: manual, automatic".to_string())
}

/// Validate a year (enrollment years and vehicle model years)
pub fn validate_year(year: i64, field_name: &str) -> Result<(), String> {
    if !(1950..=2100).contains(&year) {
        return Err(format!("{} must be between 1950 and 2100", field_name));
    }

    Ok(())
}

/// Validate a lesson duration in minutes
pub fn validate_duration(minutes: i64) -> Result<(), String> {
    if !(15..=480).contains(&minutes) {
        return Err("Duration must be between 15 and 480 minutes".to_string());
    }

    Ok(())
}

/// Validate a vehicle license plate
pub fn validate_license_plate(plate: &str) -> Result<(), String> {
    if plate.is_empty() {
        return Err("License plate is required".to_string());
    }

    if !LICENSE_PLATE_REGEX.is_match(plate) {
        return Err(
            "Invalid license plate. Use uppercase letters, digits, spaces and dashes".to_string(),
        );
    }

    Ok(())
}

/// Validate an ISO 8601 date or datetime string
pub fn validate_date(date: &str, field_name: &str) -> Result<(), String> {
    if date.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    let ok = chrono::DateTime::parse_from_rfc3339(date).is_ok()
        || chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
        || chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S").is_ok();

    if !ok {
        return Err(format!("Invalid {} format. Use ISO 8601", field_name));
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Maria Petrescu").is_ok());
        assert!(validate_name("Jo").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name("Ana\x07Ionescu").is_err());
        assert!(validate_name("Ana\nIonescu").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("student@example.com").is_ok());
        assert!(validate_email("first.last+tag@school.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@domain").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_optional_email() {
        assert!(validate_optional_email(&None).is_ok());
        assert!(validate_optional_email(&Some(String::new())).is_ok());
        assert!(validate_optional_email(&Some("a@b.com".to_string())).is_ok());
        assert!(validate_optional_email(&Some("bad".to_string())).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+40 721 234 567").is_ok());
        assert!(validate_phone("0721234567").is_ok());
        assert!(validate_phone("(555) 123-4567").is_ok());
        assert!(validate_phone("(021) 555 0199").is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("12").is_err());
        assert!(validate_phone("call me maybe").is_err());
        assert!(validate_phone("+(555) 123-456(").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url(&Some("https://example.com/photo.jpg".to_string()), "image_url").is_ok());
        assert!(validate_url(&Some("https://www.instagram.com/school".to_string()), "instagram").is_ok());
        assert!(validate_url(&Some("https://wa.me/40721234567".to_string()), "whatsapp").is_ok());
        assert!(validate_url(&None, "image_url").is_ok());
        assert!(validate_url(&Some(String::new()), "image_url").is_ok());

        assert!(validate_url(&Some("ftp://example.com".to_string()), "image_url").is_err());
        assert!(validate_url(&Some("javascript:alert(1)".to_string()), "image_url").is_err());
    }

    #[test]
    fn test_validate_rating() {
        for rating in 1..=5 {
            assert!(validate_rating(rating).is_ok());
        }

        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-1).is_err());
    }

    #[test]
    fn test_validate_service() {
        assert!(validate_service("driving-lessons").is_ok());
        assert!(validate_service("car-rental").is_ok());

        assert!(validate_service("").is_err());
        assert!(validate_service("flying-lessons").is_err());
    }

    #[test]
    fn test_validate_license_category() {
        assert!(validate_license_category("B").is_ok());
        assert!(validate_license_category("a1").is_ok());

        assert!(validate_license_category("C").is_err());
        assert!(validate_license_category("").is_err());
    }

    #[test]
    fn test_validate_lesson_fields() {
        assert!(validate_lesson_type("practical").is_ok());
        assert!(validate_lesson_type("karaoke").is_err());

        assert!(validate_lesson_status("no-show").is_ok());
        assert!(validate_lesson_status("postponed").is_err());

        assert!(validate_duration(60).is_ok());
        assert!(validate_duration(10).is_err());
        assert!(validate_duration(600).is_err());
    }

    #[test]
    fn test_validate_transmission() {
        assert!(validate_transmission("manual").is_ok());
        assert!(validate_transmission("automatic").is_ok());
        assert!(validate_transmission("cvt").is_err());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(2024, "year").is_ok());
        assert!(validate_year(1950, "year").is_ok());

        assert!(validate_year(1949, "year").is_err());
        assert!(validate_year(2101, "year").is_err());
    }

    #[test]
    fn test_validate_license_plate() {
        assert!(validate_license_plate("B-123-XYZ").is_ok());
        assert!(validate_license_plate("CJ 99 ABC").is_ok());

        assert!(validate_license_plate("").is_err());
        assert!(validate_license_plate("lowercase").is_err());
        assert!(validate_license_plate("#$%").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2025-06-01", "scheduled_date").is_ok());
        assert!(validate_date("2025-06-01T09:30:00", "scheduled_date").is_ok());
        assert!(validate_date("2025-06-01T09:30:00+02:00", "scheduled_date").is_ok());

        assert!(validate_date("", "scheduled_date").is_err());
        assert!(validate_date("tomorrow", "scheduled_date").is_err());
        assert!(validate_date("01/06/2025", "scheduled_date").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "lead_id").is_ok());
        assert!(validate_uuid("", "lead_id").is_err());
        assert!(validate_uuid("not-a-uuid", "lead_id").is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("short note", "notes", 100).is_ok());
        assert!(validate_text("", "notes", 100).is_ok());
        assert!(validate_text(&"x".repeat(101), "notes", 100).is_err());
    }
}
