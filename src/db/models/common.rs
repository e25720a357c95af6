//! Shared enums used across models and API modules.

use serde::{Deserialize, Serialize};

/// Account roles with hierarchical permissions.
///
/// A user may hold several role rows; the highest-ranked one is their
/// effective role. It is resolved once at login and cached on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to the dashboard and user management
    Admin,
    /// Teaching staff
    Instructor,
    /// Enrolled student account
    Student,
    /// Plain account with no granted role
    User,
}

impl Role {
    /// Check if this role has at least the specified permission level
    pub fn has_at_least(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Get the permission level (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Instructor => 2,
            Role::Student => 1,
            Role::User => 0,
        }
    }

    /// Highest-ranked role in a set of role rows, `User` when empty
    pub fn effective<'a, I>(roles: I) -> Role
    where
        I: IntoIterator<Item = &'a str>,
    {
        roles
            .into_iter()
            .map(|s| Role::from(s.to_string()))
            .max_by_key(|r| r.level())
            .unwrap_or(Role::User)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Instructor => write!(f, "instructor"),
            Role::Student => write!(f, "student"),
            Role::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            "user" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::User)
    }
}

/// Service a lead is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    DrivingLessons,
    CarRental,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::DrivingLessons => write!(f, "driving-lessons"),
            ServiceKind::CarRental => write!(f, "car-rental"),
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "driving-lessons" => Ok(ServiceKind::DrivingLessons),
            "car-rental" => Ok(ServiceKind::CarRental),
            _ => Err(format!("Unknown service: {}", s)),
        }
    }
}

/// Driving license category a lead is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseCategory {
    B,
    A,
    A1,
    A2,
}

impl std::fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseCategory::B => write!(f, "B"),
            LicenseCategory::A => write!(f, "A"),
            LicenseCategory::A1 => write!(f, "A1"),
            LicenseCategory::A2 => write!(f, "A2"),
        }
    }
}

impl std::str::FromStr for LicenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "B" => Ok(LicenseCategory::B),
            "A" => Ok(LicenseCategory::A),
            "A1" => Ok(LicenseCategory::A1),
            "A2" => Ok(LicenseCategory::A2),
            _ => Err(format!("Unknown license category: {}", s)),
        }
    }
}

/// Kind of lesson on the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonType {
    Theory,
    Practical,
    TestPreparation,
    MockTest,
}

impl std::fmt::Display for LessonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonType::Theory => write!(f, "theory"),
            LessonType::Practical => write!(f, "practical"),
            LessonType::TestPreparation => write!(f, "test-preparation"),
            LessonType::MockTest => write!(f, "mock-test"),
        }
    }
}

impl std::str::FromStr for LessonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "theory" => Ok(LessonType::Theory),
            "practical" => Ok(LessonType::Practical),
            "test-preparation" => Ok(LessonType::TestPreparation),
            "mock-test" => Ok(LessonType::MockTest),
            _ => Err(format!("Unknown lesson type: {}", s)),
        }
    }
}

/// Lifecycle of a scheduled lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl Default for LessonStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonStatus::Scheduled => write!(f, "scheduled"),
            LessonStatus::Completed => write!(f, "completed"),
            LessonStatus::Cancelled => write!(f, "cancelled"),
            LessonStatus::NoShow => write!(f, "no-show"),
        }
    }
}

impl std::str::FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(LessonStatus::Scheduled),
            "completed" => Ok(LessonStatus::Completed),
            "cancelled" => Ok(LessonStatus::Cancelled),
            "no-show" => Ok(LessonStatus::NoShow),
            _ => Err(format!("Unknown lesson status: {}", s)),
        }
    }
}

/// Vehicle gearbox type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    Manual,
    Automatic,
}

impl std::fmt::Display for Transmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transmission::Manual => write!(f, "manual"),
            Transmission::Automatic => write!(f, "automatic"),
        }
    }
}

impl std::str::FromStr for Transmission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Transmission::Manual),
            "automatic" => Ok(Transmission::Automatic),
            _ => Err(format!("Unknown transmission: {}", s)),
        }
    }
}

/// Helper to parse a specializations JSON column
pub fn parse_lesson_types(json: Option<&str>) -> Vec<LessonType> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize specializations for storage
pub fn serialize_lesson_types(types: &[LessonType]) -> Option<String> {
    if types.is_empty() {
        None
    } else {
        serde_json::to_string(types).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ranking() {
        assert!(Role::Admin.has_at_least(Role::Instructor));
        assert!(Role::Instructor.has_at_least(Role::Student));
        assert!(Role::Student.has_at_least(Role::User));
        assert!(!Role::User.has_at_least(Role::Student));
        assert!(!Role::Instructor.has_at_least(Role::Admin));
    }

    #[test]
    fn test_effective_role_highest_wins() {
        assert_eq!(Role::effective(["instructor", "admin"]), Role::Admin);
        assert_eq!(Role::effective(["user", "student"]), Role::Student);
        assert_eq!(Role::effective(["instructor"]), Role::Instructor);
    }

    #[test]
    fn test_effective_role_empty_defaults_to_user() {
        assert_eq!(Role::effective([]), Role::User);
    }

    #[test]
    fn test_role_parse_defaults_unknown_to_user() {
        assert_eq!(Role::from("admin".to_string()), Role::Admin);
        assert_eq!(Role::from("ADMIN".to_string()), Role::Admin);
        assert_eq!(Role::from("superuser".to_string()), Role::User);
        assert_eq!(Role::from(String::new()), Role::User);
    }

    #[test]
    fn test_service_kind_wire_names() {
        assert_eq!(
            "driving-lessons".parse::<ServiceKind>().unwrap(),
            ServiceKind::DrivingLessons
        );
        assert_eq!(
            "car-rental".parse::<ServiceKind>().unwrap(),
            ServiceKind::CarRental
        );
        assert!("boat-rental".parse::<ServiceKind>().is_err());
        assert_eq!(ServiceKind::DrivingLessons.to_string(), "driving-lessons");
    }

    #[test]
    fn test_license_category_case_insensitive() {
        assert_eq!("b".parse::<LicenseCategory>().unwrap(), LicenseCategory::B);
        assert_eq!("a2".parse::<LicenseCategory>().unwrap(), LicenseCategory::A2);
        assert!("C".parse::<LicenseCategory>().is_err());
    }

    #[test]
    fn test_lesson_enums_round_trip() {
        for t in [
            LessonType::Theory,
            LessonType::Practical,
            LessonType::TestPreparation,
            LessonType::MockTest,
        ] {
            assert_eq!(t.to_string().parse::<LessonType>().unwrap(), t);
        }
        for s in [
            LessonStatus::Scheduled,
            LessonStatus::Completed,
            LessonStatus::Cancelled,
            LessonStatus::NoShow,
        ] {
            assert_eq!(s.to_string().parse::<LessonStatus>().unwrap(), s);
        }
        assert!("postponed".parse::<LessonStatus>().is_err());
    }

    #[test]
    fn test_lesson_types_json_helpers() {
        let types = vec![LessonType::Theory, LessonType::MockTest];
        let json = serialize_lesson_types(&types).unwrap();
        assert_eq!(parse_lesson_types(Some(&json)), types);

        assert!(parse_lesson_types(None).is_empty());
        assert!(parse_lesson_types(Some("not json")).is_empty());
        assert!(serialize_lesson_types(&[]).is_none());
    }
}
