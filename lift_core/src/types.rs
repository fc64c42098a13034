//! Core domain types for the workout session engine.
//!
//! This module defines the types shared between the session model, the
//! result cache and the backend collaborator:
//! - Identifiers (exercises, users)
//! - Weight units
//! - Records exchanged with the backend (workout rows, profile, analytics)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of an exercise entry. Assigned at creation, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExerciseId(Uuid);

impl ExerciseId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the user whose data is being viewed (an email in practice)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Unit a set's weight was entered in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Kg,
    Lb,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Lb => "lb",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Unit {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" => Ok(Unit::Kg),
            "lb" | "lbs" => Ok(Unit::Lb),
            other => Err(crate::Error::Validation(format!("unknown unit '{}'", other))),
        }
    }
}

// ============================================================================
// Backend Records
// ============================================================================

/// Most recent recorded performance for an exercise name
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPerformance {
    pub weight_kg: f64,
    pub reps: u32,
}

/// One flattened set, as sent to the backend when a workout is saved
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRecord {
    pub date: DateTime<Utc>,
    pub motion: String,
    pub set: usize,
    pub weight: f64,
    pub unit: Unit,
    pub reps: u32,
    pub weight_in_kg: f64,
    pub note: String,
}

/// User profile as stored by the backend
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub should_show_reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_weight_kg: Option<f64>,
}

/// Summary of another user, visible to admins
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub email: String,
    pub name: String,
}

/// Data loaded once when a user becomes active
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    pub profile: Profile,
    #[serde(default)]
    pub all_users: Vec<UserSummary>,
}

/// Dated body-weight sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightPoint {
    pub date: NaiveDate,
    pub weight: f64,
}

/// Dated training-volume sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub date: NaiveDate,
    pub volume: f64,
}

/// Server-derived analytics. Chart series beyond the two histories are
/// passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    #[serde(default)]
    pub weight_history: Vec<WeightPoint>,
    #[serde(default)]
    pub volume_history: Vec<VolumePoint>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Personal records. Entries (including E1RM figures) are computed upstream
/// and treated as opaque here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrData {
    #[serde(default)]
    pub bests: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "repPRs")]
    pub rep_prs: BTreeMap<String, serde_json::Value>,
}

/// One dated set of body photos
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Workout templates: template name to ordered exercise names
pub type Templates = BTreeMap<String, Vec<String>>;

/// Backend acknowledgement of a write
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub message: String,
}
