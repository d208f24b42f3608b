//! Data Transfer Objects
//!
//! Response types for the meter and health endpoints.

use serde::Serialize;

use crate::meter::Meter;

// ============================================
// METER DTOs
// ============================================

/// Meter list response
#[derive(Debug, Serialize)]
pub struct MeterListResponse {
    /// Meters ordered by slug
    pub meters: Vec<Meter>,
    /// Total count
    pub total: usize,
}

/// Subject list response
#[derive(Debug, Serialize)]
pub struct SubjectListResponse {
    /// Meter slug
    pub meter: String,
    /// Distinct subjects, sorted
    pub subjects: Vec<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Meter catalog status
    pub catalog: String,
    /// Namespace served
    pub namespace: String,
    /// Number of meters in the namespace
    pub meters: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
