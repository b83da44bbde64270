//! Shared constants for the integration tests

// ============================================================================
// Places
// ============================================================================

/// Fort Santiago, Intramuros
pub const PLAZA_LAT: f64 = 14.5918;
pub const PLAZA_LON: f64 = 120.9733;

/// About 5 m north of the plaza point, in another 6-decimal bucket
pub const NEIGHBOR_LAT: f64 = 14.591845;

/// About 11 m north of the plaza point
pub const CORNER_LAT: f64 = 14.5919;

/// Sydney Opera House, far from everything else
pub const FAR_LAT: f64 = -33.8568;
pub const FAR_LON: f64 = 151.2153;

// ============================================================================
// Subjects
// ============================================================================

pub const EXTERNAL_TRACK: &str = "spotify:xyz";
