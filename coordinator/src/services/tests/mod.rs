//! Service-specific tests
//!
//! Each service has its own test file; everything that touches disk works
//! inside a tempfile-backed directory.


// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::Utc;
    use shared::{PointingEvent, ScanType};

    /// A science pointing event with a fixed field position
    pub fn science_event(event_id: &str) -> PointingEvent {
        PointingEvent {
            event_id: event_id.to_string(),
            source_project_id: "AS203".to_string(),
            field_ra: 10.5,
            field_dec: -30.0,
            scan_type: ScanType::Science,
            observed_at: Utc::now(),
        }
    }
}
