//! Point-in-time status snapshot served to polling clients.
//!
//! The snapshot owns copies of everything it reports; it never borrows the
//! live session.  Wire shape (all fields always present):
//!
//! ```text
//! {"in_progress":bool,"status":string,"progress":0-100,
//!  "current":int,"total":int,"error":string,"elapsed":ms}
//! ```

use serde::Serialize;

use super::session::{ErrorMessage, UpdateStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub in_progress: bool,
    pub status: UpdateStatus,
    pub progress: u8,
    #[serde(rename = "current")]
    pub bytes_written: u32,
    #[serde(rename = "total")]
    pub total_size: u32,
    pub error: ErrorMessage,
    pub elapsed: u64,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> String {
        // Fixed-shape struct of plain scalars and strings; serialisation cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Integer percentage, floored.  Only a committed image reports 100.
pub fn progress_percent(status: UpdateStatus, bytes_written: u32, total_size: u32) -> u8 {
    if status == UpdateStatus::Success {
        return 100;
    }
    if total_size == 0 {
        return 0;
    }
    let pct = (bytes_written as u64 * 100 / total_size as u64).min(99);
    pct as u8
}
