// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Attendance marking for approved leave.
//!
//! An approval is marked in the external attendance system as up to two
//! bulk requests: covered dates as `Leave`, the rest as `LOP`. Marking is
//! best effort. A failure is reported to the caller but never undoes the
//! leave decision.

use crate::base::{EmployeeId, LeaveId};
use crate::config::ServiceConfig;
use crate::error::LeaveError;
use crate::leave::DateSpan;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Leave,
    #[serde(rename = "LOP")]
    Lop,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Leave => "Leave",
            Self::Lop => "LOP",
        })
    }
}

/// Bulk date-marking request, as sent on the wire.
///
/// ```json
/// {"employeeId": "EMP1", "status": "LOP", "dates": ["2026-10-04", "2026-10-05"], "leaveId": "LID0001"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub employee_id: EmployeeId,
    pub status: AttendanceStatus,
    pub dates: Vec<NaiveDate>,
    pub leave_id: LeaveId,
}

impl AttendanceMark {
    /// Request marking every date of `span`.
    pub fn new(
        employee_id: &EmployeeId,
        status: AttendanceStatus,
        span: &DateSpan,
        leave_id: &LeaveId,
    ) -> Self {
        Self {
            employee_id: employee_id.clone(),
            status,
            dates: span.dates(),
            leave_id: leave_id.clone(),
        }
    }
}

/// External attendance system.
pub trait AttendanceService: Send + Sync {
    /// Marks every date in the request. Returns the service's opaque
    /// acknowledgement, or an error description.
    fn mark_bulk(&self, mark: &AttendanceMark) -> Result<String, String>;
}

/// Acknowledgement body returned by the attendance service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack(pub String);

/// Result of one attendance call made on behalf of a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub mark: AttendanceMark,
    pub result: Result<Ack, LeaveError>,
}

impl MarkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Translates date ranges into attendance service calls.
#[derive(Clone)]
pub struct AttendanceNotifier {
    service: Arc<dyn AttendanceService>,
}

impl AttendanceNotifier {
    pub fn new(service: Arc<dyn AttendanceService>) -> Self {
        Self { service }
    }

    /// Marks every date of `span` with `status`.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::Validation`] - the span expands to no dates.
    /// - [`LeaveError::Downstream`] - the attendance service failed.
    pub fn mark_range(
        &self,
        employee_id: &EmployeeId,
        status: AttendanceStatus,
        span: &DateSpan,
        leave_id: &LeaveId,
    ) -> Result<Ack, LeaveError> {
        self.send(&AttendanceMark::new(employee_id, status, span, leave_id))
    }

    /// Sends a prepared request once.
    ///
    /// # Errors
    ///
    /// Same as [`AttendanceNotifier::mark_range`].
    pub fn send(&self, mark: &AttendanceMark) -> Result<Ack, LeaveError> {
        if mark.dates.is_empty() {
            return Err(LeaveError::Validation(
                "attendance dates cannot be empty".to_string(),
            ));
        }
        self.service
            .mark_bulk(mark)
            .map(Ack)
            .map_err(LeaveError::Downstream)
    }
}

/// Attendance service reached over HTTP at `{base_url}/mark-bulk`.
///
/// Each call is a single attempt bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpAttendanceService {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpAttendanceService {
    /// # Errors
    ///
    /// Returns [`LeaveError::Downstream`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LeaveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LeaveError::Downstream(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/mark-bulk", base_url.trim_end_matches('/')),
        })
    }

    /// Client bounded by the configured attendance timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::Downstream`] if the HTTP client cannot be built.
    pub fn from_config(base_url: &str, config: &ServiceConfig) -> Result<Self, LeaveError> {
        Self::new(base_url, config.attendance_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AttendanceService for HttpAttendanceService {
    fn mark_bulk(&self, mark: &AttendanceMark) -> Result<String, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(mark)
            .send()
            .map_err(|e| format!("POST {}: {e}", self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| format!("reading response from {}: {e}", self.endpoint))?;
        if !status.is_success() {
            return Err(format!("{} returned {status}: {body}", self.endpoint));
        }
        Ok(body)
    }
}

/// Logs each request and acknowledges it. For runs without an attendance
/// service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAttendance;

impl AttendanceService for LoggingAttendance {
    fn mark_bulk(&self, mark: &AttendanceMark) -> Result<String, String> {
        info!(
            employee_id = %mark.employee_id,
            leave_id = %mark.leave_id,
            status = %mark.status,
            days = mark.dates.len(),
            "attendance marked"
        );
        Ok("logged".to_string())
    }
}
