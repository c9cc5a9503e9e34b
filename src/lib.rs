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

//! # Leave Ledger
//!
//! This library provides the leave lifecycle of an HR system: applications
//! move from pending to approved or rejected, approvals draw down or earn
//! leave balances, and approved days are marked in an attendance system.
//!
//! ## Core Components
//!
//! - [`LeaveEngine`]: Central processor for applications and decisions
//! - [`BalanceStore`]: Per-employee, per-period leave balances
//! - [`Reconciler`]: Splits requested days into covered days and loss of pay
//! - [`AttendanceNotifier`]: Marks approved dates in the attendance system
//! - [`HierarchySync`]: Keeps managers' direct-report lists consistent
//! - [`LeaveError`]: Error types for leave processing failures
//!
//! ## Example
//!
//! ```
//! use leave_ledger::{
//!     CompanyId, EmployeeId, EmployeeSummary, LeaveEngine, LeaveName, LeaveRequest,
//!     LeaveStatus, LoggingAttendance, MemoryDirectory,
//! };
//! use chrono::Datelike;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let directory = Arc::new(MemoryDirectory::new());
//! directory.add_company(CompanyId::from("C1"), "Acme");
//! directory.upsert_employee(EmployeeSummary::new(
//!     EmployeeId::from("EMP1"),
//!     CompanyId::from("C1"),
//!     "Asha",
//! ));
//! let engine = LeaveEngine::new(directory.clone(), directory, Arc::new(LoggingAttendance));
//! engine.allot_annual(&EmployeeId::from("EMP1"), dec!(2)).unwrap();
//!
//! // Three days against two: the application carries a shortfall warning
//! let today = chrono::Utc::now().date_naive();
//! let start = today.with_day(1).unwrap();
//! let leave = engine
//!     .apply_leave(LeaveRequest {
//!         employee_id: EmployeeId::from("EMP1"),
//!         company_id: CompanyId::from("C1"),
//!         leave_name: LeaveName::Leave,
//!         leave_type: None,
//!         start_date: start,
//!         end_date: Some(start + chrono::Days::new(2)),
//!         shift_type: None,
//!         reason: "family visit".into(),
//!     })
//!     .unwrap();
//! assert!(leave.remarks.is_some());
//!
//! let decision = engine
//!     .update_status(&leave.leave_id, LeaveStatus::Approved, None)
//!     .unwrap();
//! let settlement = decision.settlement.unwrap();
//! assert_eq!(settlement.days_covered_by_leave, dec!(2));
//! assert_eq!(settlement.days_as_lop, dec!(1));
//! ```
//!
//! ## Thread Safety
//!
//! All components take `&self`. Decisions on different leaves and balance
//! movements for different employees proceed in parallel.

mod attendance;
pub mod balance;
mod base;
mod clock;
mod config;
pub mod directory;
mod engine;
pub mod error;
pub mod hierarchy;
mod ids;
pub mod leave;
mod leave_book;
pub mod reconciler;

pub use attendance::{
    Ack, AttendanceMark, AttendanceNotifier, AttendanceService, AttendanceStatus,
    HttpAttendanceService, LoggingAttendance, MarkOutcome,
};
pub use balance::{BalancePeriod, BalanceSnapshot, BalanceStore, CompOffDays, Drawdown, LeaveBalance};
pub use base::{CompanyId, EmployeeId, LeaveId};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServiceConfig;
pub use directory::{Company, CompanyRegistry, EmployeeDirectory, EmployeeSummary, MemoryDirectory, Role};
pub use engine::{Decision, LeaveEngine, LeaveWithEmployee};
pub use error::{ErrorKind, LeaveError};
pub use hierarchy::{HierarchySync, reporting_map};
pub use ids::{IdGenerator, SequentialIds};
pub use leave::{DateSpan, LeaveName, LeaveRecord, LeaveRequest, LeaveStatus, ShiftType, requested_days};
pub use leave_book::LeaveBook;
pub use reconciler::{ReconcileKind, ReconcileMode, Reconciler, Settlement, shortfall_warning};
