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

//! Leave processing engine.
//!
//! The [`LeaveEngine`] is the central component: it accepts leave
//! applications, decides them, and keeps balances and attendance in step.
//!
//! # Lifecycle
//!
//! - **Apply**: Validates the request and stores it as `Pending`. A regular
//!   leave is reconciled as a dry run so the applicant sees a shortfall
//!   warning up front.
//! - **Approve**: Commits the balance movement (`Leave` consumes, `Comp-Off`
//!   accrues), then marks attendance for the covered and LOP dates.
//! - **Reject**: Records the decision. Balances are untouched.
//!
//! # Thread Safety
//!
//! Every leave record sits behind its own lock and every employee's balances
//! behind another. A decision takes the record lock, then the balance lock,
//! always in that order. Attendance calls are made after both are released,
//! so a slow attendance service never blocks other decisions.

use crate::attendance::{
    AttendanceMark, AttendanceNotifier, AttendanceService, AttendanceStatus, MarkOutcome,
};
use crate::balance::{BalanceSnapshot, BalanceStore, LeaveBalance};
use crate::base::{CompanyId, EmployeeId, LeaveId};
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::directory::{CompanyRegistry, EmployeeDirectory};
use crate::error::LeaveError;
use crate::ids::{IdGenerator, SequentialIds};
use crate::leave::{DateSpan, LeaveName, LeaveRecord, LeaveRequest, LeaveStatus};
use crate::leave_book::LeaveBook;
use crate::reconciler::{ReconcileKind, ReconcileMode, Reconciler, Settlement};
use crossbeam::queue::SegQueue;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of [`LeaveEngine::update_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The record as stored after the decision.
    pub record: LeaveRecord,
    /// Balance movement; `None` when no pool was touched.
    pub settlement: Option<Settlement>,
    /// One entry per attendance call, in call order.
    pub attendance: Vec<MarkOutcome>,
}

impl Decision {
    /// `true` if every attendance call was acknowledged.
    pub fn attendance_ok(&self) -> bool {
        self.attendance.iter().all(MarkOutcome::is_ok)
    }
}

/// A leave record enriched with its applicant's directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveWithEmployee {
    #[serde(flatten)]
    pub leave: LeaveRecord,
    pub employee_name: Option<String>,
    pub department: Option<String>,
}

/// Leave processing engine.
///
/// # Invariants
///
/// - A leave is decided at most once; the balance moves at most once per leave.
/// - Comp-off never goes negative; annual leave may.
/// - Attendance failures never roll back a decision. Failed marks are kept
///   in a backlog until [`LeaveEngine::retry_attendance`] succeeds.
pub struct LeaveEngine {
    config: ServiceConfig,
    employees: Arc<dyn EmployeeDirectory>,
    companies: Arc<dyn CompanyRegistry>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    balances: Arc<BalanceStore>,
    reconciler: Reconciler,
    leaves: LeaveBook,
    notifier: AttendanceNotifier,
    backlog: SegQueue<AttendanceMark>,
}

impl LeaveEngine {
    /// Creates an engine with an empty balance store, the system clock and
    /// sequential `LID` identifiers.
    pub fn new(
        employees: Arc<dyn EmployeeDirectory>,
        companies: Arc<dyn CompanyRegistry>,
        attendance: Arc<dyn AttendanceService>,
    ) -> Self {
        let balances = Arc::new(BalanceStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        LeaveEngine {
            config: ServiceConfig::default(),
            employees,
            companies,
            ids: Arc::new(SequentialIds::new()),
            reconciler: Reconciler::new(Arc::clone(&balances), Arc::clone(&clock)),
            clock,
            balances,
            leaves: LeaveBook::new(),
            notifier: AttendanceNotifier::new(attendance),
            backlog: SegQueue::new(),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reconciler = Reconciler::new(Arc::clone(&self.balances), Arc::clone(&clock));
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Shares an existing balance store, e.g. one seeded from an import.
    pub fn with_balances(mut self, balances: Arc<BalanceStore>) -> Self {
        self.reconciler = Reconciler::new(Arc::clone(&balances), Arc::clone(&self.clock));
        self.balances = balances;
        self
    }

    /// Validates and stores a new application as `Pending`.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::EmployeeNotFound`] - unknown applicant.
    /// - [`LeaveError::CompanyNotFound`] - unknown company.
    /// - [`LeaveError::Validation`] - blank leave name or end before start.
    pub fn apply_leave(&self, request: LeaveRequest) -> Result<LeaveRecord, LeaveError> {
        if self.employees.employee(&request.employee_id).is_none() {
            return Err(LeaveError::EmployeeNotFound(request.employee_id));
        }
        if self.companies.company(&request.company_id).is_none() {
            return Err(LeaveError::CompanyNotFound(request.company_id));
        }
        if request.leave_name.as_str().trim().is_empty() {
            return Err(LeaveError::Validation("leave name is required".to_string()));
        }
        let span = DateSpan::new(
            request.start_date,
            request.end_date.unwrap_or(request.start_date),
        )?;

        let mut record = LeaveRecord {
            leave_id: self.ids.next_id(&self.config.leave_id_prefix),
            employee_id: request.employee_id,
            company_id: request.company_id,
            leave_name: request.leave_name,
            leave_type: request.leave_type,
            start_date: span.start(),
            end_date: span.end(),
            shift_type: request.shift_type,
            reason: request.reason,
            status: LeaveStatus::Pending,
            remarks: None,
            created_at: self.clock.now(),
        };

        if record.leave_name == LeaveName::Leave {
            let preview = self.reconciler.reconcile(
                &record.employee_id,
                record.requested_days(),
                ReconcileKind::Consumption,
                ReconcileMode::DryRun,
            )?;
            record.remarks = preview.warning;
        }

        self.leaves.insert(record.clone())?;
        info!(
            leave_id = %record.leave_id,
            employee_id = %record.employee_id,
            leave_name = %record.leave_name,
            span = %record.span(),
            days = %record.requested_days(),
            shortfall = record.remarks.is_some(),
            "leave applied"
        );
        Ok(record)
    }

    /// Approves or rejects a pending leave.
    ///
    /// `remarks`, when given, replaces the record's remarks; otherwise the
    /// submission-time warning is kept.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::LeaveNotFound`] - unknown leave.
    /// - [`LeaveError::AlreadyDecided`] - the leave is no longer pending.
    /// - [`LeaveError::InvalidStatus`] - `status` is not a decision.
    /// - [`LeaveError::NegativeCompOff`] / [`LeaveError::Validation`] - the
    ///   balance movement was refused. The leave stays pending.
    ///
    /// Attendance failures are not errors; see [`Decision::attendance`].
    pub fn update_status(
        &self,
        leave_id: &LeaveId,
        status: LeaveStatus,
        remarks: Option<String>,
    ) -> Result<Decision, LeaveError> {
        let handle = self
            .leaves
            .handle(leave_id)
            .ok_or_else(|| LeaveError::LeaveNotFound(leave_id.clone()))?;

        let (record, settlement) = {
            let mut record = handle.lock();
            if record.status.is_terminal() {
                return Err(LeaveError::AlreadyDecided {
                    status: record.status,
                });
            }
            if !status.is_terminal() {
                return Err(LeaveError::InvalidStatus(status.as_str().to_string()));
            }

            let kind = match (&record.leave_name, status) {
                (LeaveName::Leave, LeaveStatus::Approved) => Some(ReconcileKind::Consumption),
                (LeaveName::CompOff, LeaveStatus::Approved) => Some(ReconcileKind::Accrual),
                _ => None,
            };
            let settlement = kind
                .map(|kind| {
                    self.reconciler.reconcile(
                        &record.employee_id,
                        record.requested_days(),
                        kind,
                        ReconcileMode::Commit,
                    )
                })
                .transpose()?;

            record.status = status;
            if remarks.is_some() {
                record.remarks = remarks;
            }
            (record.clone(), settlement)
        };

        let attendance = match (&record.leave_name, &settlement) {
            (LeaveName::Leave, Some(settlement)) => self.mark_attendance(&record, settlement),
            _ => Vec::new(),
        };

        info!(
            leave_id = %record.leave_id,
            employee_id = %record.employee_id,
            status = %record.status,
            covered = ?settlement.as_ref().map(|s| s.days_covered_by_leave),
            lop = ?settlement.as_ref().map(|s| s.days_as_lop),
            "leave decided"
        );
        Ok(Decision {
            record,
            settlement,
            attendance,
        })
    }

    /// Marks the covered head as `Leave` and the rest as `LOP`.
    fn mark_attendance(&self, record: &LeaveRecord, settlement: &Settlement) -> Vec<MarkOutcome> {
        let (covered, lop) = record.attendance_split(settlement.days_covered_by_leave);
        [(AttendanceStatus::Leave, covered), (AttendanceStatus::Lop, lop)]
            .into_iter()
            .filter_map(|(status, span)| span.map(|span| (status, span)))
            .map(|(status, span)| {
                let mark = AttendanceMark::new(&record.employee_id, status, &span, &record.leave_id);
                self.deliver(mark)
            })
            .collect()
    }

    /// Sends one mark; a failed mark joins the backlog.
    fn deliver(&self, mark: AttendanceMark) -> MarkOutcome {
        let result = self.notifier.send(&mark);
        if let Err(e) = &result {
            warn!(
                leave_id = %mark.leave_id,
                employee_id = %mark.employee_id,
                status = %mark.status,
                days = mark.dates.len(),
                error = %e,
                "attendance marking failed"
            );
            self.backlog.push(mark.clone());
        }
        MarkOutcome { mark, result }
    }

    /// Removes and returns every mark still waiting for delivery.
    pub fn attendance_backlog(&self) -> Vec<AttendanceMark> {
        std::iter::from_fn(|| self.backlog.pop()).collect()
    }

    /// Number of marks waiting for delivery.
    pub fn pending_attendance(&self) -> usize {
        self.backlog.len()
    }

    /// Sends every backlogged mark once more. Marks that fail again go back
    /// into the backlog.
    pub fn retry_attendance(&self) -> Vec<MarkOutcome> {
        let outcomes: Vec<MarkOutcome> = self
            .attendance_backlog()
            .into_iter()
            .map(|mark| self.deliver(mark))
            .collect();
        if !outcomes.is_empty() {
            info!(
                retried = outcomes.len(),
                delivered = outcomes.iter().filter(|o| o.is_ok()).count(),
                "attendance backlog retried"
            );
        }
        outcomes
    }

    /// # Errors
    ///
    /// Returns [`LeaveError::LeaveNotFound`] for an unknown leave.
    pub fn leave(&self, leave_id: &LeaveId) -> Result<LeaveRecord, LeaveError> {
        self.leaves
            .get(leave_id)
            .ok_or_else(|| LeaveError::LeaveNotFound(leave_id.clone()))
    }

    /// An employee's leaves, oldest first.
    pub fn leaves_for_employee(&self, employee_id: &EmployeeId) -> Vec<LeaveRecord> {
        self.leaves.filter(|leave| &leave.employee_id == employee_id)
    }

    /// A company's leaves in `status`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::CompanyNotFound`] for an unknown company.
    pub fn leaves_by_status(
        &self,
        company_id: &CompanyId,
        status: LeaveStatus,
    ) -> Result<Vec<LeaveWithEmployee>, LeaveError> {
        if self.companies.company(company_id).is_none() {
            return Err(LeaveError::CompanyNotFound(company_id.clone()));
        }
        let leaves = self
            .leaves
            .filter(|leave| &leave.company_id == company_id && leave.status == status);
        Ok(self.enrich(leaves))
    }

    /// Leaves in `status` applied for by the manager's direct reports.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::EmployeeNotFound`] for an unknown manager.
    pub fn leaves_for_manager(
        &self,
        manager_id: &EmployeeId,
        status: LeaveStatus,
    ) -> Result<Vec<LeaveWithEmployee>, LeaveError> {
        if self.employees.employee(manager_id).is_none() {
            return Err(LeaveError::EmployeeNotFound(manager_id.clone()));
        }
        let team: Vec<EmployeeId> = self
            .employees
            .employees_by_manager(manager_id)
            .into_iter()
            .map(|employee| employee.employee_id)
            .collect();
        if team.is_empty() {
            return Ok(Vec::new());
        }
        let leaves = self
            .leaves
            .filter(|leave| leave.status == status && team.contains(&leave.employee_id));
        Ok(self.enrich(leaves))
    }

    fn enrich(&self, leaves: Vec<LeaveRecord>) -> Vec<LeaveWithEmployee> {
        leaves
            .into_iter()
            .map(|leave| {
                let employee = self.employees.employee(&leave.employee_id);
                LeaveWithEmployee {
                    employee_name: employee.as_ref().map(|e| e.name.clone()),
                    department: employee.and_then(|e| e.department),
                    leave,
                }
            })
            .collect()
    }

    /// Current-period balance; zero for an employee with no history.
    pub fn balance(&self, employee_id: &EmployeeId) -> LeaveBalance {
        self.reconciler.balance(employee_id)
    }

    /// Credits annual leave to a known employee.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::EmployeeNotFound`] - unknown employee.
    /// - [`LeaveError::Validation`] - `days` is not positive.
    pub fn allot_annual(
        &self,
        employee_id: &EmployeeId,
        days: Decimal,
    ) -> Result<LeaveBalance, LeaveError> {
        if self.employees.employee(employee_id).is_none() {
            return Err(LeaveError::EmployeeNotFound(employee_id.clone()));
        }
        self.reconciler.allot_annual(employee_id, days)
    }

    /// Every recorded balance period, ordered by employee then period.
    pub fn balance_report(&self) -> Vec<BalanceSnapshot> {
        self.balances.snapshots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::directory::{EmployeeSummary, MemoryDirectory};
    use chrono::{NaiveDate, TimeZone, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct Recorder {
        marks: Mutex<Vec<AttendanceMark>>,
    }

    impl AttendanceService for Recorder {
        fn mark_bulk(&self, mark: &AttendanceMark) -> Result<String, String> {
            self.marks.lock().push(mark.clone());
            Ok("ok".into())
        }
    }

    fn engine() -> (LeaveEngine, Arc<Recorder>) {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_company(CompanyId::from("C1"), "Acme");
        directory.upsert_employee(EmployeeSummary::new(
            EmployeeId::from("EMP1"),
            CompanyId::from("C1"),
            "Asha",
        ));
        let recorder = Arc::new(Recorder::default());
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()));
        let engine = LeaveEngine::new(directory.clone(), directory, recorder.clone()).with_clock(clock);
        (engine, recorder)
    }

    fn request(name: &str, start: u32, end: u32) -> LeaveRequest {
        LeaveRequest {
            employee_id: EmployeeId::from("EMP1"),
            company_id: CompanyId::from("C1"),
            leave_name: LeaveName::from(name),
            leave_type: None,
            start_date: NaiveDate::from_ymd_opt(2026, 10, start).unwrap(),
            end_date: Some(NaiveDate::from_ymd_opt(2026, 10, end).unwrap()),
            shift_type: None,
            reason: String::new(),
        }
    }

    #[test]
    fn apply_generates_prefixed_ids() {
        let (engine, _) = engine();
        let first = engine.apply_leave(request("Leave", 1, 1)).unwrap();
        let second = engine.apply_leave(request("Leave", 2, 2)).unwrap();
        assert_eq!(first.leave_id.as_str(), "LID0001");
        assert_eq!(second.leave_id.as_str(), "LID0002");
        assert_eq!(first.status, LeaveStatus::Pending);
    }

    #[test]
    fn end_date_defaults_to_start() {
        let (engine, _) = engine();
        let mut req = request("Leave", 3, 3);
        req.end_date = None;
        let record = engine.apply_leave(req).unwrap();
        assert_eq!(record.end_date, record.start_date);
    }

    #[test]
    fn pending_is_not_a_decision() {
        let (engine, _) = engine();
        let record = engine.apply_leave(request("Leave", 1, 1)).unwrap();
        let result = engine.update_status(&record.leave_id, LeaveStatus::Pending, None);
        assert_eq!(result, Err(LeaveError::InvalidStatus("Pending".into())));
        assert_eq!(engine.leave(&record.leave_id).unwrap().status, LeaveStatus::Pending);
    }

    #[test]
    fn fully_covered_leave_sends_one_mark() {
        let (engine, recorder) = engine();
        engine.allot_annual(&EmployeeId::from("EMP1"), dec!(10)).unwrap();
        let record = engine.apply_leave(request("Leave", 1, 3)).unwrap();
        assert_eq!(record.remarks, None);

        let decision = engine
            .update_status(&record.leave_id, LeaveStatus::Approved, None)
            .unwrap();
        assert!(decision.attendance_ok());
        let marks = recorder.marks.lock();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].status, AttendanceStatus::Leave);
        assert_eq!(marks[0].dates.len(), 3);
    }

    #[test]
    fn other_leave_names_have_no_balance_effect() {
        let (engine, recorder) = engine();
        let record = engine.apply_leave(request("Sabbatical", 1, 3)).unwrap();
        assert_eq!(record.remarks, None);

        let decision = engine
            .update_status(&record.leave_id, LeaveStatus::Approved, None)
            .unwrap();
        assert_eq!(decision.settlement, None);
        assert!(decision.attendance.is_empty());
        assert!(recorder.marks.lock().is_empty());
        assert_eq!(engine.balance(&EmployeeId::from("EMP1")), LeaveBalance::zero());
    }
}
