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

//! Property-based tests for leave reconciliation.
//!
//! These tests verify invariants that should hold for any balance and any
//! valid leave request.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use leave_ledger::{
    AttendanceMark, AttendanceService, AttendanceStatus, BalancePeriod, BalanceStore, CompanyId,
    DateSpan, EmployeeId, EmployeeSummary, FixedClock, LeaveBalance, LeaveEngine, LeaveId,
    LeaveName, LeaveRecord, LeaveRequest, LeaveStatus, MemoryDirectory, ReconcileKind,
    ReconcileMode, Reconciler, ShiftType, requested_days,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Days in half-day steps, 0.0 to 20.0.
fn arb_days() -> impl Strategy<Value = Decimal> {
    (0i64..=40).prop_map(|halves| Decimal::new(halves * 5, 1))
}

/// Positive days in half-day steps, 0.5 to 15.0.
fn arb_positive_days() -> impl Strategy<Value = Decimal> {
    (1i64..=30).prop_map(|halves| Decimal::new(halves * 5, 1))
}

/// Annual balance, possibly over-drawn.
fn arb_annual() -> impl Strategy<Value = Decimal> {
    (-20i64..=40).prop_map(|halves| Decimal::new(halves * 5, 1))
}

fn arb_shift() -> impl Strategy<Value = Option<ShiftType>> {
    prop_oneof![
        Just(None),
        Just(Some(ShiftType::FullDay)),
        Just(Some(ShiftType::FirstHalf)),
        Just(Some(ShiftType::SecondHalf)),
    ]
}

// =============================================================================
// Helpers
// =============================================================================

fn emp() -> EmployeeId {
    EmployeeId::from("EMP1")
}

fn first_of_october() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()))
}

fn reconciler(annual: Decimal, comp_off: Decimal) -> Reconciler {
    let store = Arc::new(BalanceStore::new());
    store.open(
        &emp(),
        BalancePeriod::new(2026, 10).unwrap(),
        LeaveBalance::new(annual, comp_off).unwrap(),
    );
    Reconciler::new(store, clock())
}

fn record(calendar_days: u64, shift: Option<ShiftType>) -> LeaveRecord {
    let start = first_of_october();
    LeaveRecord {
        leave_id: LeaveId::from("LID0001"),
        employee_id: emp(),
        company_id: CompanyId::from("C1"),
        leave_name: LeaveName::Leave,
        leave_type: None,
        start_date: start,
        end_date: start + Days::new(calendar_days - 1),
        shift_type: shift,
        reason: String::new(),
        status: LeaveStatus::Pending,
        remarks: None,
        created_at: DateTime::<Utc>::MIN_UTC,
    }
}

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

fn engine(annual: Decimal, comp_off: Decimal) -> (LeaveEngine, Arc<Recorder>) {
    let directory = Arc::new(MemoryDirectory::new());
    directory.add_company(CompanyId::from("C1"), "Acme");
    directory.upsert_employee(EmployeeSummary::new(emp(), CompanyId::from("C1"), "Asha"));
    let balances = Arc::new(BalanceStore::new());
    balances.open(
        &emp(),
        BalancePeriod::new(2026, 10).unwrap(),
        LeaveBalance::new(annual, comp_off).unwrap(),
    );
    let recorder = Arc::new(Recorder::default());
    let engine = LeaveEngine::new(directory.clone(), directory, recorder.clone())
        .with_clock(clock())
        .with_balances(balances);
    (engine, recorder)
}

// =============================================================================
// Request Sizing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Half-day shifts charge half a day per calendar date.
    #[test]
    fn half_day_requests_are_halved(days in 1u64..60) {
        let start = first_of_october();
        let span = DateSpan::new(start, start + Days::new(days - 1)).unwrap();
        let expected = Decimal::from(days) * Decimal::new(5, 1);
        prop_assert_eq!(requested_days(&span, Some(ShiftType::FirstHalf)), expected);
        prop_assert_eq!(requested_days(&span, Some(ShiftType::SecondHalf)), expected);
        prop_assert_eq!(requested_days(&span, None), Decimal::from(days));
    }

    /// The span expands to exactly its calendar days, in order.
    #[test]
    fn span_dates_are_consecutive(days in 1u64..90) {
        let start = first_of_october();
        let span = DateSpan::new(start, start + Days::new(days - 1)).unwrap();
        let dates = span.dates();
        prop_assert_eq!(dates.len() as u64, days);
        for pair in dates.windows(2) {
            prop_assert_eq!(pair[0].succ_opt(), Some(pair[1]));
        }
    }
}

// =============================================================================
// Coverage and LOP
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Covered days plus LOP days always equal the request; LOP is exactly
    /// the uncovered part.
    #[test]
    fn covered_plus_lop_is_requested(
        annual in arb_annual(),
        comp_off in arb_days(),
        requested in arb_positive_days(),
    ) {
        let settlement = reconciler(annual, comp_off)
            .reconcile(&emp(), requested, ReconcileKind::Consumption, ReconcileMode::DryRun)
            .unwrap();

        let available = annual + comp_off;
        prop_assert_eq!(settlement.days_covered_by_leave + settlement.days_as_lop, requested);
        if available >= requested {
            prop_assert_eq!(settlement.days_as_lop, Decimal::ZERO);
            prop_assert!(settlement.warning.is_none());
        } else {
            prop_assert_eq!(
                settlement.days_as_lop,
                requested - available.max(Decimal::ZERO)
            );
            prop_assert!(settlement.warning.is_some());
        }
    }

    /// The LOP dates immediately follow the covered dates, with no gap and
    /// no overlap, and together they are the whole leave.
    #[test]
    fn attendance_split_is_contiguous(
        calendar_days in 1u64..30,
        shift in arb_shift(),
        covered in arb_days(),
    ) {
        let leave = record(calendar_days, shift);
        let covered = covered.min(leave.requested_days());
        let (head, tail) = leave.attendance_split(covered);

        let mut dates = Vec::new();
        if let Some(head) = head {
            prop_assert_eq!(head.start(), leave.start_date);
            dates.extend(head.dates());
        }
        if let Some(tail) = tail {
            prop_assert_eq!(tail.end(), leave.end_date);
            if let Some(head) = head {
                prop_assert_eq!(head.end().succ_opt(), Some(tail.start()));
            }
            dates.extend(tail.dates());
        }
        prop_assert_eq!(dates, leave.span().dates());
    }

    /// An approval marks every date once: Leave first, LOP after.
    #[test]
    fn approval_marks_every_date_once(
        annual in arb_annual(),
        comp_off in arb_days(),
        calendar_days in 1u64..15,
        shift in arb_shift(),
    ) {
        let (engine, recorder) = engine(annual, comp_off);
        let start = first_of_october();
        let leave = engine.apply_leave(LeaveRequest {
            employee_id: emp(),
            company_id: CompanyId::from("C1"),
            leave_name: LeaveName::Leave,
            leave_type: None,
            start_date: start,
            end_date: Some(start + Days::new(calendar_days - 1)),
            shift_type: shift,
            reason: String::new(),
        }).unwrap();

        let decision = engine
            .update_status(&leave.leave_id, LeaveStatus::Approved, None)
            .unwrap();
        let settlement = decision.settlement.unwrap();

        let marks = recorder.marks.lock();
        let marked: Vec<NaiveDate> = marks.iter().flat_map(|m| m.dates.clone()).collect();
        prop_assert_eq!(marked, leave.span().dates());

        if settlement.days_as_lop == Decimal::ZERO {
            prop_assert_eq!(marks.len(), 1);
            prop_assert_eq!(marks[0].status, AttendanceStatus::Leave);
        } else {
            prop_assert_eq!(marks.last().map(|m| m.status), Some(AttendanceStatus::Lop));
        }
    }
}

// =============================================================================
// Balance Invariants
// =============================================================================

#[derive(Debug, Clone)]
enum Movement {
    Consume(Decimal),
    Accrue(Decimal),
    Allot(Decimal),
}

fn arb_movement() -> impl Strategy<Value = Movement> {
    prop_oneof![
        arb_positive_days().prop_map(Movement::Consume),
        arb_positive_days().prop_map(Movement::Accrue),
        arb_positive_days().prop_map(Movement::Allot),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Comp-off never goes negative, and an accrual's offset never exceeds
    /// the annual deficit or the accrued days.
    #[test]
    fn comp_off_never_negative(
        annual in arb_annual(),
        comp_off in arb_days(),
        movements in prop::collection::vec(arb_movement(), 1..20),
    ) {
        let reconciler = reconciler(annual, comp_off);

        for movement in movements {
            let before = reconciler.balance(&emp());
            match movement {
                Movement::Consume(days) => {
                    reconciler
                        .reconcile(&emp(), days, ReconcileKind::Consumption, ReconcileMode::Commit)
                        .unwrap();
                }
                Movement::Accrue(days) => {
                    let settlement = reconciler
                        .reconcile(&emp(), days, ReconcileKind::Accrual, ReconcileMode::Commit)
                        .unwrap();
                    let deficit = (-before.remaining_annual_leaves()).max(Decimal::ZERO);
                    prop_assert!(settlement.comp_off_offset <= deficit.min(days));
                    prop_assert!(settlement.comp_off_offset >= Decimal::ZERO);
                    prop_assert_eq!(settlement.days_as_lop, Decimal::ZERO);
                }
                Movement::Allot(days) => {
                    reconciler.allot_annual(&emp(), days).unwrap();
                }
            }
            let after = reconciler.balance(&emp());
            prop_assert!(after.remaining_comp_off_leaves() >= Decimal::ZERO);
            prop_assert_eq!(
                after.new_leave_balance(),
                after.remaining_annual_leaves() + after.comp_off_leaves_earned()
            );
        }
    }

    /// Consumption moves exactly the requested days out of the pools,
    /// comp-off first.
    #[test]
    fn consumption_conserves_days(
        annual in arb_annual(),
        comp_off in arb_days(),
        requested in arb_positive_days(),
    ) {
        let reconciler = reconciler(annual, comp_off);
        reconciler
            .reconcile(&emp(), requested, ReconcileKind::Consumption, ReconcileMode::Commit)
            .unwrap();

        let after = reconciler.balance(&emp());
        prop_assert_eq!(after.total_available(), annual + comp_off - requested);
        prop_assert_eq!(
            after.remaining_comp_off_leaves(),
            (comp_off - requested).max(Decimal::ZERO)
        );
    }

    /// A dry run reports what a commit would do, without doing it.
    #[test]
    fn dry_run_matches_commit(
        annual in arb_annual(),
        comp_off in arb_days(),
        requested in arb_positive_days(),
    ) {
        let reconciler = reconciler(annual, comp_off);
        let before = reconciler.balance(&emp());

        let preview = reconciler
            .reconcile(&emp(), requested, ReconcileKind::Consumption, ReconcileMode::DryRun)
            .unwrap();
        prop_assert_eq!(reconciler.balance(&emp()), before);

        let committed = reconciler
            .reconcile(&emp(), requested, ReconcileKind::Consumption, ReconcileMode::Commit)
            .unwrap();
        prop_assert_eq!(preview, committed);
    }

    /// Repeated decisions on one leave move the balance exactly once.
    #[test]
    fn decisions_are_idempotent(
        annual in arb_annual(),
        attempts in prop::collection::vec(prop::bool::ANY, 1..6),
    ) {
        let (engine, recorder) = engine(annual, Decimal::ZERO);
        let start = first_of_october();
        let leave = engine.apply_leave(LeaveRequest {
            employee_id: emp(),
            company_id: CompanyId::from("C1"),
            leave_name: LeaveName::Leave,
            leave_type: None,
            start_date: start,
            end_date: Some(start + Days::new(1)),
            shift_type: None,
            reason: String::new(),
        }).unwrap();

        let mut decided = None;
        for approve in attempts {
            let status = if approve { LeaveStatus::Approved } else { LeaveStatus::Rejected };
            let result = engine.update_status(&leave.leave_id, status, None);
            match decided {
                None => {
                    prop_assert!(result.is_ok());
                    decided = Some(status);
                }
                Some(_) => prop_assert!(result.is_err()),
            }
        }

        let expected = match decided {
            Some(LeaveStatus::Approved) => annual - Decimal::TWO,
            _ => annual,
        };
        prop_assert_eq!(engine.balance(&emp()).remaining_annual_leaves(), expected);
        prop_assert_eq!(engine.leave(&leave.leave_id).unwrap().status, decided.unwrap());
        let marks = recorder.marks.lock().len();
        if decided == Some(LeaveStatus::Approved) {
            prop_assert!((1..=2).contains(&marks));
        } else {
            prop_assert_eq!(marks, 0);
        }
    }
}
