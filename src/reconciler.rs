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

//! Balance reconciliation.
//!
//! The [`Reconciler`] turns a number of requested leave days into pool
//! movements and a covered/loss-of-pay split. The same computation backs the
//! submission-time warning ([`ReconcileMode::DryRun`]) and the approval-time
//! settlement ([`ReconcileMode::Commit`]).
//!
//! # Consumption
//!
//! | Step | Effect |
//! |------|--------|
//! | 1 | `available = comp-off + annual` |
//! | 2 | comp-off drawn first, up to the request |
//! | 3 | remainder debited from annual (may go negative) |
//! | 4 | covered = `available` clamped to `0..=requested`, LOP = the rest |
//!
//! # Accrual
//!
//! Approved comp-off credits the comp-off pool. Part of the credit is
//! absorbed by a negative annual balance, capped at the credited days.

use crate::balance::{BalancePeriod, BalanceStore, Drawdown, LeaveBalance};
use crate::base::EmployeeId;
use crate::clock::Clock;
use crate::error::LeaveError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Compute only; the store is not touched.
    DryRun,
    /// Apply the movement to the store atomically.
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileKind {
    /// Regular leave drawing down the pools.
    Consumption,
    /// Comp-off being earned.
    Accrual,
}

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub requested_days: Decimal,
    pub days_covered_by_leave: Decimal,
    pub days_as_lop: Decimal,
    /// Comp-off before the movement.
    pub comp_off_available: Decimal,
    /// Annual leave before the movement.
    pub annual_available: Decimal,
    /// Comp-off absorbed by a negative annual balance (accrual only).
    pub comp_off_offset: Decimal,
    /// How the request was drawn from the pools (consumption only).
    pub drawdown: Option<Drawdown>,
    /// Balance after the movement; for a dry run, what it would be.
    pub balance: LeaveBalance,
    pub warning: Option<String>,
}

impl Settlement {
    pub fn total_available(&self) -> Decimal {
        self.comp_off_available + self.annual_available
    }
}

/// Reconciles leave requests against the current period's balance.
pub struct Reconciler {
    store: Arc<BalanceStore>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(store: Arc<BalanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &BalanceStore {
        &self.store
    }

    /// Period balances are read from and written to.
    pub fn current_period(&self) -> BalancePeriod {
        BalancePeriod::containing(self.clock.now().date_naive())
    }

    /// Current-period balance of `employee_id`.
    pub fn balance(&self, employee_id: &EmployeeId) -> LeaveBalance {
        self.store.snapshot(employee_id, self.current_period())
    }

    /// Reconciles `requested_days` for `employee_id`.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::Validation`] - `requested_days` is not positive.
    /// - [`LeaveError::NegativeCompOff`] - the movement would break the
    ///   comp-off floor. The store is left untouched.
    pub fn reconcile(
        &self,
        employee_id: &EmployeeId,
        requested_days: Decimal,
        kind: ReconcileKind,
        mode: ReconcileMode,
    ) -> Result<Settlement, LeaveError> {
        let period = self.current_period();
        let apply = |balance: &mut LeaveBalance| -> Result<(LeaveBalance, Movement), LeaveError> {
            let before = balance.clone();
            let movement = match kind {
                ReconcileKind::Consumption => Movement::Drawn(balance.consume(requested_days)?),
                ReconcileKind::Accrual => Movement::Accrued(balance.accrue_comp_off(requested_days)?),
            };
            Ok((before, movement))
        };

        let ((before, movement), after) = match mode {
            ReconcileMode::DryRun => {
                let mut working = self.store.snapshot(employee_id, period);
                let output = apply(&mut working)?;
                (output, working)
            }
            ReconcileMode::Commit => self.store.update(employee_id, period, apply)?,
        };

        let settlement = settle(requested_days, &before, movement, after);
        if mode == ReconcileMode::Commit {
            debug!(
                employee_id = %employee_id,
                %period,
                requested = %settlement.requested_days,
                covered = %settlement.days_covered_by_leave,
                lop = %settlement.days_as_lop,
                offset = %settlement.comp_off_offset,
                "balance reconciled"
            );
        }
        Ok(settlement)
    }

    /// Credits annual leave directly. This is the only movement that raises
    /// a negative annual balance.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::Validation`] if `days` is not positive.
    pub fn allot_annual(
        &self,
        employee_id: &EmployeeId,
        days: Decimal,
    ) -> Result<LeaveBalance, LeaveError> {
        let period = self.current_period();
        let ((), balance) = self
            .store
            .update(employee_id, period, |balance| balance.allot_annual(days))?;
        debug!(employee_id = %employee_id, %period, %days, "annual leave allotted");
        Ok(balance)
    }
}

/// Pool movement made by one reconciliation.
enum Movement {
    Drawn(Drawdown),
    /// Comp-off offset absorbed by a negative annual balance.
    Accrued(Decimal),
}

fn settle(
    requested_days: Decimal,
    before: &LeaveBalance,
    movement: Movement,
    balance: LeaveBalance,
) -> Settlement {
    let comp_off_available = before.remaining_comp_off_leaves();
    let annual_available = before.remaining_annual_leaves();

    let (days_covered_by_leave, days_as_lop, warning) = match movement {
        Movement::Drawn(_) => {
            let covered = before
                .total_available()
                .clamp(Decimal::ZERO, requested_days);
            let warning = shortfall_warning(requested_days, comp_off_available, annual_available);
            (covered, requested_days - covered, warning)
        }
        Movement::Accrued(_) => (Decimal::ZERO, Decimal::ZERO, None),
    };
    let (drawdown, comp_off_offset) = match movement {
        Movement::Drawn(drawdown) => (Some(drawdown), Decimal::ZERO),
        Movement::Accrued(offset) => (None, offset),
    };

    Settlement {
        requested_days,
        days_covered_by_leave,
        days_as_lop,
        comp_off_available,
        annual_available,
        comp_off_offset,
        drawdown,
        balance,
        warning,
    }
}

/// Human-readable shortfall notice, or `None` when the pools cover the request.
pub fn shortfall_warning(requested: Decimal, comp_off: Decimal, annual: Decimal) -> Option<String> {
    let available = comp_off + annual;
    (requested > available).then(|| {
        format!(
            "WARNING: Insufficient leave balance. This will be marked as LOP if approved. \
             Requested: {requested:.1} days, Available: {available:.1} days \
             (Comp-off: {comp_off:.1}, Annual: {annual:.1})"
        )
    })
}
