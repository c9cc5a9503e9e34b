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

//! Leave balance ledger.
//!
//! Each employee owns a history of monthly [`LeaveBalance`] snapshots guarded
//! by one lock. Every mutation is applied to a copy of the period's balance
//! and written back only if it succeeds, so a reconciliation is never half
//! applied.
//!
//! ```text
//!  2026-09 ──(first touch of 2026-10)──► 2026-10
//!  annual, comp-off carried; comp-off earned reset; yearly total reset in January
//! ```
//!
//! # Example
//!
//! ```
//! use leave_ledger::{BalancePeriod, BalanceStore, EmployeeId, LeaveBalance};
//! use rust_decimal_macros::dec;
//!
//! let store = BalanceStore::new();
//! let period = BalancePeriod::new(2026, 10).unwrap();
//! store.open(&EmployeeId::from("EMP1"), period, LeaveBalance::new(dec!(2), dec!(1)).unwrap());
//!
//! let balance = store.snapshot(&EmployeeId::from("EMP1"), period);
//! assert_eq!(balance.total_available(), dec!(3));
//! ```

use crate::base::EmployeeId;
use crate::error::LeaveError;
use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar month a balance snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BalancePeriod {
    year: i32,
    month: u32,
}

impl BalancePeriod {
    /// # Errors
    ///
    /// Returns [`LeaveError::Validation`] if `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, LeaveError> {
        if !(1..=12).contains(&month) {
            return Err(LeaveError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for BalancePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Comp-off days. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CompOffDays(Decimal);

impl CompOffDays {
    pub const ZERO: CompOffDays = CompOffDays(Decimal::ZERO);

    /// # Errors
    ///
    /// Returns [`LeaveError::NegativeCompOff`] for values below zero.
    pub fn new(days: Decimal) -> Result<Self, LeaveError> {
        if days < Decimal::ZERO {
            return Err(LeaveError::NegativeCompOff(days));
        }
        Ok(Self(days))
    }

    pub fn get(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CompOffDays {
    type Error = LeaveError;

    fn try_from(days: Decimal) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<CompOffDays> for Decimal {
    fn from(days: CompOffDays) -> Self {
        days.0
    }
}

/// How a consumption was split across the two pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawdown {
    pub comp_off_used: Decimal,
    pub annual_debited: Decimal,
}

/// An employee's leave pools for one period.
///
/// Annual leave has no floor: an over-drawn balance is settled as loss of pay.
/// Comp-off is typed as [`CompOffDays`] and can never go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    remaining_annual_leaves: Decimal,
    remaining_comp_off_leaves: CompOffDays,
    comp_off_leaves_earned: Decimal,
    total_comp_off_earned: Decimal,
    /// `remaining_annual_leaves + comp_off_leaves_earned` at the last mutation.
    new_leave_balance: Decimal,
}

impl LeaveBalance {
    /// # Errors
    ///
    /// Returns [`LeaveError::NegativeCompOff`] if `comp_off` is negative.
    pub fn new(annual: Decimal, comp_off: Decimal) -> Result<Self, LeaveError> {
        let mut balance = Self {
            remaining_annual_leaves: annual,
            remaining_comp_off_leaves: CompOffDays::new(comp_off)?,
            comp_off_leaves_earned: Decimal::ZERO,
            total_comp_off_earned: Decimal::ZERO,
            new_leave_balance: Decimal::ZERO,
        };
        balance.refresh_snapshot();
        Ok(balance)
    }

    pub fn zero() -> Self {
        Self {
            remaining_annual_leaves: Decimal::ZERO,
            remaining_comp_off_leaves: CompOffDays::ZERO,
            comp_off_leaves_earned: Decimal::ZERO,
            total_comp_off_earned: Decimal::ZERO,
            new_leave_balance: Decimal::ZERO,
        }
    }

    pub fn remaining_annual_leaves(&self) -> Decimal {
        self.remaining_annual_leaves
    }

    pub fn remaining_comp_off_leaves(&self) -> Decimal {
        self.remaining_comp_off_leaves.get()
    }

    pub fn comp_off_leaves_earned(&self) -> Decimal {
        self.comp_off_leaves_earned
    }

    pub fn total_comp_off_earned(&self) -> Decimal {
        self.total_comp_off_earned
    }

    pub fn new_leave_balance(&self) -> Decimal {
        self.new_leave_balance
    }

    /// Returns `comp-off + annual`. Negative when annual is over-drawn past the comp-off pool.
    pub fn total_available(&self) -> Decimal {
        self.remaining_comp_off_leaves.get() + self.remaining_annual_leaves
    }

    fn refresh_snapshot(&mut self) {
        self.new_leave_balance = self.remaining_annual_leaves + self.comp_off_leaves_earned;
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.remaining_comp_off_leaves.get() >= Decimal::ZERO,
            "Invariant violated: comp-off went negative: {}",
            self.remaining_comp_off_leaves.get()
        );
        debug_assert!(
            self.new_leave_balance == self.remaining_annual_leaves + self.comp_off_leaves_earned,
            "Invariant violated: stale new leave balance"
        );
    }

    /// Draws `requested` days, comp-off first, the rest from annual (may go negative).
    pub(crate) fn consume(&mut self, requested: Decimal) -> Result<Drawdown, LeaveError> {
        ensure_positive(requested)?;
        let comp_off_used = self.remaining_comp_off_leaves.get().min(requested);
        let annual_debited = requested - comp_off_used;

        self.remaining_comp_off_leaves =
            CompOffDays::new(self.remaining_comp_off_leaves.get() - comp_off_used)?;
        self.remaining_annual_leaves -= annual_debited;
        self.refresh_snapshot();
        self.assert_invariants();
        Ok(Drawdown {
            comp_off_used,
            annual_debited,
        })
    }

    /// Credits earned comp-off, absorbing up to the annual deficit.
    ///
    /// The annual balance itself is left as is; only a direct annual
    /// allotment raises it. Returns the absorbed offset.
    pub(crate) fn accrue_comp_off(&mut self, days: Decimal) -> Result<Decimal, LeaveError> {
        ensure_positive(days)?;
        self.comp_off_leaves_earned += days;
        self.total_comp_off_earned += days;

        let offset = if self.remaining_annual_leaves < Decimal::ZERO {
            (-self.remaining_annual_leaves).min(days)
        } else {
            Decimal::ZERO
        };
        self.remaining_comp_off_leaves =
            CompOffDays::new(self.remaining_comp_off_leaves.get() + days - offset)?;
        self.refresh_snapshot();
        self.assert_invariants();
        Ok(offset)
    }

    /// Credits annual leave (policy allotment).
    pub(crate) fn allot_annual(&mut self, days: Decimal) -> Result<(), LeaveError> {
        ensure_positive(days)?;
        self.remaining_annual_leaves += days;
        self.refresh_snapshot();
        self.assert_invariants();
        Ok(())
    }

    /// Opening balance of the period following `self`.
    fn carried_into(&self, same_year: bool) -> Self {
        let mut next = Self {
            remaining_annual_leaves: self.remaining_annual_leaves,
            remaining_comp_off_leaves: self.remaining_comp_off_leaves,
            comp_off_leaves_earned: Decimal::ZERO,
            total_comp_off_earned: if same_year {
                self.total_comp_off_earned
            } else {
                Decimal::ZERO
            },
            new_leave_balance: Decimal::ZERO,
        };
        next.refresh_snapshot();
        next
    }
}

fn ensure_positive(days: Decimal) -> Result<(), LeaveError> {
    if days <= Decimal::ZERO {
        return Err(LeaveError::Validation(format!(
            "leave days must be positive, got {days}"
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct BalanceHistory {
    periods: BTreeMap<BalancePeriod, LeaveBalance>,
}

impl BalanceHistory {
    /// Balance the period would open with, without recording it.
    fn peek(&self, period: BalancePeriod) -> LeaveBalance {
        if let Some(balance) = self.periods.get(&period) {
            return balance.clone();
        }
        match self.periods.range(..period).next_back() {
            Some((previous, balance)) => balance.carried_into(previous.year == period.year),
            None => LeaveBalance::zero(),
        }
    }
}

/// Employee balance history behind a single lock.
#[derive(Debug, Default)]
struct EmployeeLedger {
    inner: Mutex<BalanceHistory>,
}

/// Per-employee, per-period leave balances.
///
/// Employees are independent: mutations for different employees never
/// contend. All mutations for one employee are serialized.
#[derive(Debug, Default)]
pub struct BalanceStore {
    ledgers: DashMap<EmployeeId, EmployeeLedger>,
}

impl BalanceStore {
    const DAYS_PRECISION: u32 = 2;

    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
        }
    }

    /// Sets the balance of a period outright (import, policy seeding).
    pub fn open(&self, employee_id: &EmployeeId, period: BalancePeriod, balance: LeaveBalance) {
        let ledger = self.ledgers.entry(employee_id.clone()).or_default();
        ledger.inner.lock().periods.insert(period, balance);
    }

    /// Balance for `period`, rolled over from the latest earlier period if
    /// the period has not been opened yet. Does not mutate the store.
    pub fn snapshot(&self, employee_id: &EmployeeId, period: BalancePeriod) -> LeaveBalance {
        self.ledgers
            .get(employee_id)
            .map(|ledger| ledger.inner.lock().peek(period))
            .unwrap_or_else(LeaveBalance::zero)
    }

    /// Applies `mutation` to the period's balance as one atomic update.
    ///
    /// The mutation runs on a copy; the copy replaces the stored balance only
    /// when the mutation returns `Ok`. Returns the mutation's output together
    /// with the balance after the update.
    ///
    /// # Errors
    ///
    /// Propagates the mutation's error. The stored balance is unchanged.
    pub fn update<T>(
        &self,
        employee_id: &EmployeeId,
        period: BalancePeriod,
        mutation: impl FnOnce(&mut LeaveBalance) -> Result<T, LeaveError>,
    ) -> Result<(T, LeaveBalance), LeaveError> {
        let ledger = self.ledgers.entry(employee_id.clone()).or_default().downgrade();
        let mut history = ledger.inner.lock();

        let mut working = history.peek(period);
        let output = mutation(&mut working)?;
        history.periods.insert(period, working.clone());
        Ok((output, working))
    }

    /// Every recorded period of every employee, ordered by employee then period.
    pub fn snapshots(&self) -> Vec<BalanceSnapshot> {
        let mut rows: Vec<BalanceSnapshot> = self
            .ledgers
            .iter()
            .flat_map(|entry| {
                let employee_id = entry.key().clone();
                let history = entry.value().inner.lock();
                history
                    .periods
                    .iter()
                    .map(|(period, balance)| BalanceSnapshot {
                        employee_id: employee_id.clone(),
                        period: *period,
                        balance: balance.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        rows.sort_by(|a, b| {
            a.employee_id
                .cmp(&b.employee_id)
                .then_with(|| a.period.cmp(&b.period))
        });
        rows
    }
}

/// One report row: an employee's balance for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub employee_id: EmployeeId,
    pub period: BalancePeriod,
    pub balance: LeaveBalance,
}

impl Serialize for BalanceSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let dp = BalanceStore::DAYS_PRECISION;
        let b = &self.balance;
        let mut state = serializer.serialize_struct("BalanceSnapshot", 7)?;
        state.serialize_field("employee", &self.employee_id)?;
        state.serialize_field("period", &self.period.to_string())?;
        state.serialize_field("annual", &b.remaining_annual_leaves.round_dp(dp))?;
        state.serialize_field("comp_off", &b.remaining_comp_off_leaves.get().round_dp(dp))?;
        state.serialize_field("comp_off_earned", &b.comp_off_leaves_earned.round_dp(dp))?;
        state.serialize_field("comp_off_ytd", &b.total_comp_off_earned.round_dp(dp))?;
        state.serialize_field("new_balance", &b.new_leave_balance.round_dp(dp))?;
        state.end()
    }
}
