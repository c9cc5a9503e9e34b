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

//! Leave records.
//!
//! A leave record follows a one-shot state machine:
//!
//! ```text
//!  Pending ──approve──► Approved
//!     │
//!     └──reject───► Rejected
//! ```
//!
//! Both decided states are terminal.

use crate::base::{CompanyId, EmployeeId, LeaveId};
use crate::error::LeaveError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = LeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            other => Err(LeaveError::InvalidStatus(other.to_string())),
        }
    }
}

/// Which pool a leave draws from or feeds.
///
/// `Leave` consumes balance, `Comp-Off` earns it. Any other name is kept
/// verbatim and has no balance effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeaveName {
    Leave,
    CompOff,
    Other(String),
}

impl LeaveName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Leave => "Leave",
            Self::CompOff => "Comp-Off",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for LeaveName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Leave" => Self::Leave,
            "Comp-Off" => Self::CompOff,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for LeaveName {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<LeaveName> for String {
    fn from(name: LeaveName) -> Self {
        name.as_str().to_string()
    }
}

impl fmt::Display for LeaveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftType {
    FullDay,
    FirstHalf,
    SecondHalf,
}

impl ShiftType {
    /// Lenient parse; unknown values yield `None`, which counts as full days.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL_DAY" => Some(Self::FullDay),
            "FIRST_HALF" => Some(Self::FirstHalf),
            "SECOND_HALF" => Some(Self::SecondHalf),
            _ => None,
        }
    }

    /// Deserializes through [`ShiftType::parse`], so an unrecognized shift
    /// is accepted and charged as full days.
    fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(Self::parse))
    }

    /// Leave days charged per calendar date.
    pub fn day_units(shift: Option<Self>) -> Decimal {
        match shift {
            Some(Self::FirstHalf) | Some(Self::SecondHalf) => dec!(0.5),
            Some(Self::FullDay) | None => Decimal::ONE,
        }
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateSpan {
    /// # Errors
    ///
    /// Returns [`LeaveError::Validation`] if `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, LeaveError> {
        if end < start {
            return Err(LeaveError::Validation(format!(
                "end date {end} precedes start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the span, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take(self.calendar_days() as usize)
            .collect()
    }

    /// Splits after the first `head` dates. Either side may be empty.
    pub fn split_after(&self, head: i64) -> (Option<DateSpan>, Option<DateSpan>) {
        let head = head.clamp(0, self.calendar_days());
        let first = (head > 0).then(|| DateSpan {
            start: self.start,
            end: self.start + chrono::Days::new(head as u64 - 1),
        });
        let rest = (head < self.calendar_days()).then(|| DateSpan {
            start: self.start + chrono::Days::new(head as u64),
            end: self.end,
        });
        (first, rest)
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Leave days charged for `span` at the given shift.
pub fn requested_days(span: &DateSpan, shift: Option<ShiftType>) -> Decimal {
    Decimal::from(span.calendar_days()) * ShiftType::day_units(shift)
}

/// Employee-submitted leave application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub employee_id: EmployeeId,
    pub company_id: CompanyId,
    pub leave_name: LeaveName,
    #[serde(default)]
    pub leave_type: Option<String>,
    pub start_date: NaiveDate,
    /// Defaults to `start_date`.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "ShiftType::deserialize_lenient")]
    pub shift_type: Option<ShiftType>,
    #[serde(default)]
    pub reason: String,
}

/// Stored leave application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRecord {
    pub leave_id: LeaveId,
    pub employee_id: EmployeeId,
    pub company_id: CompanyId,
    pub leave_name: LeaveName,
    pub leave_type: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub shift_type: Option<ShiftType>,
    pub reason: String,
    pub status: LeaveStatus,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRecord {
    pub fn span(&self) -> DateSpan {
        DateSpan {
            start: self.start_date,
            end: self.end_date.max(self.start_date),
        }
    }

    pub fn requested_days(&self) -> Decimal {
        requested_days(&self.span(), self.shift_type)
    }

    /// Splits the leave's dates into a covered head and a loss-of-pay tail.
    ///
    /// The head holds as many whole dates as `days_covered` pays for at this
    /// leave's shift; a partly covered date falls into the tail.
    pub fn attendance_split(&self, days_covered: Decimal) -> (Option<DateSpan>, Option<DateSpan>) {
        let covered_dates = (days_covered.max(Decimal::ZERO) / ShiftType::day_units(self.shift_type))
            .floor()
            .to_i64()
            .unwrap_or(0);
        self.span().split_after(covered_dates)
    }
}
