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

//! Error types for leave processing.

use crate::base::{CompanyId, EmployeeId, LeaveId};
use crate::leave::LeaveStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of [`LeaveError`], used to decide propagation.
///
/// Everything except [`ErrorKind::DownstreamFailure`] aborts an operation
/// before any state is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    DownstreamFailure,
}

/// Leave processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaveError {
    /// Employee is not in the directory
    #[error("employee not found with ID: {0}")]
    EmployeeNotFound(EmployeeId),

    /// Company is not in the registry
    #[error("company not found with ID: {0}")]
    CompanyNotFound(CompanyId),

    /// Leave record does not exist
    #[error("leave not found with ID: {0}")]
    LeaveNotFound(LeaveId),

    /// Leave already carries a terminal status
    #[error("leave is already {}", .status.as_str().to_lowercase())]
    AlreadyDecided { status: LeaveStatus },

    /// Requested decision is not Approved or Rejected
    #[error("status must be either 'Approved' or 'Rejected', got '{0}'")]
    InvalidStatus(String),

    /// A comp-off pool value below zero
    #[error("comp-off balance cannot be negative: {0}")]
    NegativeCompOff(Decimal),

    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Attendance service unreachable or erroring
    #[error("downstream failure: {0}")]
    Downstream(String),
}

impl LeaveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmployeeNotFound(_) | Self::CompanyNotFound(_) | Self::LeaveNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::AlreadyDecided { .. } | Self::InvalidStatus(_) | Self::NegativeCompOff(_) => {
                ErrorKind::InvalidState
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::Downstream(_) => ErrorKind::DownstreamFailure,
        }
    }
}
