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

//! Service configuration.

use std::time::Duration;

/// Tunables for [`crate::LeaveEngine`] and the HTTP attendance client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Prefix for generated leave IDs.
    pub leave_id_prefix: String,
    /// Upper bound for a single attendance call. Failed calls are not retried automatically.
    pub attendance_timeout: Duration,
}

impl ServiceConfig {
    pub const DEFAULT_LEAVE_ID_PREFIX: &'static str = "LID";
    pub const DEFAULT_ATTENDANCE_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            leave_id_prefix: Self::DEFAULT_LEAVE_ID_PREFIX.to_string(),
            attendance_timeout: Self::DEFAULT_ATTENDANCE_TIMEOUT,
        }
    }
}
