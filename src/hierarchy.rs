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

//! Reporting-line maintenance.
//!
//! Every employee names a reporting manager; each manager carries the
//! inverse list of direct reports plus the MANAGER role. The lists are
//! always recomputed from the reporting-manager fields, never patched.

use crate::base::EmployeeId;
use crate::directory::{EmployeeDirectory, EmployeeSummary};
use crate::error::LeaveError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Manager → direct reports, built in one pass. Reports are ordered by ID.
pub fn reporting_map(employees: &[EmployeeSummary]) -> BTreeMap<EmployeeId, Vec<EmployeeId>> {
    let mut map: BTreeMap<EmployeeId, Vec<EmployeeId>> = BTreeMap::new();
    for employee in employees {
        if let Some(manager) = &employee.reporting_manager {
            map.entry(manager.clone())
                .or_default()
                .push(employee.employee_id.clone());
        }
    }
    for reports in map.values_mut() {
        reports.sort();
    }
    map
}

pub struct HierarchySync {
    directory: Arc<dyn EmployeeDirectory>,
}

impl HierarchySync {
    pub fn new(directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { directory }
    }

    /// Refreshes the old and the new manager after `employee_id` moved.
    ///
    /// Returns the number of manager records rewritten.
    pub fn on_reporting_manager_changed(
        &self,
        employee_id: &EmployeeId,
        old_manager: Option<&EmployeeId>,
        new_manager: Option<&EmployeeId>,
    ) -> usize {
        if old_manager == new_manager {
            return 0;
        }
        debug!(
            employee_id = %employee_id,
            old = ?old_manager.map(EmployeeId::as_str),
            new = ?new_manager.map(EmployeeId::as_str),
            "reporting manager changed"
        );
        [old_manager, new_manager]
            .into_iter()
            .flatten()
            .map(|manager| self.refresh_manager(manager))
            .filter(|changed| *changed)
            .count()
    }

    /// Moves `employee_id` under `new_manager` and refreshes both managers.
    ///
    /// # Errors
    ///
    /// - [`LeaveError::EmployeeNotFound`] - unknown employee or manager.
    /// - [`LeaveError::Validation`] - the employee would report to themselves.
    pub fn reassign(
        &self,
        employee_id: &EmployeeId,
        new_manager: Option<EmployeeId>,
    ) -> Result<usize, LeaveError> {
        if let Some(manager) = &new_manager {
            if manager == employee_id {
                return Err(LeaveError::Validation(format!(
                    "employee {employee_id} cannot report to themselves"
                )));
            }
            if self.directory.employee(manager).is_none() {
                return Err(LeaveError::EmployeeNotFound(manager.clone()));
            }
        }

        let old_manager = self
            .directory
            .set_reporting_manager(employee_id, new_manager.clone())?;
        Ok(self.on_reporting_manager_changed(
            employee_id,
            old_manager.as_ref(),
            new_manager.as_ref(),
        ))
    }

    /// Recomputes direct reports and the MANAGER role for every employee.
    ///
    /// Returns the number of employee records rewritten.
    pub fn resync_all(&self) -> usize {
        let employees = self.directory.all_employees();
        let mut map = reporting_map(&employees);

        let mut rewritten = 0;
        for employee in &employees {
            // Employees no longer managing anyone get an empty list
            let reports = map.remove(&employee.employee_id).unwrap_or_default();
            if self
                .directory
                .set_direct_reports(&employee.employee_id, reports)
            {
                rewritten += 1;
            }
        }
        info!(employees = employees.len(), rewritten, "reporting lines resynchronized");
        rewritten
    }

    fn refresh_manager(&self, manager_id: &EmployeeId) -> bool {
        let reports: Vec<EmployeeId> = self
            .directory
            .employees_by_manager(manager_id)
            .into_iter()
            .map(|employee| employee.employee_id)
            .collect();
        let team_size = reports.len();
        let changed = self.directory.set_direct_reports(manager_id, reports);
        if changed {
            info!(manager_id = %manager_id, team_size, "direct reports updated");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::CompanyId;

    fn employee(id: &str, manager: Option<&str>) -> EmployeeSummary {
        let e = EmployeeSummary::new(EmployeeId::from(id), CompanyId::from("C1"), id);
        match manager {
            Some(m) => e.reporting_to(EmployeeId::from(m)),
            None => e,
        }
    }

    #[test]
    fn reporting_map_groups_by_manager() {
        let employees = vec![
            employee("E2", Some("M1")),
            employee("E1", Some("M1")),
            employee("E3", Some("M2")),
            employee("M1", None),
        ];
        let map = reporting_map(&employees);
        assert_eq!(map.len(), 2);
        assert_eq!(
            map[&EmployeeId::from("M1")],
            vec![EmployeeId::from("E1"), EmployeeId::from("E2")]
        );
        assert_eq!(map[&EmployeeId::from("M2")], vec![EmployeeId::from("E3")]);
    }

    #[test]
    fn reporting_map_empty_without_managers() {
        let map = reporting_map(&[employee("E1", None)]);
        assert!(map.is_empty());
    }
}
