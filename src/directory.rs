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

//! Employee directory and company registry contracts.
//!
//! The leave engine only needs a narrow view of both: existence checks, the
//! reporting line, and names for list enrichment. [`MemoryDirectory`]
//! implements both contracts in memory.

use crate::base::{CompanyId, EmployeeId};
use crate::error::LeaveError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub employee_id: EmployeeId,
    pub company_id: CompanyId,
    pub name: String,
    pub department: Option<String>,
    pub reporting_manager: Option<EmployeeId>,
    /// Direct reports, kept in sync with everyone's `reporting_manager`.
    pub assign_to: Vec<EmployeeId>,
    pub roles: BTreeSet<Role>,
}

impl EmployeeSummary {
    pub fn new(employee_id: EmployeeId, company_id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            employee_id,
            company_id,
            name: name.into(),
            department: None,
            reporting_manager: None,
            assign_to: Vec::new(),
            roles: BTreeSet::from([Role::Employee]),
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn reporting_to(mut self, manager: EmployeeId) -> Self {
        self.reporting_manager = Some(manager);
        self
    }

    pub fn is_manager(&self) -> bool {
        self.roles.contains(&Role::Manager)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub company_id: CompanyId,
    pub name: String,
}

pub trait EmployeeDirectory: Send + Sync {
    fn employee(&self, employee_id: &EmployeeId) -> Option<EmployeeSummary>;

    /// Employees whose reporting manager is `manager_id`, ordered by ID.
    fn employees_by_manager(&self, manager_id: &EmployeeId) -> Vec<EmployeeSummary>;

    fn all_employees(&self) -> Vec<EmployeeSummary>;

    /// Replaces an employee's reporting manager and returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`LeaveError::EmployeeNotFound`] for an unknown employee.
    fn set_reporting_manager(
        &self,
        employee_id: &EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> Result<Option<EmployeeId>, LeaveError>;

    /// Stores `reports` as the manager's direct reports and sets the MANAGER
    /// role iff the list is non-empty. Returns `true` if anything changed;
    /// `false` also for an unknown manager.
    fn set_direct_reports(&self, manager_id: &EmployeeId, reports: Vec<EmployeeId>) -> bool;
}

pub trait CompanyRegistry: Send + Sync {
    fn company(&self, company_id: &CompanyId) -> Option<Company>;
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    employees: DashMap<EmployeeId, EmployeeSummary>,
    companies: DashMap<CompanyId, Company>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&self, company_id: CompanyId, name: impl Into<String>) {
        self.companies.insert(
            company_id.clone(),
            Company {
                company_id,
                name: name.into(),
            },
        );
    }

    /// Inserts or replaces an employee record as given. Direct-report lists
    /// are not touched; run the hierarchy synchronizer afterwards.
    pub fn upsert_employee(&self, employee: EmployeeSummary) {
        self.employees.insert(employee.employee_id.clone(), employee);
    }
}

impl EmployeeDirectory for MemoryDirectory {
    fn employee(&self, employee_id: &EmployeeId) -> Option<EmployeeSummary> {
        self.employees.get(employee_id).map(|e| e.clone())
    }

    fn employees_by_manager(&self, manager_id: &EmployeeId) -> Vec<EmployeeSummary> {
        let mut team: Vec<EmployeeSummary> = self
            .employees
            .iter()
            .filter(|e| e.reporting_manager.as_ref() == Some(manager_id))
            .map(|e| e.clone())
            .collect();
        team.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        team
    }

    fn all_employees(&self) -> Vec<EmployeeSummary> {
        let mut all: Vec<EmployeeSummary> = self.employees.iter().map(|e| e.clone()).collect();
        all.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        all
    }

    fn set_reporting_manager(
        &self,
        employee_id: &EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> Result<Option<EmployeeId>, LeaveError> {
        let mut employee = self
            .employees
            .get_mut(employee_id)
            .ok_or_else(|| LeaveError::EmployeeNotFound(employee_id.clone()))?;
        Ok(std::mem::replace(&mut employee.reporting_manager, manager_id))
    }

    fn set_direct_reports(&self, manager_id: &EmployeeId, reports: Vec<EmployeeId>) -> bool {
        let Some(mut manager) = self.employees.get_mut(manager_id) else {
            return false;
        };

        let mut changed = false;
        let role_changed = if reports.is_empty() {
            manager.roles.remove(&Role::Manager)
        } else {
            manager.roles.insert(Role::Manager)
        };
        changed |= role_changed;

        if manager.assign_to != reports {
            manager.assign_to = reports;
            changed = true;
        }
        changed
    }
}

impl CompanyRegistry for MemoryDirectory {
    fn company(&self, company_id: &CompanyId) -> Option<Company> {
        self.companies.get(company_id).map(|c| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: &str) -> EmployeeSummary {
        EmployeeSummary::new(EmployeeId::from(id), CompanyId::from("C1"), id)
    }

    #[test]
    fn new_employee_has_employee_role_only() {
        let e = employee("EMP1");
        assert!(e.roles.contains(&Role::Employee));
        assert!(!e.is_manager());
    }

    #[test]
    fn set_direct_reports_toggles_manager_role() {
        let directory = MemoryDirectory::new();
        directory.upsert_employee(employee("M1"));

        let m1 = EmployeeId::from("M1");
        assert!(directory.set_direct_reports(&m1, vec![EmployeeId::from("EMP1")]));
        assert!(directory.employee(&m1).unwrap().is_manager());

        // Same list again: nothing to write
        assert!(!directory.set_direct_reports(&m1, vec![EmployeeId::from("EMP1")]));

        assert!(directory.set_direct_reports(&m1, Vec::new()));
        let manager = directory.employee(&m1).unwrap();
        assert!(!manager.is_manager());
        assert!(manager.assign_to.is_empty());
    }

    #[test]
    fn set_direct_reports_unknown_manager_is_noop() {
        let directory = MemoryDirectory::new();
        assert!(!directory.set_direct_reports(&EmployeeId::from("ghost"), Vec::new()));
    }

    #[test]
    fn set_reporting_manager_returns_previous() {
        let directory = MemoryDirectory::new();
        directory.upsert_employee(employee("EMP1").reporting_to(EmployeeId::from("M1")));

        let previous = directory
            .set_reporting_manager(&EmployeeId::from("EMP1"), Some(EmployeeId::from("M2")))
            .unwrap();
        assert_eq!(previous, Some(EmployeeId::from("M1")));
        assert_eq!(
            directory.employees_by_manager(&EmployeeId::from("M2")).len(),
            1
        );
    }

    #[test]
    fn set_reporting_manager_unknown_employee() {
        let directory = MemoryDirectory::new();
        let result = directory.set_reporting_manager(&EmployeeId::from("ghost"), None);
        assert_eq!(
            result,
            Err(LeaveError::EmployeeNotFound(EmployeeId::from("ghost")))
        );
    }
}
