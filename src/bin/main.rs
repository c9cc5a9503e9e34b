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

use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use leave_ledger::{
    AttendanceService, Clock, CompanyId, EmployeeId, EmployeeSummary, FixedClock, HierarchySync,
    HttpAttendanceService, LeaveEngine, LeaveId, LeaveName, LeaveRequest, LeaveStatus,
    LoggingAttendance, MemoryDirectory, ServiceConfig, ShiftType, SystemClock,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Leave Ledger - Replay a leave journal
///
/// Reads companies, employees, allotments, applications and decisions from a
/// CSV journal and writes every employee's balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "leave-ledger")]
#[command(about = "Replays a leave journal and reports balances", long_about = None)]
struct Args {
    /// Path to CSV journal
    ///
    /// Expected format: type,employee,company,leave,name,start,end,shift,days,manager
    /// Example: cargo run -- journal.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Base URL of the attendance service; attendance is only logged when unset
    #[arg(long, env = "ATTENDANCE_SERVICE_URL")]
    attendance_url: Option<String>,

    /// Timeout for a single attendance call, in milliseconds
    #[arg(long, env = "ATTENDANCE_TIMEOUT_MS", default_value_t = 5000)]
    attendance_timeout_ms: u64,

    /// Replay as of this date instead of today; selects the balance period
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = ServiceConfig {
        attendance_timeout: Duration::from_millis(args.attendance_timeout_ms),
        ..ServiceConfig::default()
    };

    let attendance: Arc<dyn AttendanceService> = match &args.attendance_url {
        Some(url) => match HttpAttendanceService::from_config(url, &config) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                eprintln!("Error configuring attendance service: {}", e);
                process::exit(1);
            }
        },
        None => Arc::new(LoggingAttendance),
    };

    let clock: Arc<dyn Clock> = match args.today {
        Some(day) => Arc::new(FixedClock(day.and_time(NaiveTime::MIN).and_utc())),
        None => Arc::new(SystemClock),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match process_journal(BufReader::new(file), attendance, clock, config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing journal: {}", e);
            process::exit(1);
        }
    };

    let pending = engine.pending_attendance();
    if pending > 0 {
        warn!(pending, "attendance marks left undelivered");
    }

    if let Err(e) = write_balances(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV row. Which columns matter depends on `type`.
#[derive(Debug, Deserialize)]
struct JournalRow {
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    employee: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    leave: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    end: Option<NaiveDate>,
    #[serde(default)]
    shift: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    days: Option<Decimal>,
    #[serde(default)]
    manager: Option<String>,
}

/// A journal row that carries everything its type requires.
#[derive(Debug)]
enum JournalEntry {
    Company {
        company_id: CompanyId,
        name: String,
    },
    Employee {
        employee: EmployeeSummary,
        manager: Option<EmployeeId>,
    },
    Manager {
        employee_id: EmployeeId,
        manager: Option<EmployeeId>,
    },
    Allot {
        employee_id: EmployeeId,
        days: Decimal,
    },
    Apply(LeaveRequest),
    Decide {
        leave_id: LeaveId,
        status: LeaveStatus,
        remarks: Option<String>,
    },
}

impl JournalRow {
    /// Returns `None` for unknown types or missing required columns.
    fn into_entry(self) -> Option<JournalEntry> {
        let employee_id = self.employee.map(EmployeeId::new);
        let company_id = self.company.map(CompanyId::new);
        let manager = self.manager.map(EmployeeId::new);

        match self.entry_type.to_lowercase().as_str() {
            "company" => Some(JournalEntry::Company {
                company_id: company_id?,
                name: self.name?,
            }),
            "employee" => {
                let employee_id = employee_id?;
                let name = self.name.unwrap_or_else(|| employee_id.to_string());
                Some(JournalEntry::Employee {
                    employee: EmployeeSummary::new(employee_id, company_id?, name),
                    manager,
                })
            }
            "manager" => Some(JournalEntry::Manager {
                employee_id: employee_id?,
                manager,
            }),
            "allot" => Some(JournalEntry::Allot {
                employee_id: employee_id?,
                days: self.days?,
            }),
            "apply" => Some(JournalEntry::Apply(LeaveRequest {
                employee_id: employee_id?,
                company_id: company_id?,
                leave_name: LeaveName::from(self.name?),
                leave_type: None,
                start_date: self.start?,
                end_date: self.end,
                shift_type: self.shift.as_deref().and_then(ShiftType::parse),
                reason: String::new(),
            })),
            kind @ ("approve" | "reject") => Some(JournalEntry::Decide {
                leave_id: LeaveId::new(self.leave?),
                status: if kind == "approve" {
                    LeaveStatus::Approved
                } else {
                    LeaveStatus::Rejected
                },
                remarks: self.name,
            }),
            _ => None,
        }
    }
}

/// Replays a leave journal from a CSV reader.
///
/// Rows are applied in order. Leave IDs are generated sequentially
/// (`LID0001`, `LID0002`, ...), so decision rows can refer to applications
/// made earlier in the same journal. Malformed rows and refused operations
/// are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, employee, company, leave, name, start, end, shift, days, manager`
/// - `company`: registers `company` with display `name`
/// - `employee`: registers `employee` of `company`, optionally under `manager`
/// - `manager`: moves `employee` under `manager` (empty detaches)
/// - `allot`: credits `days` of annual leave to `employee`
/// - `apply`: leave `name` (`Leave`, `Comp-Off`, ...) from `start` to `end` with `shift`
/// - `approve` / `reject`: decides `leave`, with `name` as remarks
///
/// # Example
///
/// ```csv
/// type,employee,company,leave,name,start,end,shift,days,manager
/// company,,C1,,Acme,,,,,
/// employee,EMP1,C1,,Asha,,,,,
/// allot,EMP1,,,,,,,2,
/// apply,EMP1,C1,,Leave,2026-10-05,2026-10-07,FULL_DAY,,
/// approve,,,LID0001,,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_journal<R: Read>(
    reader: R,
    attendance: Arc<dyn AttendanceService>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
) -> Result<LeaveEngine, csv::Error> {
    let directory = Arc::new(MemoryDirectory::new());
    let hierarchy = HierarchySync::new(directory.clone());
    let engine = LeaveEngine::new(directory.clone(), directory.clone(), attendance)
        .with_clock(clock)
        .with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0usize;
    let mut skipped = 0usize;
    for (index, result) in rdr.deserialize::<JournalRow>().enumerate() {
        let line = index + 2;
        let entry = match result {
            Ok(row) => match row.into_entry() {
                Some(entry) => entry,
                None => {
                    warn!(line, "skipping incomplete or unknown journal row");
                    skipped += 1;
                    continue;
                }
            },
            Err(e) => {
                warn!(line, error = %e, "skipping malformed journal row");
                skipped += 1;
                continue;
            }
        };

        if let Err(e) = apply_entry(entry, &engine, &directory, &hierarchy) {
            warn!(line, error = %e, "journal row refused");
            skipped += 1;
            continue;
        }
        applied += 1;
    }

    hierarchy.resync_all();
    info!(applied, skipped, "journal replayed");
    Ok(engine)
}

fn apply_entry(
    entry: JournalEntry,
    engine: &LeaveEngine,
    directory: &MemoryDirectory,
    hierarchy: &HierarchySync,
) -> Result<(), leave_ledger::LeaveError> {
    match entry {
        JournalEntry::Company { company_id, name } => directory.add_company(company_id, name),
        JournalEntry::Employee { employee, manager } => {
            let employee_id = employee.employee_id.clone();
            directory.upsert_employee(employee);
            if manager.is_some() {
                hierarchy.reassign(&employee_id, manager)?;
            }
        }
        JournalEntry::Manager {
            employee_id,
            manager,
        } => {
            hierarchy.reassign(&employee_id, manager)?;
        }
        JournalEntry::Allot { employee_id, days } => {
            engine.allot_annual(&employee_id, days)?;
        }
        JournalEntry::Apply(request) => {
            engine.apply_leave(request)?;
        }
        JournalEntry::Decide {
            leave_id,
            status,
            remarks,
        } => {
            engine.update_status(&leave_id, status, remarks)?;
        }
    }
    Ok(())
}

/// Write balances to a CSV writer
///
/// One row per employee and recorded period, amounts rounded to 2 decimals.
///
/// # CSV Format
///
/// Columns: `employee, period, annual, comp_off, comp_off_earned, comp_off_ytd, new_balance`
///
/// # Example
///
/// ```csv
/// employee,period,annual,comp_off,comp_off_earned,comp_off_ytd,new_balance
/// EMP1,2026-10,-1,0,0,0,-1
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_balances<W: Write>(engine: &LeaveEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for snapshot in engine.balance_report() {
        wtr.serialize(&snapshot)?;
    }

    wtr.flush()?;
    Ok(())
}
