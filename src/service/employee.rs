use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::model::employee::{
    Employee, EmployeeStatus, FILE_NUMBER_PREFIX, check_contract_terms, next_file_number,
};
use crate::model::role::Role;
use crate::service::{auth as auth_service, settings};
use crate::utils::db_utils::{BindValues, EMPLOYEE_COLUMNS, Filters, PageParams, build_update_sql, execute_update};
use crate::utils::identity_filter::{self, Identity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

pub const EMPLOYEE_SELECT: &str = r#"
    SELECT id, file_number, first_name, middle_name, last_name, email, phone, nationality,
           department_id, designation_id, user_id, hire_date, status, basic_salary,
           food_allowance, housing_allowance, transport_allowance, hourly_rate,
           overtime_rate_multiplier, overtime_fixed_rate, contract_hours_per_day,
           contract_days_per_month, advance_salary_eligible, deleted_at
    FROM employees
"#;

fn default_multiplier() -> f64 {
    1.5
}
fn default_hours() -> u32 {
    8
}
fn default_days() -> u32 {
    30
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeUserAccount {
    #[schema(example = "jdoe")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployee {
    /// Generated as `EMP-NNNN` when omitted
    #[schema(example = "EMP-0042")]
    pub file_number: Option<String>,
    #[schema(example = "John")]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    pub nationality: Option<String>,
    #[schema(example = 1)]
    pub department_id: Option<u64>,
    #[schema(example = 2)]
    pub designation_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[serde(default)]
    #[schema(example = 5000.0)]
    pub basic_salary: f64,
    #[serde(default)]
    pub food_allowance: f64,
    #[serde(default)]
    pub housing_allowance: f64,
    #[serde(default)]
    pub transport_allowance: f64,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default = "default_multiplier")]
    pub overtime_rate_multiplier: f64,
    #[serde(default)]
    pub overtime_fixed_rate: f64,
    #[serde(default = "default_hours")]
    pub contract_hours_per_day: u32,
    #[serde(default = "default_days")]
    pub contract_days_per_month: u32,
    #[serde(default = "default_true")]
    pub advance_salary_eligible: bool,
    /// Creates a linked login with the employee role
    pub user: Option<EmployeeUserAccount>,
}

impl CreateEmployee {
    fn validate(&self) -> AppResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::bad_request("first_name and last_name are required"));
        }
        if !self.email.contains('@') {
            return Err(AppError::bad_request("email must be a valid address"));
        }
        let money = [
            self.basic_salary,
            self.food_allowance,
            self.housing_allowance,
            self.transport_allowance,
            self.hourly_rate,
            self.overtime_fixed_rate,
        ];
        if money.iter().any(|v| *v < 0.0) || self.overtime_rate_multiplier < 0.0 {
            return Err(AppError::bad_request("salary figures must not be negative"));
        }
        check_contract_terms(self.contract_hours_per_day, self.contract_days_per_month)
    }
}

/// Lowercased address, rejected when it is not a string with an `@`.
fn normalize_email(raw: &Value) -> AppResult<String> {
    raw.as_str()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| e.contains('@'))
        .ok_or_else(|| AppError::bad_request("email must be a valid address"))
}

/// Contract terms after applying `payload` on top of the stored ones.
fn merged_contract_terms(payload: &Value, hours_per_day: u32, days_per_month: u32) -> AppResult<(u32, u32)> {
    let pick = |key: &str, current: u32| -> AppResult<u32> {
        match payload.get(key) {
            None => Ok(current),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| AppError::bad_request(format!("{} must be a whole number", key))),
        }
    };

    let hours = pick("contract_hours_per_day", hours_per_day)?;
    let days = pick("contract_days_per_month", days_per_month)?;
    check_contract_terms(hours, days)?;
    Ok((hours, days))
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub designation_id: Option<u64>,
    #[schema(example = "active")]
    pub status: Option<String>,
    /// Matches name, email or file number
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeSummary {
    pub total: i64,
    #[schema(example = json!({"active": 40, "on_leave": 2}))]
    pub by_status: BTreeMap<String, i64>,
}

/// Fresh file number; must run inside the transaction that inserts the employee.
///
/// The row holding the highest number is locked so concurrent creates queue up.
async fn generate_file_number(tx: &mut Transaction<'_, MySql>) -> Result<String, sqlx::Error> {
    let last: Option<String> = sqlx::query_scalar(
        r#"
        SELECT file_number
        FROM employees
        WHERE file_number LIKE CONCAT(?, '%')
        ORDER BY CAST(SUBSTRING(file_number, ?) AS UNSIGNED) DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(FILE_NUMBER_PREFIX)
    .bind(FILE_NUMBER_PREFIX.len() as u32 + 1)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(next_file_number(last.as_deref()))
}

/// Next number a new employee would get, without reserving it.
pub async fn peek_next_file_number(pool: &MySqlPool) -> AppResult<String> {
    let mut tx = pool.begin().await?;
    let number = generate_file_number(&mut tx).await?;
    tx.rollback().await?;
    Ok(number)
}

async fn email_taken(pool: &MySqlPool, email: &str) -> AppResult<bool> {
    if !identity_filter::might_exist(Identity::EmployeeEmail, email) {
        return Ok(false);
    }

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn create(pool: &MySqlPool, input: &CreateEmployee) -> AppResult<Employee> {
    input.validate()?;
    let email = input.email.trim().to_lowercase();

    if email_taken(pool, &email).await? {
        return Err(AppError::conflict("Employee email already exists"));
    }

    if let Some(account) = &input.user {
        let policy = settings::password_policy(pool).await?;
        auth_service::validate_new_credentials(pool, &account.username, &account.password, &policy).await?;
    }

    let mut tx = pool.begin().await?;

    let file_number = match input.file_number.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(explicit) => {
            let taken = if identity_filter::might_exist(Identity::FileNumber, explicit) {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE file_number = ?")
                    .bind(explicit)
                    .fetch_one(&mut *tx)
                    .await?
            } else {
                0
            };
            if taken > 0 {
                return Err(AppError::conflict(format!("File number {} already exists", explicit)));
            }
            explicit.to_string()
        }
        None => generate_file_number(&mut tx).await?,
    };

    debug!(file_number = %file_number, "Creating employee");

    let employee_id = sqlx::query(
        r#"
        INSERT INTO employees
            (file_number, first_name, middle_name, last_name, email, phone, nationality,
             department_id, designation_id, hire_date, status, basic_salary, food_allowance,
             housing_allowance, transport_allowance, hourly_rate, overtime_rate_multiplier,
             overtime_fixed_rate, contract_hours_per_day, contract_days_per_month,
             advance_salary_eligible)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&file_number)
    .bind(input.first_name.trim())
    .bind(&input.middle_name)
    .bind(input.last_name.trim())
    .bind(&email)
    .bind(&input.phone)
    .bind(&input.nationality)
    .bind(input.department_id)
    .bind(input.designation_id)
    .bind(input.hire_date)
    .bind(EmployeeStatus::Active.as_ref())
    .bind(input.basic_salary)
    .bind(input.food_allowance)
    .bind(input.housing_allowance)
    .bind(input.transport_allowance)
    .bind(input.hourly_rate)
    .bind(input.overtime_rate_multiplier)
    .bind(input.overtime_fixed_rate)
    .bind(input.contract_hours_per_day)
    .bind(input.contract_days_per_month)
    .bind(input.advance_salary_eligible)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let mut username = None;
    if let Some(account) = &input.user {
        let hashed = hash_password(&account.password)?;
        let name = account.username.trim().to_lowercase();

        let user_id = sqlx::query(
            "INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&hashed)
        .bind(Role::Employee.id())
        .bind(employee_id)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        sqlx::query("UPDATE employees SET user_id = ? WHERE id = ?")
            .bind(user_id)
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;

        username = Some(name);
    }

    tx.commit().await?;

    identity_filter::insert(Identity::EmployeeEmail, &email);
    identity_filter::insert(Identity::FileNumber, &file_number);
    if let Some(name) = &username {
        identity_filter::insert(Identity::Username, name);
    }

    info!(employee_id, file_number = %file_number, "Employee created");
    get(pool, employee_id).await
}

pub async fn get(pool: &MySqlPool, employee_id: u64) -> AppResult<Employee> {
    sqlx::query_as::<_, Employee>(&format!("{} WHERE id = ? AND deleted_at IS NULL", EMPLOYEE_SELECT))
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))
}

pub async fn list(pool: &MySqlPool, query: &EmployeeQuery) -> AppResult<(Vec<Employee>, PageParams, i64)> {
    let page = PageParams::new(query.page, query.per_page, settings::pagination_size(pool).await);

    let mut filters = Filters::new();
    filters.require("deleted_at IS NULL");
    filters.push_opt("department_id = ?", query.department_id);
    filters.push_opt("designation_id = ?", query.designation_id);
    filters.push_opt("status = ?", query.status.as_deref());
    filters.search(
        &["first_name", "last_name", "email", "file_number"],
        query.search.as_deref(),
    );

    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");
    let total = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind_values(filters.values())
        .fetch_one(pool)
        .await?;

    let data_sql = format!("{} {} ORDER BY id DESC LIMIT ? OFFSET ?", EMPLOYEE_SELECT, where_clause);
    let employees = sqlx::query_as::<_, Employee>(&data_sql)
        .bind_values(filters.values())
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    Ok((employees, page, total))
}

pub async fn update(pool: &MySqlPool, employee_id: u64, payload: &Value) -> AppResult<Employee> {
    let current = get(pool, employee_id).await?;

    if let Some(status) = payload.get("status") {
        let valid = status
            .as_str()
            .is_some_and(|s| s.parse::<EmployeeStatus>().is_ok());
        if !valid {
            return Err(AppError::bad_request("Invalid employee status"));
        }
    }

    merged_contract_terms(payload, current.contract_hours_per_day, current.contract_days_per_month)?;

    let mut payload = payload.clone();
    let new_email = match payload.get("email") {
        Some(raw) => {
            let email = normalize_email(raw)?;
            if email != current.email && email_taken(pool, &email).await? {
                return Err(AppError::conflict("Employee email already exists"));
            }
            payload["email"] = Value::String(email.clone());
            Some(email)
        }
        None => None,
    };

    let update = build_update_sql(&EMPLOYEE_COLUMNS, &payload, "id", employee_id)?;
    execute_update(pool, update).await?;

    if let Some(email) = new_email.filter(|e| *e != current.email) {
        identity_filter::remove(Identity::EmployeeEmail, &current.email);
        identity_filter::insert(Identity::EmployeeEmail, &email);
    }

    info!(employee_id, "Employee updated");
    get(pool, employee_id).await
}

/// Soft delete: the record stays for payroll history, the login is disabled.
pub async fn delete(pool: &MySqlPool, employee_id: u64) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    let affected = sqlx::query(
        "UPDATE employees SET status = ?, deleted_at = NOW() WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(EmployeeStatus::Terminated.as_ref())
    .bind(employee_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::not_found("Employee not found"));
    }

    sqlx::query("UPDATE users SET is_active = FALSE WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(employee_id, "Employee deleted");
    Ok(())
}

pub async fn set_status(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    status: EmployeeStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE employees SET status = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(employee_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn summary(pool: &MySqlPool) -> AppResult<EmployeeSummary> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM employees WHERE deleted_at IS NULL GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(EmployeeSummary {
        total: rows.iter().map(|(_, n)| n).sum(),
        by_status: rows.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "first_name": "John",
            "last_name": "Doe",
            "email": "john@company.com",
            "hire_date": "2026-01-01"
        })
    }

    #[test]
    fn create_payload_fills_contract_defaults() {
        let input: CreateEmployee = serde_json::from_value(payload()).unwrap();
        assert_eq!(input.contract_hours_per_day, 8);
        assert_eq!(input.contract_days_per_month, 30);
        assert_eq!(input.overtime_rate_multiplier, 1.5);
        assert!(input.advance_salary_eligible);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_payload_is_validated() {
        let mut raw = payload();
        raw["email"] = json!("not-an-email");
        let input: CreateEmployee = serde_json::from_value(raw).unwrap();
        assert!(input.validate().is_err());

        let mut raw = payload();
        raw["basic_salary"] = json!(-1.0);
        let input: CreateEmployee = serde_json::from_value(raw).unwrap();
        assert!(input.validate().is_err());

        let mut raw = payload();
        raw["contract_hours_per_day"] = json!(70000);
        raw["contract_days_per_month"] = json!(70000);
        let input: CreateEmployee = serde_json::from_value(raw).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_merges_and_bounds_contract_terms() {
        assert_eq!(merged_contract_terms(&json!({"first_name": "Jo"}), 8, 30).unwrap(), (8, 30));
        assert_eq!(merged_contract_terms(&json!({"contract_hours_per_day": 10}), 8, 30).unwrap(), (10, 30));
        assert!(merged_contract_terms(&json!({"contract_hours_per_day": 25}), 8, 30).is_err());
        assert!(merged_contract_terms(&json!({"contract_days_per_month": 0}), 8, 30).is_err());
        assert!(merged_contract_terms(&json!({"contract_hours_per_day": "ten"}), 8, 30).is_err());
        assert!(merged_contract_terms(&json!({"contract_days_per_month": 70000}), 8, 30).is_err());
    }

    #[test]
    fn updated_email_is_lowercased() {
        assert_eq!(normalize_email(&json!("  John.Doe@Company.COM ")).unwrap(), "john.doe@company.com");
        assert!(normalize_email(&json!("nobody")).is_err());
        assert!(normalize_email(&json!(42)).is_err());
    }
}
