use crate::error::{AppError, AppResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::{Query, QueryAs, QueryScalar};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Columns a client may change through a partial update.
pub struct UpdatableColumns {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

pub const EMPLOYEE_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "employees",
    columns: &[
        "first_name",
        "middle_name",
        "last_name",
        "email",
        "phone",
        "nationality",
        "department_id",
        "designation_id",
        "hire_date",
        "status",
        "basic_salary",
        "food_allowance",
        "housing_allowance",
        "transport_allowance",
        "hourly_rate",
        "overtime_rate_multiplier",
        "overtime_fixed_rate",
        "contract_hours_per_day",
        "contract_days_per_month",
        "advance_salary_eligible",
    ],
};

pub const DEPARTMENT_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "departments",
    columns: &["name", "description", "is_active"],
};

pub const DESIGNATION_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "designations",
    columns: &["name", "department_id", "description", "is_active"],
};

pub const EQUIPMENT_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "equipment",
    columns: &["name", "code", "category", "serial_number", "daily_rate", "notes"],
};

pub const ASSIGNMENT_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "employee_assignments",
    columns: &[
        "assignment_type",
        "name",
        "location",
        "start_date",
        "end_date",
        "notes",
        "project_id",
        "rental_id",
    ],
};

pub const SALARY_ADVANCE_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "salary_advances",
    columns: &["amount", "reason", "installments", "repayment_method", "notes"],
};

pub const MAINTENANCE_COLUMNS: UpdatableColumns = UpdatableColumns {
    table: "maintenance_tasks",
    columns: &["title", "description", "scheduled_date", "technician_id", "cost", "notes"],
};

fn to_sql_value(value: &Value) -> AppResult<SqlValue> {
    let converted = match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::bad_request("Unsupported numeric value"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::bad_request("Unsupported JSON value type")),
    };

    Ok(converted)
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Keys outside `allowed.columns` are rejected so a payload can never touch
/// identifiers, audit columns or workflow status.
pub fn build_update_sql(
    allowed: &UpdatableColumns,
    payload: &Value,
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.columns.contains(&k.as_str())) {
        return Err(AppError::bad_request(format!(
            "Field '{}' cannot be updated",
            unknown
        )));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        allowed.table, set_clause, id_column
    );

    let mut values = obj.values().map(to_sql_value).collect::<AppResult<Vec<_>>>()?;
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let result = sqlx::query(&update.sql)
        .bind_values(update.values)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Binds a list of [`SqlValue`]s onto any runtime query.
pub trait BindValues: Sized {
    fn bind_value(self, value: SqlValue) -> Self;

    fn bind_values(self, values: Vec<SqlValue>) -> Self {
        values.into_iter().fold(self, |q, v| q.bind_value(v))
    }
}

macro_rules! bind_value_body {
    () => {
        fn bind_value(self, value: SqlValue) -> Self {
            match value {
                SqlValue::String(v) => self.bind(v),
                SqlValue::I64(v) => self.bind(v),
                SqlValue::U64(v) => self.bind(v),
                SqlValue::F64(v) => self.bind(v),
                SqlValue::Bool(v) => self.bind(v),
                SqlValue::Date(v) => self.bind(v),
                SqlValue::DateTime(v) => self.bind(v),
                SqlValue::Null => self.bind(None::<String>),
            }
        }
    };
}

impl<'q> BindValues for Query<'q, MySql, MySqlArguments> {
    bind_value_body!();
}

impl<'q, O> BindValues for QueryAs<'q, MySql, O, MySqlArguments> {
    bind_value_body!();
}

impl<'q, O> BindValues for QueryScalar<'q, MySql, O, MySqlArguments> {
    bind_value_body!();
}

/// ===============================
/// WHERE clause builder for list endpoints
/// ===============================
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition without a bound value.
    pub fn require(&mut self, condition: &str) {
        self.conditions.push(condition.to_string());
    }

    pub fn push(&mut self, condition: &str, value: SqlValue) {
        self.conditions.push(condition.to_string());
        self.values.push(value);
    }

    /// Adds `value` when present.
    pub fn push_opt<T: Into<SqlValue>>(&mut self, condition: &str, value: Option<T>) {
        if let Some(v) = value {
            self.push(condition, v.into());
        }
    }

    /// `LIKE %term%` over several columns, OR-ed together.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) {
        let term = match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => return,
        };

        let like = format!("%{}%", term);
        let clause = columns
            .iter()
            .map(|c| format!("{} LIKE ?", c))
            .collect::<Vec<_>>()
            .join(" OR ");

        self.conditions.push(format!("({})", clause));
        self.values
            .extend(columns.iter().map(|_| SqlValue::String(like.clone())));
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> Vec<SqlValue> {
        self.values.clone()
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

/// Page window shared by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_update_for_allowed_columns() {
        let update = build_update_sql(
            &DEPARTMENT_COLUMNS,
            &json!({"name": "Ops", "is_active": false}),
            "id",
            7,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE departments SET is_active = ?, name = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::Bool(false),
                SqlValue::String("Ops".to_string()),
                SqlValue::U64(7)
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_allowlist() {
        let err = build_update_sql(&EMPLOYEE_COLUMNS, &json!({"file_number": "EMP-9"}), "id", 1)
            .unwrap_err();
        assert!(err.to_string().contains("file_number"));

        assert!(build_update_sql(&EMPLOYEE_COLUMNS, &json!({}), "id", 1).is_err());
        assert!(build_update_sql(&EMPLOYEE_COLUMNS, &json!([1, 2]), "id", 1).is_err());
    }

    #[test]
    fn date_strings_bind_as_dates() {
        let update =
            build_update_sql(&EMPLOYEE_COLUMNS, &json!({"hire_date": "2026-02-01"}), "id", 1).unwrap();
        assert_eq!(
            update.values[0],
            SqlValue::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())
        );
    }

    #[test]
    fn filters_build_where_clause() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_clause(), "");

        filters.require("deleted_at IS NULL");
        filters.push_opt("department_id = ?", Some(3u64));
        filters.push_opt::<String>("status = ?", None);
        filters.search(&["first_name", "email"], Some(" jo "));

        assert_eq!(
            filters.where_clause(),
            "WHERE deleted_at IS NULL AND department_id = ? AND (first_name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(filters.values().len(), 3);
        assert_eq!(filters.values()[1], SqlValue::String("%jo%".to_string()));
    }

    #[test]
    fn page_params_are_clamped() {
        let p = PageParams::new(Some(0), Some(500), 15);
        assert_eq!(p, PageParams { page: 1, per_page: 100 });
        assert_eq!(PageParams::new(Some(3), None, 15).offset(), 30);
    }
}
