use crate::{
    api::{EmployeeListResponse, Paginated},
    auth::auth::AuthUser,
    model::employee::{Employee, PayProfile},
    service::employee::{self as employee_service, CreateEmployee, EmployeeQuery, EmployeeSummary},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct PayBreakdown {
    #[serde(flatten)]
    pub profile: PayProfile,
    pub total_allowances: f64,
    pub total_salary: f64,
    pub daily_rate: f64,
    pub calculated_hourly_rate: f64,
    pub overtime_rate: f64,
}

impl From<PayProfile> for PayBreakdown {
    fn from(profile: PayProfile) -> Self {
        Self {
            total_allowances: profile.total_allowances(),
            total_salary: profile.total_salary(),
            daily_rate: profile.daily_rate(),
            calculated_hourly_rate: profile.calculated_hourly_rate(),
            overtime_rate: profile.overtime_rate(),
            profile,
        }
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email or file number already taken")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee = employee_service::create(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    debug!(?query, "Listing employees");
    let (employees, page, total) = employee_service::list(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(Paginated::new(employees, page, total)))
}

/// Update Employee
///
/// Partial update; only known employee columns are accepted.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee = employee_service::update(pool.get_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee
///
/// Soft delete: the record is kept for payroll history and the linked login is disabled.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    employee_service::delete(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = employee_service::get(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/pay",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Salary components and derived rates", body = PayBreakdown),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn employee_pay(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = employee_service::get(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(PayBreakdown::from(employee.pay())))
}

#[utoipa::path(
    get,
    path = "/api/employees/next-file-number",
    responses(
        (status = 200, body = Object, example = json!({ "file_number": "EMP-0043" }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn next_file_number(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let file_number = employee_service::peek_next_file_number(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "file_number": file_number })))
}

#[utoipa::path(
    get,
    path = "/api/employees/summary",
    responses((status = 200, body = EmployeeSummary)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn employee_summary(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let summary = employee_service::summary(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pay_breakdown_carries_derived_rates() {
        let profile = PayProfile {
            basic_salary: 6000.0,
            food_allowance: 300.0,
            housing_allowance: 1500.0,
            transport_allowance: 200.0,
            hourly_rate: 0.0,
            overtime_rate_multiplier: 1.5,
            overtime_fixed_rate: 0.0,
            contract_hours_per_day: 8,
            contract_days_per_month: 30,
        };

        let breakdown = PayBreakdown::from(profile);
        assert_eq!(breakdown.total_allowances, 2000.0);
        assert_eq!(breakdown.daily_rate, 200.0);
        assert_eq!(breakdown.overtime_rate, 37.5);

        let body = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(body["basic_salary"], json!(6000.0));
        assert_eq!(body["total_salary"], json!(8000.0));
    }
}
