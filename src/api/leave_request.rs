use crate::{
    api::{LeaveListResponse, Paginated},
    auth::auth::AuthUser,
    error::AppError,
    model::leave_request::{LeaveRequest, LeaveStatus, LeaveType, leave_days},
    model::status::StatusFlow,
    service::settings,
    utils::db_utils::{BindValues, Filters, PageParams},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const LEAVE_SELECT: &str = r#"
    SELECT id, employee_id, start_date, end_date, leave_type, status, reason, reviewed_by, created_at
    FROM leave_requests
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<LeaveRequest, AppError> {
    sqlx::query_as::<_, LeaveRequest>(&format!("{} WHERE id = ?", LEAVE_SELECT))
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

/// Moves a pending request to `next`; the status guard in the UPDATE keeps a
/// concurrent review from being overwritten.
async fn transition(
    pool: &MySqlPool,
    leave: &LeaveRequest,
    next: LeaveStatus,
    reviewer: Option<u64>,
) -> Result<LeaveRequest, AppError> {
    LeaveStatus::ensure_transition(&leave.status, next)?;

    let result = sqlx::query(
        "UPDATE leave_requests SET status = ?, reviewed_by = COALESCE(?, reviewed_by) WHERE id = ? AND status = ?",
    )
    .bind(next.as_ref())
    .bind(reviewer)
    .bind(leave.id)
    .bind(&leave.status)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Leave request was changed by someone else"));
    }

    info!(leave_id = leave.id, status = %next, "Leave request updated");
    fetch_leave(pool, leave.id).await
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Bad request"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.own_employee_id()?;

    if payload.start_date > payload.end_date {
        return Err(AppError::bad_request("start_date cannot be after end_date").into());
    }

    let leave_id = sqlx::query(
        r#"
        INSERT INTO leave_requests (employee_id, start_date, end_date, leave_type, status, reason)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(LeaveStatus::Pending.as_ref())
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create leave request");
        AppError::from(e)
    })?
    .last_insert_id();

    info!(
        leave_id,
        employee_id,
        days = leave_days(payload.start_date, payload.end_date),
        "Leave request submitted"
    );
    let leave = fetch_leave(pool.get_ref(), leave_id).await?;
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 422, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    let leave = transition(pool.get_ref(), &leave, LeaveStatus::Approved, Some(auth.user_id)).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 422, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    let leave = transition(pool.get_ref(), &leave, LeaveStatus::Rejected, Some(auth.user_id)).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Cancel own leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(("leave_id" = u64, Path, description = "ID of the leave request to cancel")),
    responses(
        (status = 200, description = "Leave cancelled", body = LeaveRequest),
        (status = 403, description = "Not the owner"),
        (status = 422, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    if auth.employee_id != Some(leave.employee_id) {
        return Err(AppError::forbidden("Only the requester can cancel a leave request").into());
    }

    let leave = transition(pool.get_ref(), &leave, LeaveStatus::Cancelled, None).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(leave.employee_id)?;

    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses((status = 200, description = "Paginated leave list", body = LeaveListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let page = PageParams::new(query.page, query.per_page, settings::pagination_size(pool.get_ref()).await);

    let employee_id = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.own_employee_id()?)
    };

    let mut filters = Filters::new();
    filters.push_opt("employee_id = ?", employee_id);
    filters.push_opt("status = ?", query.status.as_deref());
    let where_clause = filters.where_clause();

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM leave_requests {}", where_clause))
        .bind_values(filters.values())
        .fetch_one(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let leaves = sqlx::query_as::<_, LeaveRequest>(&format!(
        "{} {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        LEAVE_SELECT, where_clause
    ))
    .bind_values(filters.values())
    .bind(page.per_page)
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(Paginated::new(leaves, page, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_leave_type_is_rejected_at_parse_time() {
        let ok: Result<CreateLeave, _> = serde_json::from_value(json!({
            "start_date": "2026-01-01",
            "end_date": "2026-01-02",
            "leave_type": "emergency"
        }));
        assert!(ok.is_ok());

        let bad: Result<CreateLeave, _> = serde_json::from_value(json!({
            "start_date": "2026-01-01",
            "end_date": "2026-01-02",
            "leave_type": "sabbatical"
        }));
        assert!(bad.is_err());
    }
}
