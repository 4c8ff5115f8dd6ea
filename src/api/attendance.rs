use crate::{auth::auth::AuthUser, error::AppError, model::attendance::Attendance};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;

async fn today_record(pool: &MySqlPool, employee_id: u64) -> Result<Option<Attendance>, AppError> {
    let record = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, employee_id, date, check_in, check_out
        FROM attendance
        WHERE employee_id = ? AND date = CURDATE()
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Attendance),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.own_employee_id()?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in)
        VALUES (?, CURDATE(), CURTIME())
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        // duplicate (employee_id, date)
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23000") {
                return Err(AppError::conflict("Already checked in today").into());
            }
        }

        tracing::error!(error = %e, employee_id, "Check-in failed");
        return Err(AppError::from(e).into());
    }

    let record = today_record(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::internal("check-in row missing after insert"))?;
    Ok(HttpResponse::Ok().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Attendance),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.own_employee_id()?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = CURTIME()
        WHERE employee_id = ?
        AND date = CURDATE()
        AND check_out IS NULL
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Check-out failed");
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request("No active check-in found for today").into());
    }

    let record = today_record(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::internal("attendance row missing after check-out"))?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record with worked hours once closed", body = Object, example = json!({
            "attendance": { "id": 1, "employee_id": 7, "date": "2026-03-02", "check_in": "08:00:00", "check_out": null },
            "worked_hours": null
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.own_employee_id()?;

    let record = today_record(pool.get_ref(), employee_id).await?;
    let worked_hours = record.as_ref().and_then(Attendance::worked_hours);
    Ok(HttpResponse::Ok().json(json!({
        "attendance": record,
        "worked_hours": worked_hours
    })))
}
