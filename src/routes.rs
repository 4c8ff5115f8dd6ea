use crate::{
    api::{
        api_key, assignment, attendance, employee, equipment, final_settlement, leave_request, maintenance, mfa,
        organization, payroll, rental, rental_extension, resignation, salary_advance, salary_increment, session,
        settings, timesheet,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-route limiter allowing `requests_per_min` per peer IP, with the same burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .route("/me", web::get().to(handlers::me))
            .route("/health", web::get().to(settings::system_health))
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // literal segments before /{id}
                    .route("/next-file-number", web::get().to(employee::next_file_number))
                    .route("/summary", web::get().to(employee::employee_summary))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .route("/{id}/pay", web::get().to(employee::employee_pay))
                    .service(
                        web::resource("/{id}/assignments")
                            .route(web::get().to(assignment::list_assignments))
                            .route(web::post().to(assignment::create_assignment)),
                    )
                    .route("/{id}/timesheets/totals", web::get().to(timesheet::timesheet_totals))
                    .route("/{id}/salary-history", web::get().to(salary_increment::salary_history)),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::get().to(organization::list_departments))
                            .route(web::post().to(organization::create_department)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(organization::get_department))
                            .route(web::put().to(organization::update_department))
                            .route(web::delete().to(organization::delete_department)),
                    ),
            )
            .service(
                web::scope("/designations")
                    .service(
                        web::resource("")
                            .route(web::get().to(organization::list_designations))
                            .route(web::post().to(organization::create_designation)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(organization::get_designation))
                            .route(web::put().to(organization::update_designation))
                            .route(web::delete().to(organization::delete_designation)),
                    ),
            )
            .service(
                web::resource("/assignments/{id}")
                    .route(web::get().to(assignment::get_assignment))
                    .route(web::put().to(assignment::update_assignment))
                    .route(web::delete().to(assignment::delete_assignment)),
            )
            .service(
                web::scope("/timesheets")
                    .service(
                        web::resource("")
                            .route(web::get().to(timesheet::list_timesheets))
                            .route(web::post().to(timesheet::create_timesheet)),
                    )
                    .route("/bulk-approve", web::post().to(timesheet::bulk_approve))
                    .route("/{id}", web::get().to(timesheet::get_timesheet))
                    .route("/{id}/approve", web::put().to(timesheet::approve_timesheet))
                    .route("/{id}/reject", web::put().to(timesheet::reject_timesheet)),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .route("/{id}", web::get().to(leave_request::get_leave))
                    .route("/{id}/approve", web::put().to(leave_request::approve_leave))
                    .route("/{id}/reject", web::put().to(leave_request::reject_leave))
                    .route("/{id}/cancel", web::put().to(leave_request::cancel_leave)),
            )
            .service(
                web::scope("/attendance")
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/today", web::get().to(attendance::today)),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    .route("/generate", web::post().to(payroll::generate_payroll))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll)),
                    ),
            )
            .service(
                web::scope("/salary-advances")
                    .service(
                        web::resource("")
                            .route(web::get().to(salary_advance::list_advances))
                            .route(web::post().to(salary_advance::create_advance)),
                    )
                    .route("/statistics", web::get().to(salary_advance::advance_statistics))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(salary_advance::get_advance))
                            .route(web::put().to(salary_advance::update_advance)),
                    )
                    .route("/{id}/approve", web::put().to(salary_advance::approve_advance))
                    .route("/{id}/reject", web::put().to(salary_advance::reject_advance))
                    .route("/{id}/pay", web::put().to(salary_advance::pay_advance)),
            )
            .service(
                web::scope("/salary-increments")
                    .service(
                        web::resource("")
                            .route(web::get().to(salary_increment::list_increments))
                            .route(web::post().to(salary_increment::create_increment)),
                    )
                    .route("/statistics", web::get().to(salary_increment::increment_statistics))
                    .route("/projected-cost", web::get().to(salary_increment::projected_cost))
                    .route("/apply-due", web::post().to(salary_increment::apply_due))
                    .route("/{id}", web::get().to(salary_increment::get_increment))
                    .route("/{id}/approve", web::put().to(salary_increment::approve_increment))
                    .route("/{id}/reject", web::put().to(salary_increment::reject_increment))
                    .route("/{id}/apply", web::put().to(salary_increment::apply_increment)),
            )
            .service(
                web::scope("/resignations")
                    .service(
                        web::resource("")
                            .route(web::get().to(resignation::list_resignations))
                            .route(web::post().to(resignation::submit_resignation)),
                    )
                    .route("/{id}", web::get().to(resignation::get_resignation))
                    .route("/{id}/approve", web::put().to(resignation::approve_resignation))
                    .route("/{id}/reject", web::put().to(resignation::reject_resignation))
                    .route("/{id}/withdraw", web::put().to(resignation::withdraw_resignation)),
            )
            .service(
                web::scope("/final-settlements")
                    .service(
                        web::resource("")
                            .route(web::get().to(final_settlement::list_settlements))
                            .route(web::post().to(final_settlement::create_settlement)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(final_settlement::get_settlement))
                            .route(web::put().to(final_settlement::adjust_settlement)),
                    )
                    .route("/{id}/approve", web::put().to(final_settlement::approve_settlement))
                    .route("/{id}/pay", web::put().to(final_settlement::pay_settlement))
                    .route("/{id}/cancel", web::put().to(final_settlement::cancel_settlement)),
            )
            .service(
                web::scope("/equipment")
                    .service(
                        web::resource("")
                            .route(web::get().to(equipment::list_equipment))
                            .route(web::post().to(equipment::create_equipment)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(equipment::get_equipment))
                            .route(web::put().to(equipment::update_equipment))
                            .route(web::delete().to(equipment::delete_equipment)),
                    )
                    .route("/{id}/status", web::put().to(equipment::change_equipment_status))
                    .service(
                        web::resource("/{id}/depreciation")
                            .route(web::get().to(equipment::get_depreciation))
                            .route(web::put().to(equipment::set_depreciation)),
                    ),
            )
            .service(
                web::scope("/rentals")
                    .service(
                        web::resource("")
                            .route(web::get().to(rental::list_rentals))
                            .route(web::post().to(rental::create_rental)),
                    )
                    .route("/overdue", web::get().to(rental::overdue_rentals))
                    .route("/{id}", web::get().to(rental::get_rental))
                    .route("/{id}/activate", web::put().to(rental::activate_rental))
                    .route("/{id}/complete", web::put().to(rental::complete_rental))
                    .route("/{id}/cancel", web::put().to(rental::cancel_rental))
                    .service(
                        web::resource("/{id}/extensions")
                            .route(web::get().to(rental_extension::list_extensions))
                            .route(web::post().to(rental_extension::request_extension)),
                    ),
            )
            .service(
                web::scope("/rental-extensions")
                    .route("/{id}/approve", web::put().to(rental_extension::approve_extension))
                    .route("/{id}/reject", web::put().to(rental_extension::reject_extension)),
            )
            .service(
                web::scope("/maintenance")
                    .service(
                        web::resource("")
                            .route(web::get().to(maintenance::list_tasks))
                            .route(web::post().to(maintenance::create_task)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(maintenance::get_task))
                            .route(web::put().to(maintenance::update_task)),
                    )
                    .route("/{id}/assign", web::put().to(maintenance::assign_task))
                    .route("/{id}/start", web::put().to(maintenance::start_task))
                    .route("/{id}/complete", web::put().to(maintenance::complete_task))
                    .route("/{id}/cancel", web::put().to(maintenance::cancel_task)),
            )
            .service(
                web::scope("/settings")
                    .service(
                        web::resource("")
                            .route(web::get().to(settings::all_settings))
                            .route(web::put().to(settings::update_settings)),
                    )
                    .route("/public", web::get().to(settings::public_settings))
                    .route("/export", web::get().to(settings::export_settings))
                    .route("/import", web::post().to(settings::import_settings))
                    .route("/reset", web::post().to(settings::reset_settings))
                    .route("/reset/{category}", web::post().to(settings::reset_category))
                    .route("/{key}", web::get().to(settings::get_setting)),
            )
            .service(
                web::scope("/api-keys")
                    .service(
                        web::resource("")
                            .route(web::get().to(api_key::list_api_keys))
                            .route(web::post().to(api_key::create_api_key)),
                    )
                    .route("/{id}", web::delete().to(api_key::revoke_api_key)),
            )
            .service(
                web::scope("/sessions")
                    .service(
                        web::resource("")
                            .route(web::get().to(session::list_sessions))
                            .route(web::delete().to(session::revoke_other_sessions)),
                    )
                    .route("/{id}", web::delete().to(session::revoke_session)),
            )
            .service(
                web::scope("/mfa")
                    .route("/enable", web::post().to(mfa::enable_mfa))
                    .route("/disable", web::post().to(mfa::disable_mfa))
                    .route("/status", web::get().to(mfa::mfa_status)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL), tied to a device session

// API REQUEST
//  └─ Authorization: Bearer access_token  |  X-API-Key: hrk_...

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a rotated token pair
