use crate::api::{
    AdvanceListResponse, EmployeeListResponse, IncrementListResponse, LeaveListResponse, PayrollListResponse,
    ReasonBody, RentalListResponse, SettlementListResponse, TimesheetListResponse,
    api_key::CreateApiKey,
    employee::PayBreakdown,
    equipment::{ChangeEquipmentStatus, CreateEquipment},
    leave_request::CreateLeave,
    maintenance::AssignTechnician,
    mfa::DisableMfa,
    organization::{CreateDepartment, CreateDesignation},
    salary_increment::RejectIncrement,
    settings::ImportSettings,
    timesheet::BulkApprove,
};
use crate::model::{
    api_key::ApiKey,
    assignment::{AssignmentType, EmployeeAssignment},
    attendance::Attendance,
    department::Department,
    depreciation::{DepreciationMethod, EquipmentDepreciation, ScheduleYear},
    designation::Designation,
    device_session::DeviceSession,
    employee::{Employee, EmployeeStatus, PayProfile},
    equipment::{Equipment, EquipmentStatus},
    final_settlement::{FinalSettlement, SettlementStatus},
    leave_request::{LeaveRequest, LeaveStatus, LeaveType},
    maintenance::{MaintenanceStatus, MaintenanceTask},
    payroll::Payroll,
    rental::{Rental, RentalItem, RentalStatus},
    rental_extension::{ExtensionStatus, RentalExtension},
    resignation::{Resignation, ResignationStatus},
    salary_advance::{AdvanceStatus, SalaryAdvance},
    salary_increment::{IncrementStatus, IncrementTerms, IncrementType, SalaryComponents, SalaryIncrement},
    system_setting::SettingType,
    timesheet::{Timesheet, TimesheetStatus, WorkedHours},
};
use crate::models::{LoginReqDto, TokenPair, UserReq};
use crate::service::{
    api_key::CreatedApiKey,
    assignment::CreateAssignment,
    depreciation::{SetDepreciation, Valuation},
    employee::{CreateEmployee, EmployeeSummary, EmployeeUserAccount},
    final_settlement::{AdjustSettlement, CreateSettlement, PaySettlement},
    maintenance::{CompleteTask, CreateTask},
    mfa::{MfaEnrollment, MfaStatus},
    payroll::{CreatePayroll, GeneratePayroll, GeneratedPayroll, UpdatePayroll},
    rental::{CreateRental, NewRentalItem, RentalDetail},
    rental_extension::RequestExtension,
    resignation::SubmitResignation,
    salary_advance::{AdvanceStatistics, ApproveAdvance, CreateAdvance, PayAdvance},
    salary_increment::{CreateIncrement, IncrementStatistics, ProjectedCost, TypeBreakdown, TypeCost},
    settings::{ExportedSetting, HealthCheck, HealthReport, HealthStatus, ImportSummary},
    timesheet::{CreateTimesheet, TimesheetTotals},
};
use utoipa::openapi::security::{ApiKey as ApiKeyScheme, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the two ways a caller can authenticate.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKeyScheme::Header(ApiKeyValue::new("X-API-Key"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP API",
        version = "1.0.0",
        description = r#"
## HR, Rental and Payroll ERP

### Key Features
- **Employees**: profiles, departments, designations, pay rates and assignments
- **Time**: timesheets with overtime split, leave requests and daily attendance
- **Payroll**: monthly payroll runs, salary advances, salary increments, resignations and final settlements
- **Equipment**: inventory, depreciation, rentals with line items and extensions, and maintenance tasks
- **Platform**: typed system settings, API keys, device sessions and MFA backup codes

### Security
Protected endpoints accept a **JWT Bearer** access token or an `X-API-Key` header.
Sensitive operations are limited to the **Admin** and **HR** roles.

### Response Format
List endpoints return `{ data, page, per_page, total }`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::employee_pay,
        crate::api::employee::next_file_number,
        crate::api::employee::employee_summary,

        crate::api::organization::list_departments,
        crate::api::organization::get_department,
        crate::api::organization::create_department,
        crate::api::organization::update_department,
        crate::api::organization::delete_department,
        crate::api::organization::list_designations,
        crate::api::organization::get_designation,
        crate::api::organization::create_designation,
        crate::api::organization::update_designation,
        crate::api::organization::delete_designation,

        crate::api::assignment::list_assignments,
        crate::api::assignment::create_assignment,
        crate::api::assignment::get_assignment,
        crate::api::assignment::update_assignment,
        crate::api::assignment::delete_assignment,

        crate::api::timesheet::create_timesheet,
        crate::api::timesheet::list_timesheets,
        crate::api::timesheet::get_timesheet,
        crate::api::timesheet::approve_timesheet,
        crate::api::timesheet::reject_timesheet,
        crate::api::timesheet::bulk_approve,
        crate::api::timesheet::timesheet_totals,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,

        crate::api::payroll::create_payroll,
        crate::api::payroll::generate_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::salary_advance::create_advance,
        crate::api::salary_advance::list_advances,
        crate::api::salary_advance::advance_statistics,
        crate::api::salary_advance::get_advance,
        crate::api::salary_advance::update_advance,
        crate::api::salary_advance::approve_advance,
        crate::api::salary_advance::reject_advance,
        crate::api::salary_advance::pay_advance,

        crate::api::salary_increment::create_increment,
        crate::api::salary_increment::list_increments,
        crate::api::salary_increment::increment_statistics,
        crate::api::salary_increment::projected_cost,
        crate::api::salary_increment::apply_due,
        crate::api::salary_increment::salary_history,
        crate::api::salary_increment::get_increment,
        crate::api::salary_increment::approve_increment,
        crate::api::salary_increment::reject_increment,
        crate::api::salary_increment::apply_increment,

        crate::api::resignation::submit_resignation,
        crate::api::resignation::list_resignations,
        crate::api::resignation::get_resignation,
        crate::api::resignation::approve_resignation,
        crate::api::resignation::reject_resignation,
        crate::api::resignation::withdraw_resignation,

        crate::api::final_settlement::create_settlement,
        crate::api::final_settlement::list_settlements,
        crate::api::final_settlement::get_settlement,
        crate::api::final_settlement::adjust_settlement,
        crate::api::final_settlement::approve_settlement,
        crate::api::final_settlement::pay_settlement,
        crate::api::final_settlement::cancel_settlement,

        crate::api::equipment::create_equipment,
        crate::api::equipment::list_equipment,
        crate::api::equipment::get_equipment,
        crate::api::equipment::update_equipment,
        crate::api::equipment::change_equipment_status,
        crate::api::equipment::delete_equipment,
        crate::api::equipment::get_depreciation,
        crate::api::equipment::set_depreciation,

        crate::api::rental::create_rental,
        crate::api::rental::list_rentals,
        crate::api::rental::overdue_rentals,
        crate::api::rental::get_rental,
        crate::api::rental::activate_rental,
        crate::api::rental::complete_rental,
        crate::api::rental::cancel_rental,
        crate::api::rental_extension::request_extension,
        crate::api::rental_extension::list_extensions,
        crate::api::rental_extension::approve_extension,
        crate::api::rental_extension::reject_extension,

        crate::api::maintenance::create_task,
        crate::api::maintenance::list_tasks,
        crate::api::maintenance::get_task,
        crate::api::maintenance::update_task,
        crate::api::maintenance::assign_task,
        crate::api::maintenance::start_task,
        crate::api::maintenance::complete_task,
        crate::api::maintenance::cancel_task,

        crate::api::settings::all_settings,
        crate::api::settings::public_settings,
        crate::api::settings::get_setting,
        crate::api::settings::update_settings,
        crate::api::settings::reset_settings,
        crate::api::settings::reset_category,
        crate::api::settings::export_settings,
        crate::api::settings::import_settings,
        crate::api::settings::system_health,

        crate::api::api_key::create_api_key,
        crate::api::api_key::list_api_keys,
        crate::api::api_key::revoke_api_key,

        crate::api::session::list_sessions,
        crate::api::session::revoke_session,
        crate::api::session::revoke_other_sessions,

        crate::api::mfa::enable_mfa,
        crate::api::mfa::disable_mfa,
        crate::api::mfa::mfa_status
    ),
    components(
        schemas(
            UserReq, LoginReqDto, TokenPair,
            ReasonBody,
            Employee, EmployeeStatus, PayProfile, PayBreakdown, CreateEmployee, EmployeeUserAccount,
            EmployeeSummary, EmployeeListResponse,
            Department, Designation, CreateDepartment, CreateDesignation,
            EmployeeAssignment, AssignmentType, CreateAssignment,
            Timesheet, TimesheetStatus, WorkedHours, CreateTimesheet, BulkApprove, TimesheetTotals,
            TimesheetListResponse,
            LeaveRequest, LeaveStatus, LeaveType, CreateLeave, LeaveListResponse,
            Attendance,
            Payroll, CreatePayroll, UpdatePayroll, GeneratePayroll, GeneratedPayroll, PayrollListResponse,
            SalaryAdvance, AdvanceStatus, CreateAdvance, ApproveAdvance, PayAdvance, AdvanceStatistics,
            AdvanceListResponse,
            SalaryIncrement, IncrementStatus, IncrementType, IncrementTerms, SalaryComponents, CreateIncrement,
            RejectIncrement, IncrementStatistics, TypeBreakdown, ProjectedCost, TypeCost, IncrementListResponse,
            Resignation, ResignationStatus, SubmitResignation,
            FinalSettlement, SettlementStatus, CreateSettlement, AdjustSettlement, PaySettlement,
            SettlementListResponse,
            Equipment, EquipmentStatus, CreateEquipment, ChangeEquipmentStatus,
            EquipmentDepreciation, DepreciationMethod, ScheduleYear, SetDepreciation, Valuation,
            Rental, RentalItem, RentalStatus, CreateRental, NewRentalItem, RentalDetail, RentalListResponse,
            RentalExtension, ExtensionStatus, RequestExtension,
            MaintenanceTask, MaintenanceStatus, CreateTask, CompleteTask, AssignTechnician,
            SettingType, ImportSettings, ExportedSetting, ImportSummary, HealthReport, HealthCheck, HealthStatus,
            ApiKey, CreateApiKey, CreatedApiKey,
            DeviceSession,
            MfaStatus, MfaEnrollment, DisableMfa
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token refresh"),
        (name = "Employee", description = "Employee records and pay rates"),
        (name = "Organization", description = "Departments and designations"),
        (name = "Assignment", description = "Employee assignments to projects and rentals"),
        (name = "Timesheet", description = "Daily timesheets and approval"),
        (name = "Leave", description = "Leave requests"),
        (name = "Attendance", description = "Daily check-in and check-out"),
        (name = "Payroll", description = "Monthly payroll"),
        (name = "Salary Advance", description = "Salary advance requests and repayment"),
        (name = "Salary Increment", description = "Salary increments and history"),
        (name = "Resignation", description = "Resignation workflow"),
        (name = "Final Settlement", description = "End-of-service settlements of resigned employees"),
        (name = "Equipment", description = "Equipment inventory and depreciation"),
        (name = "Rental", description = "Equipment rentals and extensions"),
        (name = "Maintenance", description = "Equipment maintenance tasks"),
        (name = "Settings", description = "System settings and health"),
        (name = "API Keys", description = "API key management"),
        (name = "Sessions", description = "Device sessions"),
        (name = "MFA", description = "Authenticator-app multi-factor authentication with backup codes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_both_security_schemes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("api_key"));
    }

    #[test]
    fn literal_routes_are_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/employees/summary",
            "/api/rentals/overdue",
            "/api/rentals/{rental_id}/extensions",
            "/api/final-settlements",
            "/api/equipment/{equipment_id}/depreciation",
            "/api/health",
            "/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{} missing", path);
        }
    }
}
