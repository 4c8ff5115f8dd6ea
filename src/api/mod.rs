use crate::model::{
    employee::Employee, final_settlement::FinalSettlement, leave_request::LeaveRequest, payroll::Payroll,
    rental::Rental, salary_advance::SalaryAdvance, salary_increment::SalaryIncrement, timesheet::Timesheet,
};
use crate::utils::db_utils::PageParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod api_key;
pub mod assignment;
pub mod attendance;
pub mod employee;
pub mod equipment;
pub mod final_settlement;
pub mod leave_request;
pub mod maintenance;
pub mod mfa;
pub mod organization;
pub mod payroll;
pub mod rental;
pub mod rental_extension;
pub mod resignation;
pub mod salary_advance;
pub mod salary_increment;
pub mod session;
pub mod settings;
pub mod timesheet;

/// Page of a list endpoint.
#[derive(Serialize, ToSchema)]
#[aliases(
    EmployeeListResponse = Paginated<Employee>,
    LeaveListResponse = Paginated<LeaveRequest>,
    TimesheetListResponse = Paginated<Timesheet>,
    AdvanceListResponse = Paginated<SalaryAdvance>,
    IncrementListResponse = Paginated<SalaryIncrement>,
    PayrollListResponse = Paginated<Payroll>,
    RentalListResponse = Paginated<Rental>,
    SettlementListResponse = Paginated<FinalSettlement>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 15)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: PageParams, total: i64) -> Self {
        Self {
            data,
            page: page.page,
            per_page: page.per_page,
            total,
        }
    }
}

/// Body of reject endpoints.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReasonBody {
    #[schema(example = "Missing supporting documents")]
    pub reason: String,
}

/// Optional date window used by statistics endpoints.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DateRange {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<chrono::NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<chrono::NaiveDate>,
}
