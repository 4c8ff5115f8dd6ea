pub mod api_key;
pub mod assignment;
pub mod attendance;
pub mod department;
pub mod depreciation;
pub mod designation;
pub mod device_session;
pub mod employee;
pub mod equipment;
pub mod final_settlement;
pub mod leave_request;
pub mod maintenance;
pub mod mfa;
pub mod payroll;
pub mod rental;
pub mod rental_extension;
pub mod resignation;
pub mod role;
pub mod salary_advance;
pub mod salary_increment;
pub mod status;
pub mod system_setting;
pub mod timesheet;
