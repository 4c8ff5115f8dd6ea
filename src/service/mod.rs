pub mod api_key;
pub mod assignment;
pub mod auth;
pub mod depreciation;
pub mod employee;
pub mod final_settlement;
pub mod maintenance;
pub mod mfa;
pub mod payroll;
pub mod rental;
pub mod rental_extension;
pub mod resignation;
pub mod salary_advance;
pub mod salary_increment;
pub mod session;
pub mod settings;
pub mod timesheet;
