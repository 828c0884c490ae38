pub mod accounts;
pub mod admissions;
