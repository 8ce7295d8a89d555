pub mod applicant;
pub mod application;
