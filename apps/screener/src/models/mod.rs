pub mod job_role;
pub mod score;
