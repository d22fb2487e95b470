pub mod check_run;
pub mod ci_status;
pub mod repository;
