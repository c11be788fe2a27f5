pub mod attendance;
pub mod department;
pub mod employee;
pub mod geocode;
pub mod job_role;
pub mod site;
pub mod work_assignment;
