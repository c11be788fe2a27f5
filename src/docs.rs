use crate::api::attendance::{
    AddressOverride, AttendanceListResponse, PunchRequest, StatusOverride,
};
use crate::api::department::{CreateDepartment, DepartmentListResponse};
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::geocode::GeocodeResponse;
use crate::api::job_role::{AssignJobRole, CreateJobRole, JobRoleListResponse};
use crate::api::site::{CreateSite, SiteListResponse};
use crate::api::work_assignment::{CreateWorkAssignment, WorkAssignmentListResponse};
use crate::geo::Coordinate;
use crate::geo::location::{LocationError, LocationReport};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::model::department::{CatalogStatus, Department};
use crate::model::employee::{Employee, EmployeeStatus, EmploymentType};
use crate::model::job_role::JobRole;
use crate::model::site::{ProjectSite, SiteStatus};
use crate::model::work_assignment::{AssignmentStatus, WorkAssignment};
use crate::models::{LoginReqDto, TokenPair, UserReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Site Attendance API",
        version = "1.0.0",
        description = r#"
## Construction Site Attendance

Workforce attendance for construction projects. Employees check in and out
from their phones; each request carries the device's location and is only
accepted inside the geofence of the project site the employee is assigned to.

### 🔹 Key Features
- **Geofenced Attendance**
  - Check-in / check-out within a configurable radius (default 0.5 km) of the site
  - One open record per employee per day, enforced in-process and in the database
  - Best-effort reverse geocoding of where attendance was marked
- **Employee & Site Management**
  - Sites carry the reference coordinate used for the geofence
  - Departments, job roles and role assignment
  - Daily work assignments with start/end times
- **Admin Tools**
  - Daily per-status summary, status override, address correction

### 🔐 Security
All `/api` endpoints require a **JWT Bearer** access token.
Write operations on employees, sites, departments and job roles are **Admin** only.
Employees see only their own attendance and work assignments.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::summary,
        crate::api::attendance::override_status,
        crate::api::attendance::update_address,

        crate::api::geocode::reverse_geocode,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::site::create_site,
        crate::api::site::get_site,
        crate::api::site::list_sites,
        crate::api::site::update_site,
        crate::api::site::delete_site,

        crate::api::department::create_department,
        crate::api::department::get_department,
        crate::api::department::list_departments,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::job_role::create_job_role,
        crate::api::job_role::get_job_role,
        crate::api::job_role::list_job_roles,
        crate::api::job_role::update_job_role,
        crate::api::job_role::delete_job_role,
        crate::api::job_role::assign_job_role,

        crate::api::work_assignment::create_assignment,
        crate::api::work_assignment::get_assignment,
        crate::api::work_assignment::list_assignments,
        crate::api::work_assignment::employee_assignments,
        crate::api::work_assignment::update_assignment,
        crate::api::work_assignment::delete_assignment
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            UserReq,
            Coordinate,
            LocationError,
            LocationReport,
            PunchRequest,
            StatusOverride,
            AddressOverride,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceSummary,
            AttendanceListResponse,
            GeocodeResponse,
            CreateEmployee,
            Employee,
            EmployeeStatus,
            EmploymentType,
            EmployeeListResponse,
            CreateSite,
            ProjectSite,
            SiteStatus,
            SiteListResponse,
            CreateDepartment,
            Department,
            CatalogStatus,
            DepartmentListResponse,
            CreateJobRole,
            AssignJobRole,
            JobRole,
            JobRoleListResponse,
            CreateWorkAssignment,
            WorkAssignment,
            AssignmentStatus,
            WorkAssignmentListResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login, token rotation and user accounts"),
        (name = "Attendance", description = "Geofenced check-in / check-out"),
        (name = "Geocode", description = "Reverse geocoding preview"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Site", description = "Project site management APIs"),
        (name = "Department", description = "Department catalogue"),
        (name = "Job Role", description = "Job role catalogue and assignment"),
        (name = "Work Assignment", description = "Daily work given to employees"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the secured paths.
struct BearerAuth;

impl Modify for BearerAuth {
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_attendance_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/attendance/check-in"));
        assert!(doc.paths.paths.contains_key("/api/sites/{site_id}"));
        assert!(doc.paths.paths.contains_key("/api/departments/{department_id}"));
        assert!(doc.paths.paths.contains_key("/api/job-roles/assign"));
        assert!(doc.paths.paths.contains_key("/api/work-assignments/employee/{employee_id}"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
