use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
};
use futures::future::{Ready, ready};

/// The caller, as established by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The employee this login marks attendance for.
    pub fn require_employee(&self) -> actix_web::Result<u64> {
        self.employee_id
            .ok_or_else(|| ErrorForbidden("No employee profile"))
    }

    /// Admins see everyone; employees only themselves.
    pub fn can_view_employee(&self, employee_id: u64) -> bool {
        self.is_admin() || self.employee_id == Some(employee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".to_string(),
            role,
            employee_id,
        }
    }

    #[test]
    fn employees_see_only_themselves() {
        let admin = user(Role::Admin, None);
        let worker = user(Role::Employee, Some(7));

        assert!(admin.can_view_employee(7));
        assert!(admin.can_view_employee(8));
        assert!(worker.can_view_employee(7));
        assert!(!worker.can_view_employee(8));

        assert!(admin.require_admin().is_ok());
        assert!(worker.require_admin().is_err());
        assert!(admin.require_employee().is_err());
        assert_eq!(worker.require_employee().unwrap(), 7);
    }

    #[actix_web::test]
    async fn extractor_reads_the_middleware_extension() {
        let req = TestRequest::default().to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());

        req.extensions_mut().insert(user(Role::Employee, Some(7)));
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.employee_id, Some(7));
    }
}
