use crate::error::AppError;
use crate::model::api_key::ApiScope;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, http::Method};
use futures::future::{Ready, ready};
use serde::Serialize;

/// Principal put into request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
    /// Device session of a token login; `None` for API keys
    pub session_id: Option<u64>,
    /// Scopes of the presenting API key; `None` for token logins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<ApiScope>>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthUser>().cloned();
        ready(user.ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()).into()))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role != Role::Admin {
            return Err(AppError::forbidden("Admin only"));
        }
        match &self.scopes {
            Some(scopes) if !scopes.contains(&ApiScope::Admin) => {
                Err(AppError::forbidden("API key lacks the admin scope"))
            }
            _ => Ok(()),
        }
    }

    /// Read-only keys may only use safe methods.
    pub fn require_method_scope(&self, method: &Method) -> Result<(), AppError> {
        let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
        match &self.scopes {
            Some(scopes) if !safe && !ApiScope::allows_writes(scopes) => {
                Err(AppError::forbidden("API key lacks the write scope"))
            }
            _ => Ok(()),
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    /// The employee may act on their own records; HR and admins on anyone's.
    pub fn require_self_or_hr(&self, employee_id: u64) -> Result<(), AppError> {
        if self.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(AppError::forbidden("Not allowed to access this employee"))
        }
    }

    pub fn own_employee_id(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("No employee profile"))
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".to_string(),
            role,
            employee_id,
            session_id: None,
            scopes: None,
        }
    }

    fn key_user(role: Role, scopes: &[ApiScope]) -> AuthUser {
        AuthUser { scopes: Some(scopes.to_vec()), ..user(role, None) }
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, None).require_admin().is_ok());
        assert!(user(Role::Hr, None).require_admin().is_err());
        assert!(user(Role::Hr, None).require_hr_or_admin().is_ok());
        assert!(user(Role::Employee, Some(3)).require_hr_or_admin().is_err());
        assert!(user(Role::Employee, Some(3)).is_employee());
        assert!(!user(Role::ApiUser, None).is_employee());
    }

    #[test]
    fn read_only_key_cannot_mutate() {
        let key = key_user(Role::Hr, &[ApiScope::Read]);
        assert!(key.require_method_scope(&Method::GET).is_ok());
        assert!(matches!(key.require_method_scope(&Method::POST), Err(AppError::Forbidden(_))));
        assert!(key.require_method_scope(&Method::DELETE).is_err());
        assert!(key.require_method_scope(&Method::PATCH).is_err());

        assert!(key_user(Role::Hr, &[ApiScope::Write]).require_method_scope(&Method::PUT).is_ok());
        assert!(user(Role::Employee, Some(3)).require_method_scope(&Method::POST).is_ok());
    }

    #[test]
    fn admin_routes_need_the_admin_scope() {
        assert!(key_user(Role::Admin, &[ApiScope::Read, ApiScope::Write]).require_admin().is_err());
        assert!(key_user(Role::Admin, &[ApiScope::Admin]).require_admin().is_ok());
        assert!(key_user(Role::Hr, &[ApiScope::Admin]).require_admin().is_err());
    }

    #[test]
    fn employees_only_reach_their_own_records() {
        let emp = user(Role::Employee, Some(3));
        assert!(emp.require_self_or_hr(3).is_ok());
        assert!(emp.require_self_or_hr(4).is_err());
        assert!(user(Role::Hr, None).require_self_or_hr(4).is_ok());
        assert!(user(Role::Employee, None).own_employee_id().is_err());
    }
}
