//! Layout shell: role-filtered navigation, page rendering and the error page.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use portal_client::ApiError;
use portal_core::{RoleSet, User};
use tracing::error;

use crate::session::to_login;

#[derive(Debug, Clone)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NavContext {
    pub user_name: String,
    pub user_id: i64,
    pub roles_text: String,
    pub links: Vec<NavLink>,
}

impl NavContext {
    pub fn for_user(user: &User, roles: &RoleSet, active: &str) -> Self {
        let roles_text = if roles.is_empty() {
            "No role".to_string()
        } else {
            roles.labels().join(", ")
        };
        Self {
            user_name: user.display_name(),
            user_id: user.id,
            roles_text,
            links: nav_links(roles, active),
        }
    }
}

/// Links shown in the sidebar; a link is present only when its page is usable.
pub fn nav_links(roles: &RoleSet, active: &str) -> Vec<NavLink> {
    let candidates: [(&'static str, &'static str, bool); 11] = [
        ("/", "Dashboard", true),
        ("/contracts", "Contracts", roles.can_view_contracts()),
        ("/service-requests", "Service Requests", roles.can_view_service_requests()),
        ("/service-offers", "Service Offers", roles.can_submit_offers()),
        ("/service-orders", "Service Orders", roles.can_view_service_orders()),
        ("/change-requests", "Change Requests", roles.can_manage_service_orders()),
        ("/specialists", "Specialists", roles.can_view_specialists()),
        ("/provider", "Provider Profile", true),
        ("/users", "Users & Roles", roles.can_manage_users()),
        ("/activity-logs", "Activity Log", roles.can_view_activity_log()),
        ("/me", "My Profile", true),
    ];
    candidates
        .into_iter()
        .filter(|(_, _, visible)| *visible)
        .map(|(href, label, _)| NavLink {
            href,
            label,
            active: href == active,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    title: String,
    nav: NavContext,
    message: String,
}

/// A page that could not be shown. Expired sessions become a login redirect.
#[derive(Debug)]
pub struct PageError {
    nav: NavContext,
    status: StatusCode,
    message: String,
    expired: bool,
}

impl PageError {
    pub fn api(nav: NavContext, err: ApiError) -> Self {
        let status = match &err {
            ApiError::Http { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            nav,
            status,
            message: err.user_message(),
            expired: err.is_session_expired(),
        }
    }

    pub fn forbidden(nav: NavContext) -> Self {
        Self {
            nav,
            status: StatusCode::FORBIDDEN,
            message: "You do not have access to this page.".to_string(),
            expired: false,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        if self.expired {
            return to_login();
        }
        let page = ErrorTemplate {
            title: "Something went wrong".to_string(),
            nav: self.nav,
            message: self.message,
        };
        let mut resp = render_html(page);
        *resp.status_mut() = self.status;
        resp
    }
}

pub fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

pub fn server_error(err: anyhow::Error) -> Response {
    error!(error = %err, "rendering failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

/// Extension for turning API results into page errors inside handlers.
pub trait OrPage<T> {
    fn or_page(self, nav: &NavContext) -> Result<T, PageError>;
}

impl<T> OrPage<T> for Result<T, ApiError> {
    fn or_page(self, nav: &NavContext) -> Result<T, PageError> {
        self.map_err(|err| PageError::api(nav.clone(), err))
    }
}

pub fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

pub fn display_date(value: Option<chrono::NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

pub fn display_timestamp(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::Role;

    fn labels(roles: &[Role]) -> Vec<&'static str> {
        let set: RoleSet = roles.iter().cloned().collect();
        nav_links(&set, "/").into_iter().map(|l| l.label).collect()
    }

    #[test]
    fn admin_gets_every_link() {
        let links = labels(&[Role::ProviderAdmin]);
        assert!(links.contains(&"Users & Roles"));
        assert!(links.contains(&"Activity Log"));
        assert!(links.contains(&"Contracts"));
    }

    #[test]
    fn specialist_gets_orders_but_no_admin_links() {
        let links = labels(&[Role::Specialist]);
        assert_eq!(
            links,
            vec!["Dashboard", "Service Orders", "Provider Profile", "My Profile"]
        );
    }

    #[test]
    fn active_link_is_marked() {
        let set: RoleSet = [Role::SupplierRepresentative].into_iter().collect();
        let links = nav_links(&set, "/service-requests");
        let active: Vec<_> = links.iter().filter(|l| l.active).map(|l| l.href).collect();
        assert_eq!(active, vec!["/service-requests"]);
    }
}
