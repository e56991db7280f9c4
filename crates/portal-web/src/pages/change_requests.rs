use askama::Template;
use axum::{
    extract::{Path, Query},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_core::{
    matches_status, ChangeDecision, ChangeRequestKind, Id, ServiceOrderChangeRequest,
    ValidationError,
};
use serde::Deserialize;
use tracing::info;

use crate::session::SignedIn;
use crate::shell::{display_date, display_timestamp, render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/change-requests";

pub(crate) struct ChangeRequestRow {
    pub id: Id,
    pub service_order_id: Id,
    pub kind: String,
    pub status: String,
    pub initiated_by: String,
    pub details: String,
    pub created_at: String,
    pub decidable: bool,
}

impl From<&ServiceOrderChangeRequest> for ChangeRequestRow {
    fn from(cr: &ServiceOrderChangeRequest) -> Self {
        Self {
            id: cr.id,
            service_order_id: cr.service_order_id,
            kind: cr.kind.label().to_string(),
            status: cr.status.label().to_string(),
            initiated_by: cr.initiated_by.label().to_string(),
            details: details(cr),
            created_at: display_timestamp(cr.created_at),
            decidable: cr.is_decidable_by_provider(),
        }
    }
}

fn details(cr: &ServiceOrderChangeRequest) -> String {
    let mut parts = Vec::new();
    match cr.kind {
        ChangeRequestKind::Substitution => {
            if let Some(id) = cr.new_specialist_id {
                parts.push(format!("Replacement specialist #{id}"));
            }
        }
        ChangeRequestKind::Extension => {
            if cr.new_end_date.is_some() {
                parts.push(format!("Until {}", display_date(cr.new_end_date)));
            }
            if let Some(days) = cr.additional_man_days {
                parts.push(format!("+{days} man-days"));
            }
        }
        _ => {}
    }
    if let Some(reason) = cr.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        parts.push(reason.to_string());
    }
    parts.join(" · ")
}

#[derive(Debug, Deserialize, Default)]
pub struct ChangeRequestsQuery {
    #[serde(default)]
    status: String,
    #[serde(default)]
    kind: String,
}

#[derive(Template)]
#[template(path = "change_requests.html")]
struct ChangeRequestsTemplate {
    title: String,
    nav: NavContext,
    requests: Vec<ChangeRequestRow>,
    status: String,
    kind: String,
}

pub async fn list(
    signed: SignedIn,
    Query(query): Query<ChangeRequestsQuery>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_manage_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut requests = signed.portal.list_change_requests().await.or_page(&nav)?;
    requests.retain(|cr| {
        matches_status(&query.status, cr.status.label()) && matches_status(&query.kind, cr.kind.label())
    });
    // Pending decisions first, newest first within each group.
    requests.sort_by(|a, b| {
        b.is_decidable_by_provider()
            .cmp(&a.is_decidable_by_provider())
            .then(b.created_at.cmp(&a.created_at))
            .then(b.id.cmp(&a.id))
    });

    Ok(render_html(ChangeRequestsTemplate {
        title: "Change Requests".to_string(),
        nav,
        requests: requests.iter().map(ChangeRequestRow::from).collect(),
        status: query.status,
        kind: query.kind,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DecisionForm {
    #[serde(default)]
    decision: String,
    #[serde(default)]
    back: Option<String>,
}

impl DecisionForm {
    fn decision(&self) -> Result<ChangeDecision, ValidationError> {
        match self.decision.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(ChangeDecision::Approve),
            "decline" | "declined" => Ok(ChangeDecision::Decline),
            _ => Err(ValidationError::new("Choose approve or decline")),
        }
    }

    /// Only an order detail path (`/service-orders/{id}`) is followed.
    fn back(&self) -> &str {
        let Some(path) = self.back.as_deref() else {
            return ACTIVE;
        };
        match path.strip_prefix("/service-orders/") {
            Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => path,
            _ => ACTIVE,
        }
    }
}

pub async fn decide(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<DecisionForm>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_manage_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let decision = form.decision().map_err(|e| PageError::api(nav.clone(), e.into()))?;

    let pending = signed
        .portal
        .list_change_requests()
        .await
        .or_page(&nav)?
        .into_iter()
        .find(|cr| cr.id == id);
    match pending {
        Some(cr) if cr.is_decidable_by_provider() => {}
        Some(cr) => {
            return Err(PageError::api(
                nav,
                ValidationError::new(format!(
                    "Change request #{} is {} and cannot be decided here",
                    cr.id, cr.status
                ))
                .into(),
            ))
        }
        None => {
            return Err(PageError::api(
                nav,
                portal_client::ApiError::Http {
                    status: 404,
                    detail: Some(format!("Change request #{id} was not found")),
                },
            ))
        }
    }

    let updated = signed
        .portal
        .decide_change_request(id, decision)
        .await
        .or_page(&nav)?;
    info!(change_request_id = id, status = %updated.status, "change request decided");
    Ok(Redirect::to(form.back()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(decision: &str, back: Option<&str>) -> DecisionForm {
        DecisionForm {
            decision: decision.to_string(),
            back: back.map(str::to_string),
        }
    }

    #[test]
    fn decision_values_are_lenient() {
        assert_eq!(form("Approve", None).decision().unwrap(), ChangeDecision::Approve);
        assert_eq!(form(" declined ", None).decision().unwrap(), ChangeDecision::Decline);
        assert!(form("maybe", None).decision().is_err());
    }

    #[test]
    fn back_only_follows_local_paths() {
        assert_eq!(form("approve", Some("/service-orders/4")).back(), "/service-orders/4");
        assert_eq!(form("approve", Some("https://evil.example")).back(), ACTIVE);
        assert_eq!(form("approve", Some("//evil.example")).back(), ACTIVE);
        assert_eq!(form("approve", Some("/\\evil.example")).back(), ACTIVE);
        assert_eq!(form("approve", Some("/service-orders/4\nSet-Cookie: x=1")).back(), ACTIVE);
        assert_eq!(form("approve", Some("/service-orders/")).back(), ACTIVE);
        assert_eq!(form("approve", Some("/users/4")).back(), ACTIVE);
        assert_eq!(form("approve", None).back(), ACTIVE);
    }
}
