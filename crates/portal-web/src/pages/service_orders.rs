use askama::Template;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::NaiveDate;
use portal_core::{
    format_optional_eur, matches_query, matches_status, parse_days, parse_id, require,
    ChangeRequestKind, Id, NewChangeRequest, ServiceOrder, SubstitutionRequest, ValidationError,
};
use serde::Deserialize;
use tracing::info;

use crate::pages::change_requests::ChangeRequestRow;
use crate::session::SignedIn;
use crate::shell::{display_date, display_opt, render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/service-orders";

#[derive(Debug, Deserialize, Default)]
pub struct OrdersQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    status: String,
}

struct OrderRow {
    id: Id,
    title: String,
    specialist: String,
    period: String,
    location: String,
    status: String,
    man_days: String,
    total_cost: String,
}

impl From<&ServiceOrder> for OrderRow {
    fn from(o: &ServiceOrder) -> Self {
        Self {
            id: o.id,
            title: o.title.clone(),
            specialist: o.specialist_name.clone().unwrap_or_default(),
            period: format!("{} to {}", display_date(o.start_date), display_date(o.end_date)),
            location: o.location.clone().unwrap_or_default(),
            status: o.status.label().to_string(),
            man_days: display_opt(o.man_days),
            total_cost: format_optional_eur(o.total_cost),
        }
    }
}

#[derive(Template)]
#[template(path = "service_orders.html")]
struct OrdersTemplate {
    title: String,
    nav: NavContext,
    orders: Vec<OrderRow>,
    query: String,
    status: String,
}

/// Specialist-only users see the orders they are assigned to and nothing else.
fn visible_to(signed: &SignedIn, order: &ServiceOrder) -> bool {
    !signed.roles.is_specialist_only() || order.specialist_id == Some(signed.user.id)
}

pub async fn list(signed: SignedIn, Query(query): Query<OrdersQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut orders = signed.portal.list_service_orders().await.or_page(&nav)?;
    orders.retain(|o| {
        visible_to(&signed, o)
            && matches_status(&query.status, o.status.label())
            && matches_query(
                &query.q,
                [o.title.as_str(), o.specialist_name.as_deref().unwrap_or_default()],
            )
    });
    orders.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));

    Ok(render_html(OrdersTemplate {
        title: "Service Orders".to_string(),
        nav,
        orders: orders.iter().map(OrderRow::from).collect(),
        query: query.q,
        status: query.status,
    }))
}

struct HistoryRow {
    at: String,
    kind: String,
    message: String,
}

struct SpecialistChoice {
    id: Id,
    name: String,
}

#[derive(Template)]
#[template(path = "service_order_detail.html")]
struct OrderDetailTemplate {
    title: String,
    nav: NavContext,
    order: OrderRow,
    history: Vec<HistoryRow>,
    change_requests: Vec<ChangeRequestRow>,
    can_request_changes: bool,
    can_decide: bool,
    specialists: Vec<SpecialistChoice>,
    form_error: Option<String>,
}

async fn render_detail(
    signed: &SignedIn,
    id: Id,
    form_error: Option<String>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let order = signed.portal.get_service_order(id).await.or_page(&nav)?;
    if !visible_to(signed, &order) {
        return Err(signed.forbidden(ACTIVE));
    }

    let can_manage = signed.roles.can_manage_service_orders();
    let change_requests = if can_manage {
        signed
            .portal
            .list_change_requests()
            .await
            .or_page(&nav)?
            .into_iter()
            .filter(|cr| cr.service_order_id == order.id)
            .collect::<Vec<_>>()
    } else {
        Vec::new()
    };
    let can_request_changes = can_manage && order.status.accepts_change_requests();
    let specialists = if can_request_changes {
        signed
            .portal
            .list_specialists()
            .await
            .or_page(&nav)?
            .into_iter()
            .filter(|s| Some(s.id) != order.specialist_id)
            .map(|s| SpecialistChoice { id: s.id, name: s.name })
            .collect()
    } else {
        Vec::new()
    };

    let status = if form_error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let mut resp = render_html(OrderDetailTemplate {
        title: order.title.clone(),
        nav,
        history: order
            .change_history
            .iter()
            .map(|h| HistoryRow {
                at: h.at.format("%Y-%m-%d %H:%M").to_string(),
                kind: h.kind.clone().unwrap_or_default(),
                message: h.message.clone(),
            })
            .collect(),
        change_requests: change_requests.iter().map(ChangeRequestRow::from).collect(),
        can_request_changes,
        can_decide: can_manage,
        specialists,
        order: OrderRow::from(&order),
        form_error,
    });
    *resp.status_mut() = status;
    Ok(resp)
}

pub async fn detail(signed: SignedIn, Path(id): Path<Id>) -> Result<Response, PageError> {
    render_detail(&signed, id, None).await
}

#[derive(Debug, Deserialize)]
pub struct SubstitutionForm {
    #[serde(default)]
    new_specialist_id: String,
    #[serde(default)]
    reason: String,
}

impl SubstitutionForm {
    fn to_request(&self) -> Result<SubstitutionRequest, ValidationError> {
        Ok(SubstitutionRequest {
            new_specialist_id: parse_id("Replacement specialist", &self.new_specialist_id)?,
            reason: require("Reason", &self.reason)?,
        })
    }
}

pub async fn substitution(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<SubstitutionForm>,
) -> Result<Response, PageError> {
    if !signed.roles.can_manage_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let request = match form.to_request() {
        Ok(request) => request,
        Err(err) => return render_detail(&signed, id, Some(err.message)).await,
    };
    match signed.portal.request_substitution(id, &request).await {
        Ok(cr) => {
            info!(order_id = id, change_request_id = cr.id, "substitution requested");
            Ok(Redirect::to(&format!("/service-orders/{id}")).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav(ACTIVE), err)),
        Err(err) => render_detail(&signed, id, Some(err.user_message())).await,
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtensionForm {
    #[serde(default)]
    new_end_date: String,
    #[serde(default)]
    additional_man_days: String,
    #[serde(default)]
    reason: String,
}

impl ExtensionForm {
    fn to_request(&self, order_id: Id) -> Result<NewChangeRequest, ValidationError> {
        let new_end_date = NaiveDate::parse_from_str(self.new_end_date.trim(), "%Y-%m-%d")
            .map_err(|_| ValidationError::new("New end date must be a date (YYYY-MM-DD)"))?;
        let reason = self.reason.trim();
        Ok(NewChangeRequest {
            service_order_id: order_id,
            kind: ChangeRequestKind::Extension,
            reason: (!reason.is_empty()).then(|| reason.to_string()),
            new_specialist_id: None,
            new_end_date: Some(new_end_date),
            additional_man_days: Some(parse_days("Additional man-days", &self.additional_man_days)?),
        })
    }
}

pub async fn extension(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<ExtensionForm>,
) -> Result<Response, PageError> {
    if !signed.roles.can_manage_service_orders() {
        return Err(signed.forbidden(ACTIVE));
    }
    let request = match form.to_request(id) {
        Ok(request) => request,
        Err(err) => return render_detail(&signed, id, Some(err.message)).await,
    };
    match signed.portal.create_change_request(&request).await {
        Ok(cr) => {
            info!(order_id = id, change_request_id = cr.id, "extension requested");
            Ok(Redirect::to(&format!("/service-orders/{id}")).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav(ACTIVE), err)),
        Err(err) => render_detail(&signed, id, Some(err.user_message())).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_form_needs_a_real_date() {
        let form = ExtensionForm {
            new_end_date: "next month".into(),
            additional_man_days: "5".into(),
            reason: String::new(),
        };
        assert!(form.to_request(1).is_err());

        let form = ExtensionForm {
            new_end_date: "2026-12-31".into(),
            additional_man_days: "5".into(),
            reason: " budget approved ".into(),
        };
        let request = form.to_request(9).unwrap();
        assert_eq!(request.kind, ChangeRequestKind::Extension);
        assert_eq!(request.additional_man_days, Some(5.0));
        assert_eq!(request.reason.as_deref(), Some("budget approved"));
    }

    #[test]
    fn substitution_requires_reason() {
        let form = SubstitutionForm {
            new_specialist_id: "3".into(),
            reason: "  ".into(),
        };
        assert_eq!(form.to_request().unwrap_err().message, "Reason is required");
    }
}
