use askama::Template;
use axum::{
    extract::{Path, Query},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_core::{
    format_optional_eur, format_percent, matches_query, matches_status, Id, ServiceOffer,
    ServiceOfferStatus,
};
use serde::Deserialize;
use tracing::info;

use crate::session::SignedIn;
use crate::shell::{display_timestamp, render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/service-offers";

#[derive(Debug, Deserialize, Default)]
pub struct OffersQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    status: String,
}

struct OfferRow {
    id: Id,
    service_request_id: Id,
    specialist: String,
    daily_rate: String,
    total_cost: String,
    status: String,
    submitted_at: String,
}

impl From<&ServiceOffer> for OfferRow {
    fn from(o: &ServiceOffer) -> Self {
        Self {
            id: o.id,
            service_request_id: o.service_request_id,
            specialist: specialist_label(o),
            daily_rate: portal_core::format_eur(o.daily_rate),
            total_cost: format_optional_eur(o.total_cost),
            status: o.status.label().to_string(),
            submitted_at: display_timestamp(o.submitted_at),
        }
    }
}

fn specialist_label(o: &ServiceOffer) -> String {
    match (&o.specialist_name, o.specialist_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("Specialist #{id}"),
        (None, None) => "Unassigned".to_string(),
    }
}

#[derive(Template)]
#[template(path = "service_offers.html")]
struct OffersTemplate {
    title: String,
    nav: NavContext,
    offers: Vec<OfferRow>,
    query: String,
    status: String,
}

struct TransitionButton {
    value: String,
    label: String,
}

#[derive(Template)]
#[template(path = "service_offer_detail.html")]
struct OfferDetailTemplate {
    title: String,
    nav: NavContext,
    offer: OfferRow,
    total_man_days: f64,
    onsite_days: f64,
    travel_cost: String,
    must_have_match: String,
    nice_to_have_match: String,
    transitions: Vec<TransitionButton>,
}

pub async fn list(signed: SignedIn, Query(query): Query<OffersQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_submit_offers() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut offers = signed.portal.list_service_offers().await.or_page(&nav)?;
    offers.retain(|o| {
        matches_status(&query.status, o.status.label())
            && matches_query(&query.q, [specialist_label(o).as_str()])
    });
    offers.sort_by(|a, b| b.id.cmp(&a.id));

    Ok(render_html(OffersTemplate {
        title: "Service Offers".to_string(),
        nav,
        offers: offers.iter().map(OfferRow::from).collect(),
        query: query.q,
        status: query.status,
    }))
}

fn transition_label(status: &ServiceOfferStatus) -> String {
    match status {
        ServiceOfferStatus::Submitted => "Submit".to_string(),
        ServiceOfferStatus::Withdrawn => "Withdraw".to_string(),
        other => other.label().to_string(),
    }
}

pub async fn detail(signed: SignedIn, Path(id): Path<Id>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_submit_offers() {
        return Err(signed.forbidden(ACTIVE));
    }
    let offer = signed.portal.get_service_offer(id).await.or_page(&nav)?;
    let transitions = offer
        .status
        .provider_transitions()
        .iter()
        .map(|s| TransitionButton {
            value: s.label().to_string(),
            label: transition_label(s),
        })
        .collect();

    Ok(render_html(OfferDetailTemplate {
        title: format!("Offer #{}", offer.id),
        nav,
        total_man_days: offer.total_man_days,
        onsite_days: offer.onsite_days,
        travel_cost: portal_core::format_eur(offer.travel_cost_per_onsite_day),
        must_have_match: format_percent(offer.must_have_match),
        nice_to_have_match: format_percent(offer.nice_to_have_match),
        transitions,
        offer: OfferRow::from(&offer),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    status: String,
}

pub async fn change_status(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<StatusForm>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_submit_offers() {
        return Err(signed.forbidden(ACTIVE));
    }
    let next = ServiceOfferStatus::parse(&form.status);
    let current = signed.portal.get_service_offer(id).await.or_page(&nav)?;
    if !current.status.can_transition_to(&next) {
        return Err(PageError::api(
            nav,
            portal_core::ValidationError::new(format!(
                "Cannot change an offer from {} to {}",
                current.status, next
            ))
            .into(),
        ));
    }
    signed
        .portal
        .update_service_offer_status(id, next.clone())
        .await
        .or_page(&nav)?;
    info!(offer_id = id, status = %next, "service offer status changed");
    Ok(Redirect::to(&format!("/service-offers/{id}")).into_response())
}
