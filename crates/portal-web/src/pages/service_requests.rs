use askama::Template;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::{DateTime, Utc};
use portal_core::{
    format_countdown, format_eur, format_percent, matches_query, matches_status, parse_amount,
    parse_days, parse_id, BiddingPhase, Criterion, Id, NewServiceOffer, OfferCost, ServiceOfferStatus,
    ServiceRequest, Specialist, ValidationError,
};
use serde::Deserialize;
use tracing::info;

use crate::session::SignedIn;
use crate::shell::{display_date, display_opt, render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/service-requests";

#[derive(Debug, Deserialize, Default)]
pub struct RequestsQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    sort: String,
}

struct RequestRow {
    id: Id,
    title: String,
    role_name: String,
    status: String,
    location: String,
    countdown: String,
    bidding_open: bool,
}

fn phase_text(request: &ServiceRequest, now: DateTime<Utc>) -> String {
    match request.bidding_phase(now) {
        BiddingPhase::NotOpen => match request.bidding_start_at {
            Some(start) => format!("Opens {}", start.format("%Y-%m-%d %H:%M")),
            None => "Not open".to_string(),
        },
        BiddingPhase::Open => match request.bidding_end_at {
            Some(end) => format_countdown(end, now),
            None => "Open".to_string(),
        },
        BiddingPhase::Closed => "Closed".to_string(),
    }
}

impl RequestRow {
    fn new(r: &ServiceRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: r.id,
            title: r.title.clone(),
            role_name: r.role_name.clone().unwrap_or_default(),
            status: r.status.label().to_string(),
            location: r.location.clone().unwrap_or_default(),
            countdown: phase_text(r, now),
            bidding_open: r.bidding_phase(now) == BiddingPhase::Open,
        }
    }
}

#[derive(Template)]
#[template(path = "service_requests.html")]
struct RequestsTemplate {
    title: String,
    nav: NavContext,
    requests: Vec<RequestRow>,
    query: String,
    status: String,
    sort: String,
    can_sync: bool,
}

/// Open requests first, soonest deadline first.
fn sort_requests(requests: &mut [ServiceRequest], sort: &str, now: DateTime<Utc>) {
    match sort {
        "title" => requests.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        _ => requests.sort_by_key(|r| {
            let open = r.bidding_phase(now) == BiddingPhase::Open;
            (!open, r.bidding_end_at.unwrap_or(DateTime::<Utc>::MAX_UTC))
        }),
    }
}

pub async fn list(signed: SignedIn, Query(query): Query<RequestsQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_service_requests() {
        return Err(signed.forbidden(ACTIVE));
    }
    let now = Utc::now();
    let mut requests = signed.portal.list_service_requests().await.or_page(&nav)?;
    requests.retain(|r| {
        matches_status(&query.status, r.status.label())
            && matches_query(
                &query.q,
                [
                    r.title.as_str(),
                    r.role_name.as_deref().unwrap_or_default(),
                    r.location.as_deref().unwrap_or_default(),
                ],
            )
    });
    sort_requests(&mut requests, &query.sort, now);

    Ok(render_html(RequestsTemplate {
        title: "Service Requests".to_string(),
        nav,
        requests: requests.iter().map(|r| RequestRow::new(r, now)).collect(),
        query: query.q,
        status: query.status,
        sort: query.sort,
        can_sync: signed.roles.can_sync_service_requests(),
    }))
}

pub async fn sync(signed: SignedIn) -> Result<Response, PageError> {
    if !signed.roles.can_sync_service_requests() {
        return Err(signed.forbidden(ACTIVE));
    }
    let nav = signed.nav(ACTIVE);
    let summary = signed.portal.sync_service_requests().await.or_page(&nav)?;
    info!(%summary, "service requests synced");
    Ok(Redirect::to(ACTIVE).into_response())
}

struct CriterionRow {
    name: String,
    weight: u32,
}

fn criterion_rows(list: &[Criterion]) -> Vec<CriterionRow> {
    list.iter()
        .map(|c| CriterionRow {
            name: c.name.clone(),
            weight: c.weight,
        })
        .collect()
}

struct SpecialistOption {
    id: Id,
    name: String,
    day_rate: String,
    match_score: String,
    selected: bool,
}

fn specialist_options(specialists: &[Specialist], selected: &str) -> Vec<SpecialistOption> {
    specialists
        .iter()
        .map(|s| SpecialistOption {
            id: s.id,
            name: s.name.clone(),
            day_rate: s.day_rate.map(format_eur).unwrap_or_default(),
            match_score: format_percent(s.match_score),
            selected: selected.trim() == s.id.to_string(),
        })
        .collect()
}

#[derive(Debug, Deserialize, Default)]
pub struct OfferForm {
    #[serde(default)]
    specialist_id: String,
    #[serde(default)]
    daily_rate: String,
    #[serde(default)]
    travel_cost_per_onsite_day: String,
    #[serde(default)]
    total_man_days: String,
    #[serde(default)]
    onsite_days: String,
    #[serde(default)]
    action: String,
}

impl OfferForm {
    fn prefilled(request: &ServiceRequest) -> Self {
        Self {
            total_man_days: display_number(request.total_man_days),
            onsite_days: display_number(request.onsite_days),
            travel_cost_per_onsite_day: "0".to_string(),
            ..Self::default()
        }
    }

    fn cost(&self) -> Result<OfferCost, ValidationError> {
        Ok(OfferCost {
            daily_rate: parse_amount("Daily rate", &self.daily_rate)?,
            total_man_days: parse_days("Total man-days", &self.total_man_days)?,
            travel_cost_per_onsite_day: parse_amount(
                "Travel cost per onsite day",
                &self.travel_cost_per_onsite_day,
            )?,
            onsite_days: parse_days("Onsite days", &self.onsite_days)?,
        })
    }

    /// Builds the offer payload; the total is computed here before submission.
    fn to_offer(&self, request_id: Id) -> Result<NewServiceOffer, ValidationError> {
        let specialist_id = parse_id("Specialist", &self.specialist_id)?;
        let cost = self.cost()?;
        if cost.onsite_days > cost.total_man_days {
            return Err(ValidationError::new(
                "Onsite days cannot exceed total man-days",
            ));
        }
        Ok(NewServiceOffer {
            service_request_id: request_id,
            specialist_id,
            daily_rate: cost.daily_rate,
            travel_cost_per_onsite_day: cost.travel_cost_per_onsite_day,
            total_man_days: cost.total_man_days,
            onsite_days: cost.onsite_days,
            total_cost: cost.total(),
            status: if self.action == "draft" {
                ServiceOfferStatus::Draft
            } else {
                ServiceOfferStatus::Submitted
            },
        })
    }
}

fn display_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Template)]
#[template(path = "service_request_detail.html")]
struct RequestDetailTemplate {
    title: String,
    nav: NavContext,
    request_id: Id,
    role_name: String,
    status: String,
    countdown: String,
    period: String,
    total_man_days: String,
    onsite_days: String,
    location: String,
    contract_id: Option<Id>,
    must_have: Vec<CriterionRow>,
    nice_to_have: Vec<CriterionRow>,
    languages: Vec<String>,
    suggestions: Vec<SpecialistOption>,
    can_offer: bool,
    form: OfferForm,
    estimated_total: Option<String>,
    form_error: Option<String>,
}

async fn render_detail(
    signed: &SignedIn,
    id: Id,
    form: Option<OfferForm>,
    form_error: Option<String>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_service_requests() {
        return Err(signed.forbidden(ACTIVE));
    }
    let now = Utc::now();
    let request = signed.portal.get_service_request(id).await.or_page(&nav)?;
    let can_offer =
        signed.roles.can_submit_offers() && request.bidding_phase(now) == BiddingPhase::Open;

    let mut specialists = signed.portal.suggested_specialists(id).await.or_page(&nav)?;
    if specialists.is_empty() && can_offer {
        specialists = signed.portal.list_specialists().await.or_page(&nav)?;
    }

    let form = form.unwrap_or_else(|| OfferForm::prefilled(&request));
    let estimated_total = form.cost().ok().map(|c| format_eur(c.total()));

    let status = if form_error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let mut resp = render_html(RequestDetailTemplate {
        title: request.title.clone(),
        nav,
        request_id: request.id,
        role_name: request.role_name.clone().unwrap_or_default(),
        status: request.status.label().to_string(),
        countdown: phase_text(&request, now),
        period: format!(
            "{} to {}",
            display_date(request.start_date),
            display_date(request.end_date)
        ),
        total_man_days: display_opt(request.total_man_days),
        onsite_days: display_opt(request.onsite_days),
        location: request.location.clone().unwrap_or_default(),
        contract_id: request.contract_id,
        must_have: criterion_rows(&request.must_have_criteria),
        nice_to_have: criterion_rows(&request.nice_to_have_criteria),
        languages: request
            .languages
            .iter()
            .map(|l| match &l.level {
                Some(level) => format!("{} ({})", l.language, level),
                None => l.language.clone(),
            })
            .collect(),
        suggestions: specialist_options(&specialists, &form.specialist_id),
        can_offer,
        form,
        estimated_total,
        form_error,
    });
    *resp.status_mut() = status;
    Ok(resp)
}

pub async fn detail(signed: SignedIn, Path(id): Path<Id>) -> Result<Response, PageError> {
    render_detail(&signed, id, None, None).await
}

pub async fn create_offer(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<OfferForm>,
) -> Result<Response, PageError> {
    if !signed.roles.can_submit_offers() {
        return Err(signed.forbidden(ACTIVE));
    }
    let offer = match form.to_offer(id) {
        Ok(offer) => offer,
        Err(err) => return render_detail(&signed, id, Some(form), Some(err.message)).await,
    };
    match signed.portal.create_service_offer(&offer).await {
        Ok(created) => {
            info!(offer_id = created.id, total = offer.total_cost, "service offer created");
            Ok(Redirect::to(&format!("/service-offers/{}", created.id)).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav(ACTIVE), err)),
        Err(err) => render_detail(&signed, id, Some(form), Some(err.user_message())).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_form_computes_total_before_submission() {
        let form = OfferForm {
            specialist_id: "4".into(),
            daily_rate: "850".into(),
            travel_cost_per_onsite_day: "50".into(),
            total_man_days: "10".into(),
            onsite_days: "3".into(),
            action: String::new(),
        };
        let offer = form.to_offer(12).unwrap();
        assert_eq!(offer.total_cost, 8650.0);
        assert_eq!(offer.status, ServiceOfferStatus::Submitted);
    }

    #[test]
    fn offer_form_rejects_bad_numbers_and_missing_specialist() {
        let mut form = OfferForm {
            specialist_id: String::new(),
            daily_rate: "850".into(),
            travel_cost_per_onsite_day: "0".into(),
            total_man_days: "10".into(),
            onsite_days: "2".into(),
            action: "draft".into(),
        };
        assert_eq!(form.to_offer(1).unwrap_err().message, "Specialist is required");
        form.specialist_id = "4".into();
        form.daily_rate = "lots".into();
        assert_eq!(form.to_offer(1).unwrap_err().message, "Daily rate must be a number");
        form.daily_rate = "850".into();
        form.onsite_days = "11".into();
        assert!(form.to_offer(1).is_err());
        form.onsite_days = "2".into();
        assert_eq!(form.to_offer(1).unwrap().status, ServiceOfferStatus::Draft);
    }
}
