use askama::Template;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_core::{
    format_optional_eur, matches_query, matches_status, validation::parse_optional_amount, Contract,
    ContractOffer, ContractOfferStatus, ContractStatus, Id, NewContractOffer,
};
use serde::Deserialize;
use tracing::info;

use crate::session::SignedIn;
use crate::shell::{display_date, display_timestamp, render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/contracts";

#[derive(Debug, Deserialize, Default)]
pub struct ContractsQuery {
    #[serde(default)]
    status: String,
    #[serde(default)]
    q: String,
}

struct ContractRow {
    id: Id,
    title: String,
    client: String,
    status: String,
    valid_from: String,
    valid_until: String,
    max_daily_rate: String,
}

impl From<&Contract> for ContractRow {
    fn from(c: &Contract) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            client: c.client.clone().unwrap_or_default(),
            status: c.status.label().to_string(),
            valid_from: display_date(c.valid_from),
            valid_until: display_date(c.valid_until),
            max_daily_rate: format_optional_eur(c.max_daily_rate),
        }
    }
}

struct StatusOption {
    value: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "contracts.html")]
struct ContractsTemplate {
    title: String,
    nav: NavContext,
    contracts: Vec<ContractRow>,
    statuses: Vec<StatusOption>,
    query: String,
}

/// Text shown for one negotiation offer. `rate` is `None` when no daily rate was proposed.
struct OfferRow {
    id: Id,
    status: String,
    rate: Option<String>,
    notes: String,
    created_at: String,
}

impl From<&ContractOffer> for OfferRow {
    fn from(o: &ContractOffer) -> Self {
        Self {
            id: o.id,
            status: o.status.label().to_string(),
            rate: o.proposed_daily_rate.map(portal_core::format_eur),
            notes: o.notes.clone().unwrap_or_default(),
            created_at: display_timestamp(o.created_at),
        }
    }
}

struct VersionRow {
    version: u32,
    changed_at: String,
    summary: String,
}

#[derive(Template)]
#[template(path = "contract_detail.html")]
struct ContractDetailTemplate {
    title: String,
    nav: NavContext,
    contract: ContractRow,
    allowed_request_types: String,
    versions: Vec<VersionRow>,
    offers: Vec<OfferRow>,
    can_offer: bool,
    form_error: Option<String>,
    form_rate: String,
    form_notes: String,
}

pub async fn list(signed: SignedIn, Query(query): Query<ContractsQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_contracts() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut contracts = signed.portal.list_contracts().await.or_page(&nav)?;
    contracts.retain(|c| {
        matches_status(&query.status, c.status.label())
            && matches_query(
                &query.q,
                [c.title.as_str(), c.client.as_deref().unwrap_or_default()],
            )
    });
    contracts.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));

    let statuses = ContractStatus::KNOWN
        .iter()
        .map(|s| StatusOption {
            value: s.label().to_string(),
            selected: portal_core::normalize_label(&query.status) == portal_core::normalize_label(s.label()),
        })
        .collect();

    Ok(render_html(ContractsTemplate {
        title: "Contracts".to_string(),
        nav,
        contracts: contracts.iter().map(ContractRow::from).collect(),
        statuses,
        query: query.q,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ContractOfferForm {
    #[serde(default)]
    proposed_daily_rate: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    action: String,
}

async fn render_detail(
    signed: &SignedIn,
    id: Id,
    form: ContractOfferForm,
    form_error: Option<String>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_contracts() {
        return Err(signed.forbidden(ACTIVE));
    }
    let contract = signed.portal.get_contract(id).await.or_page(&nav)?;
    let offers = signed.portal.list_contract_offers(id).await.or_page(&nav)?;

    let status = if form_error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let mut resp = render_html(ContractDetailTemplate {
        title: contract.title.clone(),
        nav,
        allowed_request_types: contract.allowed_request_types.join(", "),
        versions: contract
            .versions
            .iter()
            .map(|v| VersionRow {
                version: v.version,
                changed_at: display_timestamp(v.changed_at),
                summary: v.summary.clone(),
            })
            .collect(),
        offers: offers.iter().map(OfferRow::from).collect(),
        can_offer: signed.roles.can_negotiate_contracts() && contract.status.accepts_offers(),
        contract: ContractRow::from(&contract),
        form_error,
        form_rate: form.proposed_daily_rate,
        form_notes: form.notes,
    });
    *resp.status_mut() = status;
    Ok(resp)
}

pub async fn detail(signed: SignedIn, Path(id): Path<Id>) -> Result<Response, PageError> {
    render_detail(&signed, id, ContractOfferForm::default(), None).await
}

pub async fn create_offer(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<ContractOfferForm>,
) -> Result<Response, PageError> {
    if !signed.roles.can_negotiate_contracts() {
        return Err(signed.forbidden(ACTIVE));
    }
    let rate = match parse_optional_amount("Proposed daily rate", &form.proposed_daily_rate) {
        Ok(rate) => rate,
        Err(err) => return render_detail(&signed, id, form, Some(err.message)).await,
    };
    let notes = form.notes.trim();
    let offer = NewContractOffer {
        proposed_daily_rate: rate,
        notes: (!notes.is_empty()).then(|| notes.to_string()),
        status: if form.action == "draft" {
            ContractOfferStatus::Draft
        } else {
            ContractOfferStatus::Submitted
        },
    };
    match signed.portal.create_contract_offer(id, &offer).await {
        Ok(created) => {
            info!(contract_id = id, offer_id = created.id, status = %created.status, "contract offer created");
            Ok(Redirect::to(&format!("/contracts/{id}")).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav(ACTIVE), err)),
        Err(err) => render_detail(&signed, id, form, Some(err.user_message())).await,
    }
}
