use askama::Template;
use axum::response::Response;
use chrono::Utc;
use portal_core::BiddingPhase;

use crate::session::SignedIn;
use crate::shell::{render_html, NavContext, OrPage, PageError};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    title: String,
    nav: NavContext,
    provider_name: String,
    users: u32,
    specialists: u32,
    active_orders: u32,
    contracts: u32,
    open_requests: Option<usize>,
    specialist_only: bool,
}

pub async fn index(signed: SignedIn) -> Result<Response, PageError> {
    let nav = signed.nav("/");
    let provider = signed.portal.my_provider().await.or_page(&nav)?;

    let open_requests = if signed.roles.can_view_service_requests() {
        let now = Utc::now();
        let requests = signed.portal.list_service_requests().await.or_page(&nav)?;
        Some(
            requests
                .iter()
                .filter(|r| r.bidding_phase(now) == BiddingPhase::Open)
                .count(),
        )
    } else {
        None
    };

    Ok(render_html(DashboardTemplate {
        title: format!("Welcome, {}", signed.user.display_name()),
        nav,
        provider_name: provider.name,
        users: provider.metrics.users,
        specialists: provider.metrics.specialists,
        active_orders: provider.metrics.active_orders,
        contracts: provider.metrics.contracts,
        open_requests,
        specialist_only: signed.roles.is_specialist_only(),
    }))
}
