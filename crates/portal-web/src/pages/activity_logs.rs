use std::collections::BTreeSet;

use askama::Template;
use axum::{extract::Query, response::Response};
use portal_core::{matches_query, ActivityLog};
use serde::Deserialize;

use crate::session::SignedIn;
use crate::shell::{render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/activity-logs";

#[derive(Debug, Deserialize, Default)]
pub struct LogQuery {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    q: String,
}

struct LogRow {
    at: String,
    actor: String,
    event_type: String,
    entity: String,
    message: String,
}

impl From<&ActivityLog> for LogRow {
    fn from(log: &ActivityLog) -> Self {
        let entity = match (&log.entity_type, log.entity_id) {
            (Some(kind), Some(id)) => format!("{kind} #{id}"),
            (Some(kind), None) => kind.clone(),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => String::new(),
        };
        Self {
            at: log.created_at.format("%Y-%m-%d %H:%M").to_string(),
            actor: log.actor.clone().unwrap_or_else(|| "System".to_string()),
            event_type: log.event_type.clone(),
            entity,
            message: log.message.clone(),
        }
    }
}

struct EventOption {
    value: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "activity_logs.html")]
struct ActivityLogTemplate {
    title: String,
    nav: NavContext,
    logs: Vec<LogRow>,
    event_types: Vec<EventOption>,
    query: String,
}

pub async fn list(signed: SignedIn, Query(query): Query<LogQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_activity_log() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut logs = signed.portal.list_activity_logs().await.or_page(&nav)?;

    let wanted = query.event_type.trim();
    let event_types = logs
        .iter()
        .map(|l| l.event_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|value| EventOption {
            selected: value == wanted,
            value,
        })
        .collect();

    logs.retain(|l| {
        (wanted.is_empty() || l.event_type == wanted)
            && matches_query(&query.q, [l.message.as_str(), l.actor.as_deref().unwrap_or_default()])
    });
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    Ok(render_html(ActivityLogTemplate {
        title: "Activity Log".to_string(),
        nav,
        logs: logs.iter().map(LogRow::from).collect(),
        event_types,
        query: query.q,
    }))
}
