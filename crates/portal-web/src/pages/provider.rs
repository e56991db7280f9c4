use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_core::{require, Provider, ProviderUpdate, ValidationError};
use serde::Deserialize;

use crate::session::SignedIn;
use crate::shell::{render_html, NavContext, OrPage, PageError};

#[derive(Template)]
#[template(path = "provider.html")]
struct ProviderTemplate {
    title: String,
    nav: NavContext,
    provider: ProviderView,
    can_edit: bool,
    form_error: Option<String>,
}

struct ProviderView {
    name: String,
    contact_email: String,
    contact_phone: String,
    address: String,
    website: String,
    preferred_language: String,
    email_notifications: bool,
    sms_notifications: bool,
    users: u32,
    specialists: u32,
    active_orders: u32,
    contracts: u32,
}

impl From<Provider> for ProviderView {
    fn from(p: Provider) -> Self {
        Self {
            name: p.name,
            contact_email: p.contact_email.unwrap_or_default(),
            contact_phone: p.contact_phone.unwrap_or_default(),
            address: p.address.unwrap_or_default(),
            website: p.website.unwrap_or_default(),
            preferred_language: p.preferred_language.unwrap_or_default(),
            email_notifications: p.email_notifications,
            sms_notifications: p.sms_notifications,
            users: p.metrics.users,
            specialists: p.metrics.specialists,
            active_orders: p.metrics.active_orders,
            contracts: p.metrics.contracts,
        }
    }
}

impl ProviderView {
    /// Shows what was typed in place of the stored profile.
    fn overlay(&mut self, form: &ProviderForm) {
        self.name = form.name.clone();
        self.contact_email = form.contact_email.clone();
        self.contact_phone = form.contact_phone.clone();
        self.address = form.address.clone();
        self.website = form.website.clone();
        self.preferred_language = form.preferred_language.clone();
        self.email_notifications = form.email_notifications.is_some();
        self.sms_notifications = form.sms_notifications.is_some();
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    contact_email: String,
    #[serde(default)]
    contact_phone: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    preferred_language: String,
    /// Checkboxes are only posted when ticked.
    #[serde(default)]
    email_notifications: Option<String>,
    #[serde(default)]
    sms_notifications: Option<String>,
}

impl ProviderForm {
    fn to_update(&self) -> Result<ProviderUpdate, ValidationError> {
        let name = require("Company name", &self.name)?;
        let contact_email = self.contact_email.trim().to_string();
        if !contact_email.is_empty() && !contact_email.contains('@') {
            return Err(ValidationError::new("Invalid email format"));
        }
        Ok(ProviderUpdate {
            name: Some(name),
            contact_email: Some(contact_email),
            contact_phone: Some(self.contact_phone.trim().to_string()),
            address: Some(self.address.trim().to_string()),
            website: Some(self.website.trim().to_string()),
            preferred_language: Some(self.preferred_language.trim().to_string()),
            email_notifications: Some(self.email_notifications.is_some()),
            sms_notifications: Some(self.sms_notifications.is_some()),
        })
    }
}

async fn render(
    signed: &SignedIn,
    submitted: Option<&ProviderForm>,
    form_error: Option<String>,
) -> Result<Response, PageError> {
    let nav = signed.nav("/provider");
    let mut provider: ProviderView = signed.portal.my_provider().await.or_page(&nav)?.into();
    if let Some(form) = submitted {
        provider.overlay(form);
    }
    let status = if form_error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let mut resp = render_html(ProviderTemplate {
        title: "Provider Profile".to_string(),
        nav,
        provider,
        can_edit: signed.roles.can_edit_provider(),
        form_error,
    });
    *resp.status_mut() = status;
    Ok(resp)
}

pub async fn show(signed: SignedIn) -> Result<Response, PageError> {
    render(&signed, None, None).await
}

pub async fn update(signed: SignedIn, Form(form): Form<ProviderForm>) -> Result<Response, PageError> {
    if !signed.roles.can_edit_provider() {
        return Err(signed.forbidden("/provider"));
    }
    let update = match form.to_update() {
        Ok(update) => update,
        Err(err) => return render(&signed, Some(&form), Some(err.message)).await,
    };
    match signed.portal.update_my_provider(&update).await {
        Ok(_) => Ok(Redirect::to("/provider").into_response()),
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav("/provider"), err)),
        Err(err) => render(&signed, Some(&form), Some(err.user_message())).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ProviderMetrics;

    fn form(name: &str, email: &str) -> ProviderForm {
        ProviderForm {
            name: name.into(),
            contact_email: email.into(),
            website: " https://acme.example ".into(),
            email_notifications: Some("on".into()),
            ..ProviderForm::default()
        }
    }

    #[test]
    fn update_is_trimmed_and_checkboxes_become_flags() {
        let update = form(" Acme ", "ops@acme.example").to_update().unwrap();
        assert_eq!(update.name.as_deref(), Some("Acme"));
        assert_eq!(update.website.as_deref(), Some("https://acme.example"));
        assert_eq!(update.email_notifications, Some(true));
        assert_eq!(update.sms_notifications, Some(false));
    }

    #[test]
    fn missing_name_and_bad_email_are_rejected() {
        assert_eq!(
            form("  ", "ops@acme.example").to_update().unwrap_err(),
            ValidationError::new("Company name is required")
        );
        assert_eq!(
            form("Acme", "ops.acme.example").to_update().unwrap_err().message,
            "Invalid email format"
        );
    }

    #[test]
    fn overlay_keeps_metrics() {
        let mut view = ProviderView::from(Provider {
            id: 1,
            name: "Stored".into(),
            contact_email: Some("stored@acme.example".into()),
            contact_phone: None,
            address: None,
            website: None,
            preferred_language: None,
            email_notifications: false,
            sms_notifications: true,
            metrics: ProviderMetrics {
                users: 12,
                ..ProviderMetrics::default()
            },
        });
        view.overlay(&form("", "typed@acme.example"));
        assert_eq!(view.name, "");
        assert_eq!(view.contact_email, "typed@acme.example");
        assert!(view.email_notifications);
        assert!(!view.sms_notifications);
        assert_eq!(view.users, 12);
    }
}
