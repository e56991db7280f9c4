use askama::Template;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use portal_core::{
    format_optional_eur, matches_query, parse_optional_amount, Id, Role, SpecialistProfile, User,
    UserUpdate, ValidationError,
};
use serde::Deserialize;
use tracing::info;

use crate::session::SignedIn;
use crate::shell::{render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/users";
const ACTIVE_ME: &str = "/me";

#[derive(Debug, Deserialize, Default)]
pub struct UsersQuery {
    #[serde(default)]
    q: String,
}

struct UserRow {
    id: Id,
    name: String,
    email: String,
    roles: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        let roles = u.role_set();
        Self {
            id: u.id,
            name: u.display_name(),
            email: u.email.clone(),
            roles: if roles.is_empty() {
                "No role".to_string()
            } else {
                roles.labels().join(", ")
            },
        }
    }
}

#[derive(Template)]
#[template(path = "users.html")]
struct UsersTemplate {
    title: String,
    nav: NavContext,
    users: Vec<UserRow>,
    query: String,
}

pub async fn list(signed: SignedIn, Query(query): Query<UsersQuery>) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_manage_users() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut users = signed.portal.list_users().await.or_page(&nav)?;
    users.retain(|u| {
        matches_query(
            &query.q,
            [u.email.as_str(), u.first_name.as_str(), u.last_name.as_str()],
        )
    });
    users.sort_by_key(|u| u.display_name().to_lowercase());

    Ok(render_html(UsersTemplate {
        title: "Users & Roles".to_string(),
        nav,
        users: users.iter().map(UserRow::from).collect(),
        query: query.q,
    }))
}

struct RoleOption {
    value: String,
    selected: bool,
}

/// Profile form values; specialist fields are shown only for specialists.
#[derive(Debug, Deserialize, Default)]
pub struct ProfileForm {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    experience_level: String,
    #[serde(default)]
    technology_level: String,
    #[serde(default)]
    performance_grade: String,
    #[serde(default)]
    day_rate: String,
    #[serde(default)]
    skills: String,
    #[serde(default)]
    availability: String,
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ProfileForm {
    fn prefilled(user: &User) -> Self {
        let profile = user.profile.clone().unwrap_or_default();
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            experience_level: profile.experience_level.unwrap_or_default(),
            technology_level: profile.technology_level.unwrap_or_default(),
            performance_grade: profile.performance_grade.unwrap_or_default(),
            day_rate: profile.day_rate.map(|r| r.to_string()).unwrap_or_default(),
            skills: profile.skills.join(", "),
            availability: profile.availability.unwrap_or_default(),
        }
    }

    fn to_update(&self, include_profile: bool) -> Result<UserUpdate, ValidationError> {
        let profile = if include_profile {
            Some(SpecialistProfile {
                experience_level: non_empty(&self.experience_level),
                technology_level: non_empty(&self.technology_level),
                performance_grade: non_empty(&self.performance_grade),
                day_rate: parse_optional_amount("Day rate", &self.day_rate)?,
                skills: self
                    .skills
                    .split(',')
                    .filter_map(non_empty)
                    .collect(),
                availability: non_empty(&self.availability),
            })
        } else {
            None
        };
        Ok(UserUpdate {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            profile,
        })
    }
}

#[derive(Template)]
#[template(path = "user_profile.html")]
struct ProfileTemplate {
    title: String,
    nav: NavContext,
    user: UserRow,
    is_specialist: bool,
    day_rate: String,
    form: ProfileForm,
    can_change_role: bool,
    role_options: Vec<RoleOption>,
    form_error: Option<String>,
}

fn active_for(signed: &SignedIn, id: Id) -> &'static str {
    if signed.user.id == id {
        ACTIVE_ME
    } else {
        ACTIVE
    }
}

/// Admins may open any profile; everyone else only their own.
fn may_open(signed: &SignedIn, id: Id) -> bool {
    signed.user.id == id || signed.roles.can_manage_users()
}

async fn render_profile(
    signed: &SignedIn,
    id: Id,
    submitted: Option<ProfileForm>,
    form_error: Option<String>,
) -> Result<Response, PageError> {
    let active = active_for(signed, id);
    let nav = signed.nav(active);
    if !may_open(signed, id) {
        return Err(signed.forbidden(active));
    }
    let user = signed.portal.get_user(id).await.or_page(&nav)?;
    let roles = user.role_set();
    let primary = user.role.clone().or_else(|| roles.iter().next().cloned());
    let role_options = Role::KNOWN
        .iter()
        .map(|r| RoleOption {
            value: r.label().to_string(),
            selected: primary.as_ref() == Some(r),
        })
        .collect();

    let status = if form_error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let mut resp = render_html(ProfileTemplate {
        title: user.display_name(),
        nav,
        is_specialist: roles.has_role(&Role::Specialist),
        day_rate: format_optional_eur(user.profile.as_ref().and_then(|p| p.day_rate)),
        form: submitted.unwrap_or_else(|| ProfileForm::prefilled(&user)),
        can_change_role: signed.roles.can_manage_users(),
        role_options,
        user: UserRow::from(&user),
        form_error,
    });
    *resp.status_mut() = status;
    Ok(resp)
}

pub async fn profile(signed: SignedIn, Path(id): Path<Id>) -> Result<Response, PageError> {
    render_profile(&signed, id, None, None).await
}

pub async fn update_profile(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, PageError> {
    let active = active_for(&signed, id);
    let nav = signed.nav(active);
    if !may_open(&signed, id) {
        return Err(signed.forbidden(active));
    }
    let target = signed.portal.get_user(id).await.or_page(&nav)?;
    let update = match form.to_update(target.role_set().has_role(&Role::Specialist)) {
        Ok(update) => update,
        Err(err) => return render_profile(&signed, id, Some(form), Some(err.message)).await,
    };
    match signed.portal.update_user(id, &update).await {
        Ok(_) => {
            info!(user_id = id, "profile updated");
            if id == signed.user.id {
                signed.portal.me().await.or_page(&nav)?;
            }
            Ok(Redirect::to(&format!("/users/{id}")).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(nav, err)),
        Err(err) => render_profile(&signed, id, Some(form), Some(err.user_message())).await,
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(default)]
    role: String,
}

pub async fn change_role(
    signed: SignedIn,
    Path(id): Path<Id>,
    Form(form): Form<RoleForm>,
) -> Result<Response, PageError> {
    if !signed.roles.can_manage_users() {
        return Err(signed.forbidden(ACTIVE));
    }
    let role = Role::parse(&form.role);
    if let Role::Other(raw) = &role {
        let message = format!("Unknown role: {raw}");
        return render_profile(&signed, id, None, Some(message)).await;
    }
    match signed.portal.update_user_role(id, role).await {
        Ok(user) => {
            info!(user_id = id, roles = ?user.role_set().labels(), "role changed");
            if id == signed.user.id {
                let nav = signed.nav(ACTIVE_ME);
                signed.portal.me().await.or_page(&nav)?;
            }
            Ok(Redirect::to(&format!("/users/{id}")).into_response())
        }
        Err(err) if err.is_session_expired() => Err(PageError::api(signed.nav(ACTIVE), err)),
        Err(err) => render_profile(&signed, id, None, Some(err.user_message())).await,
    }
}

pub async fn me(signed: SignedIn) -> Response {
    Redirect::to(&format!("/users/{}", signed.user.id)).into_response()
}
