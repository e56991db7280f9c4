use askama::Template;
use axum::{extract::Query, response::Response};
use portal_core::{format_optional_eur, format_percent, Specialist};
use serde::Deserialize;

use crate::session::SignedIn;
use crate::shell::{render_html, NavContext, OrPage, PageError};

const ACTIVE: &str = "/specialists";

#[derive(Debug, Deserialize, Default)]
pub struct SpecialistsQuery {
    #[serde(default)]
    q: String,
}

struct SpecialistRow {
    id: i64,
    name: String,
    email: String,
    experience: String,
    technology: String,
    grade: String,
    day_rate: String,
    skills: String,
    availability: String,
    match_score: String,
}

impl From<&Specialist> for SpecialistRow {
    fn from(s: &Specialist) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            email: s.email.clone().unwrap_or_default(),
            experience: s.experience_level.clone().unwrap_or_default(),
            technology: s.technology_level.clone().unwrap_or_default(),
            grade: s.performance_grade.clone().unwrap_or_default(),
            day_rate: format_optional_eur(s.day_rate),
            skills: s.skills.join(", "),
            availability: s.availability.clone().unwrap_or_default(),
            match_score: format_percent(s.match_score),
        }
    }
}

#[derive(Template)]
#[template(path = "specialists.html")]
struct SpecialistsTemplate {
    title: String,
    nav: NavContext,
    specialists: Vec<SpecialistRow>,
    query: String,
}

/// Case-insensitive match against the name or any single skill.
fn matches(specialist: &Specialist, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty()
        || specialist.name.to_lowercase().contains(&needle)
        || specialist
            .skills
            .iter()
            .any(|skill| skill.to_lowercase().contains(&needle))
}

pub async fn list(
    signed: SignedIn,
    Query(query): Query<SpecialistsQuery>,
) -> Result<Response, PageError> {
    let nav = signed.nav(ACTIVE);
    if !signed.roles.can_view_specialists() {
        return Err(signed.forbidden(ACTIVE));
    }
    let mut specialists = signed.portal.list_specialists().await.or_page(&nav)?;
    specialists.retain(|s| matches(s, &query.q));
    specialists.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    Ok(render_html(SpecialistsTemplate {
        title: "Specialists".to_string(),
        nav,
        specialists: specialists.iter().map(SpecialistRow::from).collect(),
        query: query.q,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specialist(name: &str, skills: &[&str]) -> Specialist {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": name,
            "skills": skills,
        }))
        .unwrap()
    }

    #[test]
    fn search_covers_name_and_skills() {
        let ana = specialist("Ana Novak", &["Rust", "Kubernetes"]);
        assert!(matches(&ana, ""));
        assert!(matches(&ana, "novak"));
        assert!(matches(&ana, "KUBER"));
        assert!(!matches(&ana, "java"));
    }
}
