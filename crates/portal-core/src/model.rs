//! Backend records as the portal reads and writes them.
//!
//! Records use the backend's camelCase field names. A few fields the backend
//! names in snake_case (`daily_rate`, `total_cost`) carry explicit renames.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::{Role, RoleSet};

pub type Id = i64;

label_enum! {
    pub enum ContractStatus {
        Draft => "Draft",
        Published => "Published",
        InNegotiation => "In Negotiation",
        Awarded => "Awarded",
        Active => "Active",
        Expired => "Expired",
    }
}

impl ContractStatus {
    /// Negotiation offers can only be placed while the contract is out for bids.
    pub fn accepts_offers(&self) -> bool {
        matches!(self, ContractStatus::Published | ContractStatus::InNegotiation)
    }
}

label_enum! {
    pub enum ContractOfferStatus {
        Draft => "Draft",
        Submitted => "Submitted",
        Countered => "Countered",
        Accepted => "Accepted",
        Rejected => "Rejected",
        Withdrawn => "Withdrawn",
    }
}

impl ContractOfferStatus {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ContractOfferStatus::Draft | ContractOfferStatus::Submitted | ContractOfferStatus::Countered
        )
    }
}

label_enum! {
    pub enum ServiceRequestStatus {
        Open => "Open",
        Closed => "Closed",
        Awarded => "Awarded",
        Cancelled => "Cancelled",
    }
}

label_enum! {
    pub enum ServiceOfferStatus {
        Draft => "Draft",
        Submitted => "Submitted",
        Accepted => "Accepted",
        Rejected => "Rejected",
        Withdrawn => "Withdrawn",
    }
}

impl ServiceOfferStatus {
    /// Status changes the provider itself may make. Acceptance and rejection
    /// come from the service-management system.
    pub fn provider_transitions(&self) -> &'static [ServiceOfferStatus] {
        const FROM_DRAFT: &[ServiceOfferStatus] =
            &[ServiceOfferStatus::Submitted, ServiceOfferStatus::Withdrawn];
        const FROM_SUBMITTED: &[ServiceOfferStatus] = &[ServiceOfferStatus::Withdrawn];
        const TERMINAL: &[ServiceOfferStatus] = &[];
        match self {
            ServiceOfferStatus::Draft => FROM_DRAFT,
            ServiceOfferStatus::Submitted => FROM_SUBMITTED,
            _ => TERMINAL,
        }
    }

    pub fn can_transition_to(&self, next: &ServiceOfferStatus) -> bool {
        self.provider_transitions().contains(next)
    }
}

label_enum! {
    pub enum ServiceOrderStatus {
        Active => "Active",
        Completed => "Completed",
        SubstitutionPending => "Substitution Pending",
        ExtensionPending => "Extension Pending",
    }
}

impl ServiceOrderStatus {
    pub fn accepts_change_requests(&self) -> bool {
        matches!(self, ServiceOrderStatus::Active)
    }
}

label_enum! {
    pub enum ChangeRequestKind {
        Substitution => "Substitution",
        Extension => "Extension",
    }
}

label_enum! {
    pub enum ChangeRequestStatus {
        Requested => "Requested",
        Approved => "Approved",
        Declined => "Declined",
    }
}

label_enum! {
    pub enum ChangeInitiator {
        System => "System",
        Provider => "Provider",
        Client => "Client",
    }
}

label_enum! {
    pub enum ChangeDecision {
        Approve => "Approved",
        Decline => "Declined",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistProfile {
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub technology_level: Option<String>,
    #[serde(default)]
    pub performance_grade: Option<String>,
    #[serde(default)]
    pub day_rate: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub availability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub profile: Option<SpecialistProfile>,
}

impl User {
    pub fn role_set(&self) -> RoleSet {
        RoleSet::from_iter(self.role.iter().chain(self.roles.iter()).cloned())
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Fields a user or admin may PATCH on `/api/users/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SpecialistProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    #[serde(default)]
    pub users: u32,
    #[serde(default)]
    pub specialists: u32,
    #[serde(default)]
    pub active_orders: u32,
    #[serde(default)]
    pub contracts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default)]
    pub metrics: ProviderMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_notifications: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractVersion {
    pub version: u32,
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub client: Option<String>,
    pub status: ContractStatus,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub max_daily_rate: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub allowed_request_types: Vec<String>,
    #[serde(default)]
    pub versions: Vec<ContractVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractOffer {
    pub id: Id,
    pub contract_id: Id,
    #[serde(default)]
    pub proposed_daily_rate: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: ContractOfferStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContractOffer {
    pub proposed_daily_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: ContractOfferStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub name: String,
    #[serde(default)]
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageRequirement {
    pub language: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Where a service request sits relative to its bidding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiddingPhase {
    NotOpen,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub contract_id: Option<Id>,
    pub status: ServiceRequestStatus,
    #[serde(default)]
    pub bidding_start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bidding_end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_man_days: Option<f64>,
    #[serde(default)]
    pub onsite_days: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub must_have_criteria: Vec<Criterion>,
    #[serde(default)]
    pub nice_to_have_criteria: Vec<Criterion>,
    #[serde(default)]
    pub languages: Vec<LanguageRequirement>,
}

impl ServiceRequest {
    pub fn bidding_phase(&self, now: DateTime<Utc>) -> BiddingPhase {
        if !matches!(self.status, ServiceRequestStatus::Open) {
            return BiddingPhase::Closed;
        }
        if let Some(start) = self.bidding_start_at {
            if now < start {
                return BiddingPhase::NotOpen;
            }
        }
        match self.bidding_end_at {
            Some(end) if now >= end => BiddingPhase::Closed,
            _ => BiddingPhase::Open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffer {
    pub id: Id,
    pub service_request_id: Id,
    #[serde(default)]
    pub specialist_id: Option<Id>,
    #[serde(default)]
    pub specialist_name: Option<String>,
    #[serde(rename = "daily_rate", alias = "dailyRate")]
    pub daily_rate: f64,
    #[serde(default)]
    pub travel_cost_per_onsite_day: f64,
    #[serde(default)]
    pub total_man_days: f64,
    #[serde(default)]
    pub onsite_days: f64,
    #[serde(rename = "total_cost", alias = "totalCost", default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub must_have_match: Option<f64>,
    #[serde(default)]
    pub nice_to_have_match: Option<f64>,
    pub status: ServiceOfferStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceOffer {
    pub service_request_id: Id,
    pub specialist_id: Id,
    #[serde(rename = "daily_rate")]
    pub daily_rate: f64,
    pub travel_cost_per_onsite_day: f64,
    pub total_man_days: f64,
    pub onsite_days: f64,
    #[serde(rename = "total_cost")]
    pub total_cost: f64,
    pub status: ServiceOfferStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate<S> {
    pub status: S,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHistoryEntry {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub kind: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub service_offer_id: Option<Id>,
    #[serde(default)]
    pub specialist_id: Option<Id>,
    #[serde(default)]
    pub specialist_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    pub status: ServiceOrderStatus,
    #[serde(default)]
    pub man_days: Option<f64>,
    #[serde(rename = "total_cost", alias = "totalCost", default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub change_history: Vec<ChangeHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionRequest {
    pub new_specialist_id: Id,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrderChangeRequest {
    pub id: Id,
    pub service_order_id: Id,
    pub kind: ChangeRequestKind,
    pub status: ChangeRequestStatus,
    #[serde(default = "default_initiator")]
    pub initiated_by: ChangeInitiator,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub new_specialist_id: Option<Id>,
    #[serde(default)]
    pub new_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub additional_man_days: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_initiator() -> ChangeInitiator {
    ChangeInitiator::System
}

impl ServiceOrderChangeRequest {
    /// The provider answers requests raised by the client or the system, never its own.
    pub fn is_decidable_by_provider(&self) -> bool {
        matches!(self.status, ChangeRequestStatus::Requested)
            && !matches!(self.initiated_by, ChangeInitiator::Provider)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChangeRequest {
    pub service_order_id: Id,
    pub kind: ChangeRequestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_specialist_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_man_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionUpdate {
    pub decision: ChangeDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialist {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub technology_level: Option<String>,
    #[serde(default)]
    pub performance_grade: Option<String>,
    #[serde(default)]
    pub day_rate: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub availability: Option<String>,
    /// Set only on suggestions for a service request.
    #[serde(default)]
    pub match_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Id,
    #[serde(default)]
    pub actor: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<Id>,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
}
