//! One module per portal page group.

pub mod activity_logs;
pub mod auth;
pub mod change_requests;
pub mod contracts;
pub mod dashboard;
pub mod provider;
pub mod service_offers;
pub mod service_orders;
pub mod service_requests;
pub mod specialists;
pub mod users;
