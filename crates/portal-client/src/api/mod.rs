//! One module per backend resource, each adding typed calls to [`crate::Portal`].

pub mod activity_logs;
pub mod change_requests;
pub mod contracts;
pub mod providers;
pub mod service_offers;
pub mod service_orders;
pub mod service_requests;
pub mod specialists;
pub mod users;
