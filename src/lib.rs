//! Lead Detail BFF Library
//!
//! Backend-for-frontend for the lead-detail view of the sales-intelligence CRM:
//! fetches a lead, resolves its service alignment, drives profile validation and
//! merges the results into per-session view state served to the browser.
//!
//! # Modules
//!
//! - `alignment`: Alignment source precedence, normalization and display sorting.
//! - `backend_client`: Intelligence backend HTTP client.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and session guards.
//! - `lead_detail`: View orchestration (fetch, alignment, validation).
//! - `models`: Backend payloads and normalized view models.
//! - `routes`: Router assembly.
//! - `session`: Session registry, view slots and liveness tickets.
//! - `validation`: Validation trigger policy and poller.
//! - `view_state`: The merged, renderable view.

pub mod alignment;
pub mod backend_client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod lead_detail;
pub mod models;
pub mod routes;
pub mod session;
pub mod validation;
pub mod view_state;
