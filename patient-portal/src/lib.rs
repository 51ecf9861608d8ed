pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod consult;
pub mod content;
pub mod doctor_selection;
pub mod doctors_page;
pub mod error;
pub mod filter;
pub mod liveness;
pub mod models;
pub mod normalize;
pub mod placement;
pub mod questionnaire;
pub mod reviews;
pub mod service;
pub mod steps;
pub mod workflow;
pub mod workflow_state;

pub use config::PortalConfig;
pub use error::{PortalError, Result};
pub use service::{AppState, build_router, create_app};
pub use workflow::{Route, build_consultation_flow, create_flow_runner};
