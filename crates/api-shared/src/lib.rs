//! # API Shared
//!
//! Shared utilities and definitions for the Meditache APIs.
//!
//! Contains:
//! - Access-gate types: [`Actor`], [`Role`] and API key validation
//! - The [`HealthService`] used by the health endpoint
//!
//! Transport-agnostic; `api-rest` adapts these to HTTP headers and status codes.

pub mod auth;
pub mod health;

pub use auth::{validate_api_key, Actor, AuthError, Role};
pub use health::{HealthRes, HealthService};
