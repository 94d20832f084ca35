//! Core library for the HighLevel CRM tool: OAuth code exchange, REST client, and
//! the contact custom-field update workflow driven by the CLI.

pub mod api;
pub mod auth;
pub mod config;
pub mod services;
