//! Community insights dashboard.
//!
//! Uploads a member CSV to the insights backend, shows the KPIs and
//! narrative summary it returns, asks it for chart suggestions and
//! aggregates the chosen charts locally. Driven from the terminal
//! (`insights analyze`) or from an embedded web dashboard (`insights web`).

pub mod analytics;
pub mod charts;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod gateway;
pub mod kpi;
pub mod model;
pub mod web;
