//! Midjourney imagine gateway
//!
//! Accepts image generation prompts and follow-up actions, submits them to a
//! Midjourney proxy job API and polls each job until it finishes. Clients
//! that keep failing (wrong password, rejected or failed jobs) are put in a
//! cooldown by per-IP admission control.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
