//! Photo processing pipeline
//!
//! Accepts photo uploads, then compresses them and removes watermarks on a
//! bounded in-process worker pool. Each job moves through
//! `pending -> processing -> completed | failed`; a failing step only loses
//! its own artifact.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod processing;
pub mod routes;
pub mod services;
