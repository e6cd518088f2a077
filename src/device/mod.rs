//! HTTP+JSON protocol to the dispenser appliance.
//!
//! The appliance serves a small REST surface on its LAN address (or
//! `http://192.168.4.1` while in AP provisioning mode). The schedule fetch
//! is abstracted behind [`ScheduleSource`] so the monitor can run against
//! anything that yields slots.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ScheduleSlot;

pub use client::DispenserClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid device url: {0}")]
    InvalidUrl(String),
    #[error("device request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("device returned status {0}")]
    InvalidResponse(reqwest::StatusCode),
    #[error("failed to decode device response: {0}")]
    Decoding(#[source] reqwest::Error),
}

/// Anything that can produce the current pill schedule. Slot order is
/// meaningful: index N is compartment N+1.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_schedule(&self) -> Result<Vec<ScheduleSlot>, ApiError>;
}
