use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{DeviceInfo, ScheduleSlot};

use super::{ApiError, ScheduleSource};

#[derive(Serialize, Deserialize)]
struct ScheduleEnvelope {
    schedule: Vec<ScheduleSlot>,
}

#[derive(Serialize)]
struct WifiConfig<'a> {
    ssid: &'a str,
    password: &'a str,
    timezone_offset: i32,
}

#[derive(Serialize)]
struct DispenseRequest {
    pills: u32,
}

/// Client for the appliance's REST surface.
#[derive(Clone)]
pub struct DispenserClient {
    base_url: String,
    client: reqwest::Client,
}

impl DispenserClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            base_url: trimmed.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn device_info(&self) -> Result<DeviceInfo, ApiError> {
        self.get_json("/info").await
    }

    pub async fn current_schedule(&self) -> Result<Vec<ScheduleSlot>, ApiError> {
        let envelope: ScheduleEnvelope = self.get_json("/schedule").await?;
        Ok(envelope.schedule)
    }

    pub async fn set_schedule(&self, schedule: &[ScheduleSlot]) -> Result<(), ApiError> {
        let body = ScheduleEnvelope {
            schedule: schedule.to_vec(),
        };
        self.post_json("/configure_schedule", &body).await
    }

    pub async fn configure_wifi(
        &self,
        ssid: &str,
        password: &str,
        timezone_offset: i32,
    ) -> Result<(), ApiError> {
        let body = WifiConfig {
            ssid,
            password,
            timezone_offset,
        };
        self.post_json("/configure_wifi", &body).await
    }

    pub async fn dispense(&self, pills: u32) -> Result<(), ApiError> {
        self.post_json("/dispense", &DispenseRequest { pills }).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::InvalidResponse(status));
        }

        response.json::<T>().await.map_err(ApiError::Decoding)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::InvalidResponse(status));
        }

        Ok(())
    }
}

#[async_trait]
impl ScheduleSource for DispenserClient {
    async fn fetch_schedule(&self) -> Result<Vec<ScheduleSlot>, ApiError> {
        self.current_schedule().await
    }
}
