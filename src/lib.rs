pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::database::repository::PipelineRepository;
use crate::error::Result;
use crate::services::{
    funnel_service::FunnelService, notification_service::NotificationService,
    pipeline_service::PipelineService, timeline_service::TimelineService,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline_service: PipelineService,
    pub timeline_service: TimelineService,
    pub funnel_service: FunnelService,
    pub notification_service: NotificationService,
}

impl AppState {
    /// Wires every service to the same record store. The caller owns the
    /// store's lifecycle.
    pub fn new(repo: Arc<dyn PipelineRepository>, config: &Config) -> Result<Self> {
        let notification_service = NotificationService::new(
            repo.clone(),
            config.notification_webhook_url.clone(),
            Duration::from_secs(config.notification_timeout_secs),
        )?;

        Ok(Self {
            pipeline_service: PipelineService::new(repo.clone()),
            timeline_service: TimelineService::new(repo.clone()),
            funnel_service: FunnelService::new(repo),
            notification_service,
        })
    }
}
