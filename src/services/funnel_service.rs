use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::repository::PipelineRepository;
use crate::error::Result;
use crate::models::stage::{Stage, STAGE_ORDER};
use crate::models::stage_transition::StageTransitionRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: Stage,
    pub label: &'static str,
    /// Applications that entered this stage at least once.
    pub reached: usize,
    /// Applications whose latest trail record points at this stage.
    pub currently_in_stage: usize,
    /// Percentage of the previous stage's count; `None` for the first stage.
    pub conversion_from_previous: Option<f64>,
    pub conversion_from_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineFunnel {
    pub job_id: Uuid,
    pub total_applicants: usize,
    pub stages: Vec<FunnelStage>,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

#[derive(Default)]
struct ApplicationPath<'a> {
    visited: HashSet<Stage>,
    latest: Option<&'a StageTransitionRecord>,
}

/// Projects trail records of many applications into per-stage pass-through
/// counts and conversion rates. Records may arrive in any order.
pub fn compute_funnel(job_id: Uuid, records: &[StageTransitionRecord]) -> PipelineFunnel {
    let mut paths: HashMap<Uuid, ApplicationPath<'_>> = HashMap::new();
    for record in records {
        let path = paths.entry(record.application_id).or_default();
        path.visited.insert(record.to_stage);
        let newer = path.latest.map_or(true, |latest| {
            (record.changed_at, record.sequence) > (latest.changed_at, latest.sequence)
        });
        if newer {
            path.latest = Some(record);
        }
    }

    let reached = |stage: Stage| paths.values().filter(|p| p.visited.contains(&stage)).count();
    let current = |stage: Stage| {
        paths
            .values()
            .filter(|p| p.latest.map(|r| r.to_stage) == Some(stage))
            .count()
    };

    let total_applicants = reached(Stage::first());
    let mut stages = Vec::with_capacity(STAGE_ORDER.len());
    let mut previous: Option<usize> = None;
    for stage in STAGE_ORDER {
        let count = reached(stage);
        stages.push(FunnelStage {
            stage,
            label: stage.label(),
            reached: count,
            currently_in_stage: current(stage),
            conversion_from_previous: previous.map(|prev| percentage(count, prev)),
            conversion_from_total: percentage(count, total_applicants),
        });
        previous = Some(count);
    }

    PipelineFunnel {
        job_id,
        total_applicants,
        stages,
    }
}

#[derive(Clone)]
pub struct FunnelService {
    repo: Arc<dyn PipelineRepository>,
}

impl FunnelService {
    pub fn new(repo: Arc<dyn PipelineRepository>) -> Self {
        Self { repo }
    }

    /// Recomputed from the trail on every call; nothing here is persisted.
    pub async fn funnel_for_job(&self, job_id: Uuid) -> Result<PipelineFunnel> {
        let records = self.repo.histories_for_job(job_id).await?;
        let funnel = compute_funnel(job_id, &records);
        tracing::debug!(
            job_id = %job_id,
            total = funnel.total_applicants,
            "Computed pipeline funnel"
        );
        Ok(funnel)
    }
}
