//! The per-job executor shared by the tick loop (§4.7) and the event
//! dispatcher (§4.6): steps 1-9 of a single job run.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::affinity::{compute_affinity_timeout, ToolAffinityStore};
use crate::routing::{assert_routing_headers, Flow};
use crate::store::TalkStore;
use crate::talk::{AffinityObservation, Job, JobOutputDestination, JobReport, JobStatus, MessageRole, Talk};

use super::delivery::SlackSender;
use super::policy::compute_policy_allowed_tools;
use super::types::{build_headers, session_key, HostRunRequest, RunSource, SchedulerConfig, SchedulerError, TriggerContext};

pub struct JobExecutor {
    pub store: Arc<TalkStore>,
    pub affinity: Arc<ToolAffinityStore>,
    pub http: reqwest::Client,
    pub config: SchedulerConfig,
    pub slack: Option<Arc<dyn SlackSender>>,
    pub available_tools: Vec<String>,
}

impl JobExecutor {
    /// Run a single job to completion, recording one observation and one
    /// report regardless of outcome, and clearing `processing` on exit.
    pub async fn run(
        &self,
        talk: &Talk,
        job: &Job,
        source: RunSource,
        trigger: Option<TriggerContext>,
    ) -> Result<JobReport, SchedulerError> {
        self.store.set_processing(&talk.id, true).await?;
        let result = self.run_inner(talk, job, source, trigger).await;
        if let Err(e) = self.store.set_processing(&talk.id, false).await {
            warn!(talk_id = %talk.id, error = %e, "failed to clear processing flag");
        }
        result
    }

    async fn run_inner(
        &self,
        talk: &Talk,
        job: &Job,
        source: RunSource,
        trigger: Option<TriggerContext>,
    ) -> Result<JobReport, SchedulerError> {
        let classify_text = trigger
            .as_ref()
            .and_then(|t| t.content.clone())
            .unwrap_or_else(|| job.prompt.clone());
        let intent = crate::routing::classify(&classify_text);
        let intent_str = intent.as_str();

        let policy_allowed = compute_policy_allowed_tools(talk, &self.available_tools);
        let (phase, selected_tools) = self
            .affinity
            .select_tools(&talk.id, intent_str, &policy_allowed, None)
            .await?;

        let timeout_ms = compute_affinity_timeout(
            phase,
            selected_tools.len(),
            self.config.base_timeout_ms,
            self.config.min_timeout_ms,
        );

        let key = session_key(&talk.id, &job.id);
        let headers = build_headers(key);
        assert_routing_headers(Flow::JobScheduler, talk.execution_mode, &headers)?;

        let request = HostRunRequest {
            talk_id: talk.id.clone(),
            job_id: job.id.clone(),
            prompt: job.prompt.clone(),
            tools: selected_tools.clone(),
            model: talk.model.clone(),
            trigger: trigger.clone(),
        };

        let run_at = chrono::Utc::now().timestamp_millis();
        let outcome = self.invoke_host(&headers, &request, timeout_ms).await;

        let (status, full_output, error) = match &outcome {
            Ok(output) => (JobStatus::Success, output.clone(), None),
            Err(e) => (JobStatus::Failure, String::new(), Some(e.to_string())),
        };

        let observation = AffinityObservation {
            timestamp: run_at,
            intent: intent_str.to_string(),
            available_tools: self.available_tools.clone(),
            used_tools: selected_tools,
            tools_offered: policy_allowed,
            model: talk.model.clone(),
            source: source.as_str().to_string(),
        };
        if let Err(e) = self.affinity.observe(&talk.id, observation).await {
            warn!(talk_id = %talk.id, error = %e, "failed to record affinity observation");
        }

        let report = JobReport {
            job_id: job.id.clone(),
            run_at,
            status,
            full_output: full_output.clone(),
            error,
        };
        self.store.append_report(&talk.id, report.clone()).await?;
        self.store
            .record_job_run(&talk.id, &job.id, status, run_at)
            .await?;

        if matches!(status, JobStatus::Success) {
            self.deliver(talk, job, &full_output).await;
        }

        info!(talk_id = %talk.id, job_id = %job.id, status = ?status, "job run finished");
        Ok(report)
    }

    async fn invoke_host(
        &self,
        headers: &std::collections::HashMap<String, String>,
        request: &HostRunRequest,
        timeout_ms: u64,
    ) -> Result<String, SchedulerError> {
        let url = format!("{}/v1/run", self.config.host_base_url.trim_end_matches('/'));
        let mut builder = self
            .http
            .post(&url)
            .json(request)
            .timeout(Duration::from_millis(timeout_ms));
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::HostStatus { status, body });
        }
        Ok(response.text().await?)
    }

    async fn deliver(&self, talk: &Talk, job: &Job, full_output: &str) {
        match &job.output {
            JobOutputDestination::ReportOnly => {}
            JobOutputDestination::Talk => {
                if let Err(e) = self
                    .store
                    .append_message(&talk.id, MessageRole::Assistant, full_output.to_string())
                    .await
                {
                    warn!(talk_id = %talk.id, error = %e, "failed to append job output to talk");
                }
            }
            JobOutputDestination::Slack {
                channel_id,
                account_id,
                thread_ts,
            } => {
                let Some(slack) = &self.slack else {
                    warn!(talk_id = %talk.id, "job targets slack output but no sender is configured");
                    return;
                };
                if let Err(e) = slack
                    .send_message(
                        account_id.as_deref(),
                        channel_id,
                        thread_ts.as_deref(),
                        full_output,
                    )
                    .await
                {
                    warn!(talk_id = %talk.id, error = %e, "failed to deliver job output to slack");
                }
            }
        }
    }
}
