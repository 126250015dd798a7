use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use super::generator::error_markdown;
use super::store::{Claim, ClaimKind, Presentation};
use super::{Briefing, request_for, to_chrono};

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// New briefing stored; `feedback_count` items were marked processed.
    Regenerated { feedback_count: usize },
    /// Generation or storage failed. The previous briefing stays in place.
    Failed {
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    },
    /// Another worker held or superseded the claim.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub presentation_id: i64,
    pub outcome: TickOutcome,
}

/// Run the scheduler on the actix runtime, one pass every `every`.
///
/// Passes never overlap within a process: the loop awaits each pass before the next tick.
pub fn spawn_scheduler(briefing: Arc<Briefing>, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let reports = run_tick(&briefing, Utc::now()).await;
            if !reports.is_empty() {
                log::debug!("Scheduler pass handled {} presentation(s)", reports.len());
            }
        }
    });
}

/// Regenerate every presentation whose due time is before `now`.
///
/// Each presentation is handled on its own; a failure on one never stops the pass.
pub async fn run_tick(briefing: &Briefing, now: DateTime<Utc>) -> Vec<TickReport> {
    let due = match briefing.store.find_due(now).await {
        Ok(d) => d,
        Err(e) => {
            log::error!("Scheduler: failed to load due presentations: {e}");
            return vec![];
        }
    };

    let mut reports = Vec::with_capacity(due.len());
    for presentation in &due {
        let outcome = process(briefing, presentation, now).await;
        match &outcome {
            TickOutcome::Regenerated { feedback_count } => log::info!(
                "Regenerated briefing for presentation {} ({} new feedback)",
                presentation.id,
                feedback_count
            ),
            TickOutcome::Failed { reason, retry_at: Some(at) } => log::warn!(
                "Regeneration failed for presentation {}: {}; retrying at {}",
                presentation.id,
                reason,
                at.to_rfc3339()
            ),
            TickOutcome::Failed { reason, retry_at: None } => log::error!(
                "Regeneration failed for presentation {}: {}",
                presentation.id,
                reason
            ),
            TickOutcome::Skipped => {
                log::debug!("Presentation {} claimed elsewhere, skipped", presentation.id)
            }
        }
        reports.push(TickReport {
            presentation_id: presentation.id,
            outcome,
        });
    }
    reports
}

async fn process(briefing: &Briefing, due: &Presentation, now: DateTime<Utc>) -> TickOutcome {
    let store = briefing.store.as_ref();
    let lease_until = now + to_chrono(briefing.settings.claim_lease);

    let claim = match store
        .claim(due.id, ClaimKind::Scheduled, now, lease_until)
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => return TickOutcome::Skipped,
        Err(e) => return failed(e.to_string(), None),
    };

    // An edit before the claim is not in the due list's copy
    let presentation = match store.find_presentation(due.id).await {
        Ok(Some(p)) => p,
        Ok(None) => return TickOutcome::Skipped,
        Err(e) => return abandon(briefing, &claim, e.to_string()).await,
    };

    // Whole history goes into the prompt; only the items unprocessed right now get
    // this run's briefing attached. Later arrivals wait for the next batch.
    let feedback = match store.feedback_for(presentation.id).await {
        Ok(f) => f,
        Err(e) => return abandon(briefing, &claim, e.to_string()).await,
    };
    let pending: Vec<i64> = feedback
        .iter()
        .filter(|f| !f.is_processed)
        .map(|f| f.id)
        .collect();

    match briefing
        .generator
        .generate(&request_for(&presentation, &feedback))
        .await
    {
        Ok(text) => match store.complete(&claim, &text, &pending, now).await {
            Ok(true) => TickOutcome::Regenerated {
                feedback_count: pending.len(),
            },
            Ok(false) => TickOutcome::Skipped,
            Err(e) => abandon(briefing, &claim, e.to_string()).await,
        },
        Err(e) => {
            let attempts = u32::try_from(presentation.failed_attempts).unwrap_or(0);
            let retry_at = (attempts < briefing.settings.retry_limit)
                .then(|| now + to_chrono(briefing.settings.retry_delay));
            let reason = e.to_string();
            let fallback = error_markdown(&e);
            if let Err(store_err) = store.fail(&claim, &reason, Some(&fallback), retry_at, now).await {
                log::error!(
                    "Scheduler: failed to record failure for presentation {}: {store_err}",
                    presentation.id
                );
            }
            failed(reason, retry_at)
        }
    }
}

/// Give up the lease after a storage error.
///
/// The schedule stays armed and `retry_limit` does not apply: the pending batch is
/// retried on every pass until the store recovers.
async fn abandon(briefing: &Briefing, claim: &Claim, reason: String) -> TickOutcome {
    if let Err(e) = briefing.store.release(claim).await {
        log::error!(
            "Scheduler: could not release presentation {}: {e}",
            claim.presentation_id
        );
    }
    failed(reason, None)
}

fn failed(reason: String, retry_at: Option<DateTime<Utc>>) -> TickOutcome {
    TickOutcome::Failed { reason, retry_at }
}
