//! The batch run: sync → refresh → select → generate → enqueue.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use engage_types::{Candidate, NewReview, UnparsedTimestampPolicy};

use crate::clients::{CommentGenerator, LeadSource, Notifier, ReviewCard};
use crate::config::Settings;
use crate::db::repositories::{PoolRepository, ReviewRepository, TargetRepository};
use crate::db::Database;
use crate::pacing::Pacer;
use crate::pool::{lookback_cutoff, PoolRefresher, RefreshOptions, RefreshReport};
use crate::selection;
use crate::sync::{SyncReport, TargetSync};

/// Knobs for one batch run, resolved from settings and CLI flags
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub search_url: String,
    pub max_people: usize,
    pub lookback_days: i64,
    pub posts_limit: u32,
    pub budget: usize,
    pub unparsed: UnparsedTimestampPolicy,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            search_url: settings.unipile.search_url.clone(),
            max_people: settings.unipile.max_people,
            lookback_days: settings.run.lookback_days,
            posts_limit: settings.unipile.posts_limit,
            budget: settings.run.budget,
            unparsed: settings.run.effective_unparsed_policy(),
        }
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            lookback_days: self.lookback_days,
            posts_limit: self.posts_limit,
            unparsed: self.unparsed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    pub selected: usize,
    pub enqueued: usize,
    /// Lost the first-writer race or already decided
    pub already_queued: usize,
    pub generation_failures: usize,
    pub notify_failures: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub sync: SyncReport,
    pub refresh: RefreshReport,
    pub enqueue: EnqueueReport,
}

pub struct Pipeline {
    targets: TargetRepository,
    pool: PoolRepository,
    reviews: ReviewRepository,
    source: Arc<dyn LeadSource>,
    generator: Arc<dyn CommentGenerator>,
    notifier: Arc<dyn Notifier>,
    pacer: Pacer,
}

impl Pipeline {
    pub fn new(
        db: &Database,
        source: Arc<dyn LeadSource>,
        generator: Arc<dyn CommentGenerator>,
        notifier: Arc<dyn Notifier>,
        pacer: Pacer,
    ) -> Self {
        Self {
            targets: TargetRepository::new(db.pool.clone()),
            pool: PoolRepository::new(db.pool.clone()),
            reviews: ReviewRepository::new(db.pool.clone()),
            source,
            generator,
            notifier,
            pacer,
        }
    }

    pub async fn sync(&self, options: &RunOptions) -> Result<SyncReport> {
        TargetSync::new(self.source.as_ref(), &self.targets, &self.pacer)
            .run(&options.search_url, options.max_people)
            .await
    }

    pub async fn refresh(&self, options: &RunOptions, now: DateTime<Utc>) -> Result<RefreshReport> {
        PoolRefresher::new(self.source.as_ref(), &self.targets, &self.pool, &self.pacer)
            .run(&options.refresh_options(), now)
            .await
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        options: &RunOptions,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<Candidate>> {
        let cutoff = lookback_cutoff(now, options.lookback_days);
        selection::select(&self.pool, cutoff, options.budget, rng)
    }

    /// Draft, queue and announce each selected candidate
    pub async fn enqueue(&self, candidates: Vec<Candidate>) -> Result<EnqueueReport> {
        let mut report = EnqueueReport {
            selected: candidates.len(),
            ..Default::default()
        };

        for (i, candidate) in candidates.into_iter().enumerate() {
            if i > 0 {
                self.pacer.between_reviews().await;
            }
            let social_id = candidate.entry.social_id.clone();

            let draft = match self
                .generator
                .generate(&candidate.author_name, &candidate.entry.text)
                .await
            {
                Ok(draft) => draft,
                Err(e) => {
                    warn!(social_id = %social_id, error = %e, "Comment generation failed");
                    report.generation_failures += 1;
                    continue;
                }
            };

            let review = NewReview {
                social_id: social_id.clone(),
                profile_name: candidate.author_name,
                post_text: candidate.entry.text,
                generated_text: draft,
            };
            if !self.reviews.enqueue(&review, Utc::now())? {
                info!(social_id = %social_id, "Post already queued or decided");
                report.already_queued += 1;
                continue;
            }
            report.enqueued += 1;

            let card = ReviewCard {
                social_id: review.social_id,
                author: review.profile_name,
                post_text: review.post_text,
                proposed_comment: review.generated_text,
            };
            match self.notifier.send_review(&card).await {
                Ok(message) => self.reviews.attach_message_ref(&social_id, &message)?,
                Err(e) => {
                    warn!(social_id = %social_id, error = %e, "Failed to send review message");
                    report.notify_failures += 1;
                }
            }
        }

        info!(
            selected = report.selected,
            enqueued = report.enqueued,
            already_queued = report.already_queued,
            generation_failures = report.generation_failures,
            notify_failures = report.notify_failures,
            "Enqueue finished"
        );
        Ok(report)
    }

    /// One full batch run inside a span carrying its `run_id`
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch_run", run_id = %run_id);
        async move {
            info!(budget = options.budget, lookback_days = options.lookback_days, "Batch run started");
            let sync = self.sync(options).await?;
            let now = Utc::now();
            let refresh = self.refresh(options, now).await?;
            let selected = {
                let mut rng = rand::rng();
                self.select(options, now, &mut rng)?
            };
            let enqueue = self.enqueue(selected).await?;
            info!("Batch run finished");
            Ok(RunReport {
                run_id,
                sync,
                refresh,
                enqueue,
            })
        }
        .instrument(span)
        .await
    }
}
