//! Pool refresh: fetch each resolved target's recent posts into the shared
//! candidate pool.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use engage_types::{Target, UnparsedTimestampPolicy};

use crate::clients::LeadSource;
use crate::db::repositories::{pool_entry, PoolRepository, TargetRepository};
use crate::normalize::PostRecord;
use crate::pacing::Pacer;

#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub lookback_days: i64,
    pub posts_limit: u32,
    pub unparsed: UnparsedTimestampPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub targets: usize,
    pub failed_targets: usize,
    pub posts_seen: usize,
    pub upserted: usize,
    pub out_of_window: usize,
    pub unparsed_dropped: usize,
    pub unparsed_kept: usize,
    pub missing_id: usize,
}

/// Oldest `created_at` inside a lookback window of `days`; `None` when the
/// window reaches past the representable range
pub fn lookback_cutoff(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days.max(0)).and_then(|window| now.checked_sub_signed(window))
}

pub struct PoolRefresher<'a> {
    source: &'a dyn LeadSource,
    targets: &'a TargetRepository,
    pool: &'a PoolRepository,
    pacer: &'a Pacer,
}

impl<'a> PoolRefresher<'a> {
    pub fn new(
        source: &'a dyn LeadSource,
        targets: &'a TargetRepository,
        pool: &'a PoolRepository,
        pacer: &'a Pacer,
    ) -> Self {
        Self {
            source,
            targets,
            pool,
            pacer,
        }
    }

    pub async fn run(&self, options: &RefreshOptions, now: DateTime<Utc>) -> Result<RefreshReport> {
        let cutoff = lookback_cutoff(now, options.lookback_days);
        let mut report = RefreshReport::default();

        for target in self.targets.list_resolved()? {
            report.targets += 1;
            self.pacer.before_target().await;
            if let Err(e) = self
                .refresh_target(&target, options, cutoff, now, &mut report)
                .await
            {
                warn!(url = %target.canonical_url, error = %e, "Skipping target");
                report.failed_targets += 1;
            }
        }

        info!(
            targets = report.targets,
            failed = report.failed_targets,
            seen = report.posts_seen,
            upserted = report.upserted,
            out_of_window = report.out_of_window,
            unparsed_dropped = report.unparsed_dropped,
            unparsed_kept = report.unparsed_kept,
            "Pool refresh finished"
        );
        Ok(report)
    }

    async fn refresh_target(
        &self,
        target: &Target,
        options: &RefreshOptions,
        cutoff: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        report: &mut RefreshReport,
    ) -> Result<()> {
        let Some(identifier) = target.resolved_identifier.as_deref() else {
            return Ok(());
        };
        let items = self.source.list_posts(identifier, options.posts_limit).await?;

        for item in &items {
            report.posts_seen += 1;
            let Some(post) = PostRecord::from_value(item, now) else {
                report.missing_id += 1;
                continue;
            };
            match post.created_at {
                Some(created) if cutoff.is_some_and(|cutoff| created < cutoff) => {
                    report.out_of_window += 1;
                    continue;
                }
                Some(_) => {}
                None => match options.unparsed {
                    UnparsedTimestampPolicy::Drop => {
                        debug!(social_id = %post.social_id, "Dropping post without a usable timestamp");
                        report.unparsed_dropped += 1;
                        continue;
                    }
                    UnparsedTimestampPolicy::Retain => report.unparsed_kept += 1,
                },
            }
            self.pool.upsert(&pool_entry(
                post.social_id,
                identifier,
                post.text,
                post.created_at,
                now,
            ))?;
            report.upserted += 1;
        }
        Ok(())
    }
}
