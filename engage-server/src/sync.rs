//! Target sync: saved search → person records → resolved registry rows.

use anyhow::Result;
use tracing::{debug, info, warn};

use engage_types::TargetUpsert;

use crate::clients::LeadSource;
use crate::db::repositories::TargetRepository;
use crate::normalize::PersonRecord;
use crate::pacing::Pacer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: usize,
    pub people_seen: usize,
    pub upserted: usize,
    /// Records with neither a profile URL nor a lead id
    pub skipped: usize,
    pub resolved: usize,
    pub cached: usize,
    pub lookup_failures: usize,
}

pub struct TargetSync<'a> {
    source: &'a dyn LeadSource,
    targets: &'a TargetRepository,
    pacer: &'a Pacer,
}

impl<'a> TargetSync<'a> {
    pub fn new(source: &'a dyn LeadSource, targets: &'a TargetRepository, pacer: &'a Pacer) -> Self {
        Self {
            source,
            targets,
            pacer,
        }
    }

    /// Walk the saved search up to `max_people` records and merge each into the
    /// registry. Upstream failures end pagination or leave one person
    /// unresolved; only storage errors abort.
    pub async fn run(&self, search_url: &str, max_people: usize) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page = match self.source.search_page(search_url, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, page = report.pages + 1, "Search page failed, stopping pagination");
                    break;
                }
            };
            report.pages += 1;

            for item in &page.items {
                if report.people_seen >= max_people {
                    break 'pages;
                }
                report.people_seen += 1;
                self.sync_person(item, &mut report).await?;
            }

            match page.cursor {
                Some(next) if report.people_seen < max_people && !page.items.is_empty() => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }

        info!(
            pages = report.pages,
            people = report.people_seen,
            upserted = report.upserted,
            resolved = report.resolved,
            cached = report.cached,
            skipped = report.skipped,
            "Target sync finished"
        );
        Ok(report)
    }

    async fn sync_person(&self, item: &serde_json::Value, report: &mut SyncReport) -> Result<()> {
        let Some(person) = PersonRecord::from_value(item) else {
            report.skipped += 1;
            return Ok(());
        };
        let Some(canonical_url) = person.canonical_url() else {
            debug!(name = ?person.display_name, "Search record has no URL or lead id");
            report.skipped += 1;
            return Ok(());
        };

        let known = self.targets.get(&canonical_url)?;
        let resolved_identifier = match known.and_then(|t| t.resolved_identifier) {
            Some(identifier) => {
                report.cached += 1;
                Some(identifier)
            }
            None => match person.lead_id.as_deref() {
                Some(lead_id) => self.resolve(lead_id, &canonical_url, report).await,
                None => None,
            },
        };
        if resolved_identifier.is_some() {
            report.resolved += 1;
        }

        self.targets.upsert(&TargetUpsert {
            canonical_url,
            raw_lead_reference: person.lead_id,
            resolved_identifier,
            display_name: person.display_name,
        })?;
        report.upserted += 1;
        self.pacer.after_upsert(report.upserted).await;
        Ok(())
    }

    async fn resolve(&self, lead_id: &str, target: &str, report: &mut SyncReport) -> Option<String> {
        match self.source.resolve_lead(lead_id).await {
            Ok(Some(identifier)) => Some(identifier),
            Ok(None) => {
                warn!(url = %target, lead_id, "Lookup returned no identifier");
                None
            }
            Err(e) => {
                warn!(url = %target, lead_id, error = %e, "Identifier lookup failed");
                report.lookup_failures += 1;
                None
            }
        }
    }
}
