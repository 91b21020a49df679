use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tokio::time::sleep;

use crate::{pacing::DelayPolicy, portal::PortalClient, store::Store};

/// Idempotent per-receipt fetcher. Visits ids in log order, one at a time;
/// ids that already have a raw record on disk are skipped without consuming
/// a delay. The first fetch or persist error halts the whole run — progress
/// already on disk is what makes the rerun resume.
pub struct Fetcher<'a> {
    portal: &'a PortalClient,
    store: &'a Store,
    delay: &'a dyn DelayPolicy,
    should_terminate: Arc<AtomicBool>,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        portal: &'a PortalClient,
        store: &'a Store,
        delay: &'a dyn DelayPolicy,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Fetcher {
            portal,
            store,
            delay,
            should_terminate,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let ids = self.store.read_ids().context("could not read the id log")?;
        let total = ids.len();

        for (idx, id) in ids.iter().enumerate() {
            if self.should_terminate.load(Ordering::Relaxed) {
                info!("termination requested, stopping fetcher");
                return Ok(());
            }

            if self.store.has_raw(id) {
                info!("Skipping already fetched receipt {}", id);
                continue;
            }

            info!("Fetching receipt {}...", id);
            let html = self
                .portal
                .ticket_detail(id)
                .await
                .context(format!("could not fetch receipt {}", id))?;
            self.store
                .write_raw(id, &html)
                .context(format!("could not persist receipt {}", id))?;
            info!(
                "Fetched receipt content {}, Progress: {}/{}",
                id,
                idx + 1,
                total
            );

            sleep(self.delay.next_delay()).await;
        }

        Ok(())
    }
}
