use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tokio::time::sleep;

use crate::{pacing::DelayPolicy, portal::PortalClient, store::Store};

/// Resumable paginated enumerator. Walks the portal listing page by page,
/// appending every delivered id to the log, and stops once the running item
/// total reaches the total reported by the portal.
///
/// Any fetch or append error halts the loop immediately; rerunning restarts
/// from page 1, so the log may accumulate duplicates across runs.
pub struct Lister<'a> {
    portal: &'a PortalClient,
    store: &'a Store,
    delay: &'a dyn DelayPolicy,
    should_terminate: Arc<AtomicBool>,
}

impl<'a> Lister<'a> {
    pub fn new(
        portal: &'a PortalClient,
        store: &'a Store,
        delay: &'a dyn DelayPolicy,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Lister {
            portal,
            store,
            delay,
            should_terminate,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut page: u32 = 1;
        let mut received: usize = 0;

        loop {
            if self.should_terminate.load(Ordering::Relaxed) {
                info!("termination requested, stopping enumeration");
                return Ok(());
            }

            info!("Fetching page {}...", page);
            let listing = self
                .portal
                .ticket_page(page)
                .await
                .context(format!("could not fetch listing page {}", page))?;

            for item in &listing.items {
                self.store
                    .append_id(&item.id)
                    .context(format!("could not append id {} to the log", item.id))?;
            }
            received += listing.items.len();
            info!(
                "Fetched {} receipts, Progress: {}/{}",
                listing.items.len(),
                received,
                listing.total_count
            );

            if received >= listing.total_count {
                break;
            }

            page += 1;
            sleep(self.delay.next_delay()).await;
        }

        info!("enumeration complete, {} receipts discovered", received);
        Ok(())
    }
}
