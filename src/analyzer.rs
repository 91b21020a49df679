use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use futures::StreamExt;
use tokio::task;

use crate::{extract::strip_boilerplate, llm::ReceiptExtractor, store::Store};

/// Bounded-concurrency batch analyzer. Builds one task per logged id and
/// drives them with at most `concurrency` in flight; a failing task is logged
/// and settles as failed without touching its siblings. The run returns once
/// every task has settled.
pub struct Analyzer<E> {
    store: Store,
    extractor: E,
    concurrency: usize,
    should_terminate: Arc<AtomicBool>,
}

impl<E: ReceiptExtractor> Analyzer<E> {
    pub fn new(
        store: Store,
        extractor: E,
        concurrency: usize,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Analyzer {
            store,
            extractor,
            // for_each_concurrent treats a limit of 0 as unlimited
            concurrency: concurrency.max(1),
            should_terminate,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let ids = self.store.read_ids().context("could not read the id log")?;
        info!(
            "analyzing {} receipts, at most {} at a time",
            ids.len(),
            self.concurrency
        );

        tokio_stream::iter(ids)
            .for_each_concurrent(self.concurrency, |id| async move {
                if self.should_terminate.load(Ordering::Relaxed) {
                    return;
                }
                if self.store.has_analysis(&id) {
                    info!("Skipping already analyzed receipt {}", id);
                    return;
                }

                info!("Analyzing receipt {}...", id);
                match self.analyze_one(&id).await {
                    Ok(_) => {
                        info!("Analyzed receipt content {}", id);
                    }
                    Err(e) => {
                        error!("Error analyzing receipt {}: {:?}", id, e);
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn analyze_one(&self, id: &str) -> anyhow::Result<()> {
        let html = self
            .store
            .read_raw(id)
            .context(format!("could not load raw receipt {}", id))?;

        let fragment = task::spawn_blocking(move || strip_boilerplate(&html)).await??;
        debug!("prompt input length for {}: {}", id, fragment.len());

        let analysis = self
            .extractor
            .extract(&fragment)
            .await
            .context(format!("inference failed for receipt {}", id))?;

        self.store
            .write_analysis(id, &analysis)
            .context(format!("could not persist analysis {}", id))?;
        Ok(())
    }
}
