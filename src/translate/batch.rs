//! Batch translation: fixed-size concurrent groups with a pause between them.
//! Every member of a group settles before the next group starts, which caps
//! concurrent load on the runtime at the group size.

use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, info};

use super::{BatchItem, TranslateError, TranslateRequest, TranslationService};
use crate::metrics::metric_names;

impl TranslationService {
    /// Translate `texts`, isolating per-item failures.
    /// Results are returned in input order.
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: Option<&str>,
        target_lang: Option<&str>,
        model: Option<&str>,
    ) -> Result<Vec<BatchItem>, TranslateError> {
        let limits = self.limits();
        if texts.is_empty() {
            return Err(TranslateError::InvalidInput("texts must not be empty".into()));
        }
        if texts.len() > limits.max_batch_items {
            return Err(TranslateError::InvalidInput(format!(
                "too many texts (max {} per batch)",
                limits.max_batch_items
            )));
        }

        let started = Instant::now();
        let group_size = limits.batch_group_size.max(1);
        let group_delay = limits.batch_group_delay();
        let indexed: Vec<(usize, &String)> = texts.iter().enumerate().collect();
        let group_count = indexed.len().div_ceil(group_size);

        let mut results = Vec::with_capacity(texts.len());
        for (group_no, group) in indexed.chunks(group_size).enumerate() {
            if group_no > 0 && !group_delay.is_zero() {
                tokio::time::sleep(group_delay).await;
            }
            debug!(group = group_no + 1, of = group_count, size = group.len(), "batch group");

            let settled = join_all(group.iter().map(|&(index, text)| {
                let request = TranslateRequest {
                    text: text.clone(),
                    source_lang: source_lang.map(str::to_string),
                    target_lang: target_lang.map(str::to_string),
                    model: model.map(str::to_string),
                };
                async move {
                    let result = self.translate(&request).await;
                    match result {
                        Ok(outcome) => BatchItem {
                            index,
                            success: true,
                            translation: outcome.translation,
                            error: None,
                            from_cache: outcome.from_cache,
                        },
                        Err(e) => BatchItem {
                            index,
                            success: false,
                            translation: request.text,
                            error: Some(e.to_string()),
                            from_cache: false,
                        },
                    }
                }
            }))
            .await;
            results.extend(settled);
        }

        results.sort_by_key(|item| item.index);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics().record(metric_names::BATCH_DONE, elapsed_ms);
        let failed = results.iter().filter(|item| !item.success).count();
        info!(total = results.len(), failed, elapsed_ms, "batch complete");

        Ok(results)
    }
}
