use crate::api::store::RemoteStore;
use crate::core::stats::RunCounters;
use crate::logging::{log, LogLevel};
use crate::model::common::{FieldMap, RecordId};
use crate::model::intent::{Selector, WriteIntent};
use crate::utils;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Records that share one set of corrected field values.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentGroup {
    pub label: String,
    pub fields: FieldMap,
    pub ids: Vec<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    pub label: String,
    pub written: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
}

/// Groups single-record intents by identical field values, in first-seen order.
pub fn group_intents<I>(intents: I) -> Vec<IntentGroup>
where
    I: IntoIterator<Item = WriteIntent>,
{
    let mut groups: Vec<IntentGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for intent in intents {
        let key = serde_json::Value::Object(intent.fields.clone()).to_string();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(IntentGroup {
                label: describe_fields(&intent.fields),
                fields: intent.fields.clone(),
                ids: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].ids.extend_from_slice(intent.selector.ids());
    }
    groups
}

fn describe_fields(fields: &FieldMap) -> String {
    fields
        .iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) => format!("{}={}", k, s),
            None => format!("{}={}", k, v),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sorted, de-duplicated ids split into runs of at most `chunk_size`.
pub fn chunk_ids(ids: &[RecordId], chunk_size: usize) -> Vec<Vec<RecordId>> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
        .chunks(chunk_size.max(1))
        .map(<[RecordId]>::to_vec)
        .collect()
}

/// Writes each group with `id in (...)` selectors: groups run concurrently, chunks within a
/// group run one after another. A failed chunk is logged and the group moves on.
pub struct ChunkedWriter<S: RemoteStore + 'static> {
    store: Arc<S>,
    table: Arc<str>,
    chunk_size: usize,
    semaphore: Arc<Semaphore>,
    counters: Arc<RunCounters>,
}

impl<S: RemoteStore + 'static> ChunkedWriter<S> {
    pub fn new(
        store: Arc<S>,
        table: &str,
        chunk_size: usize,
        semaphore: Arc<Semaphore>,
        counters: Arc<RunCounters>,
    ) -> Self {
        ChunkedWriter {
            store,
            table: Arc::from(table),
            chunk_size: chunk_size.max(1),
            semaphore,
            counters,
        }
    }

    pub async fn write_groups(&self, groups: Vec<IntentGroup>) -> Vec<GroupOutcome> {
        let mut tasks = JoinSet::new();
        // Outstanding groups by position; labels are display text and may repeat.
        let mut pending: HashMap<usize, (String, usize)> = HashMap::new();

        for (index, group) in groups.into_iter().enumerate() {
            if group.ids.is_empty() {
                continue;
            }
            pending.insert(index, (group.label.clone(), group.ids.len()));
            let store = self.store.clone();
            let table = self.table.clone();
            let sem = self.semaphore.clone();
            let chunk_size = self.chunk_size;

            tasks.spawn(async move {
                let outcome = write_group(store.as_ref(), &table, &sem, group, chunk_size).await;
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(join_result) = tasks.join_next().await {
            match join_result {
                Ok((index, outcome)) => {
                    self.counters.add_updated(outcome.written);
                    self.counters.add_failed(outcome.failed);
                    self.counters.add_skipped(outcome.duplicates);
                    pending.remove(&index);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    log(
                        LogLevel::Error,
                        &format!("Group write task for {} panicked: {}", self.table, e),
                    );
                }
            }
        }

        // Groups whose task died are reported as failed in full.
        for (_, (label, size)) in pending {
            self.counters.add_failed(size);
            outcomes.push(GroupOutcome {
                label,
                failed: size,
                ..GroupOutcome::default()
            });
        }

        outcomes.sort_by(|a, b| a.label.cmp(&b.label));
        outcomes
    }
}

async fn write_group<S: RemoteStore + ?Sized>(
    store: &S,
    table: &str,
    sem: &Arc<Semaphore>,
    group: IntentGroup,
    chunk_size: usize,
) -> GroupOutcome {
    let chunks = chunk_ids(&group.ids, chunk_size);
    let unique: usize = chunks.iter().map(Vec::len).sum();
    let mut outcome = GroupOutcome {
        label: group.label.clone(),
        duplicates: group.ids.len() - unique,
        chunks: chunks.len(),
        ..GroupOutcome::default()
    };

    log(
        LogLevel::Info,
        &format!(
            "Updating {} record(s) to {} in {} chunk(s)...",
            unique,
            group.label,
            utils::chunk_count(unique, chunk_size)
        ),
    );

    for (i, chunk) in chunks.into_iter().enumerate() {
        let chunk_len = chunk.len();
        let result = match utils::acquire_semaphore(sem, "Chunk Write").await {
            Ok(_permit) => {
                store
                    .write_fields(table, &Selector::AnyOf(chunk), &group.fields)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => outcome.written += chunk_len,
            Err(e) => {
                log(
                    LogLevel::Warning,
                    &format!(
                        "{} chunk {}/{} ({} id(s)) FAILED: {}",
                        group.label,
                        i + 1,
                        outcome.chunks,
                        chunk_len,
                        e
                    ),
                );
                outcome.failed += chunk_len;
                outcome.failed_chunks += 1;
            }
        }
    }

    let level = if outcome.failed > 0 {
        LogLevel::Warning
    } else {
        LogLevel::Success
    };
    log(
        level,
        &format!(
            "{} - updated {} record(s), {} failed",
            group.label, outcome.written, outcome.failed
        ),
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_input_without_duplicates() {
        let ids: Vec<RecordId> = (1..=250).rev().collect();
        let chunks = chunk_ids(&ids, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        let flat: Vec<RecordId> = chunks.into_iter().flatten().collect();
        assert_eq!(flat, (1..=250).collect::<Vec<_>>());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let ids: Vec<RecordId> = (0..200).collect();
        let chunks = chunk_ids(&ids, 100);
        assert_eq!(chunks.len(), 2);
        assert!(chunk_ids(&[], 100).is_empty());
    }

    #[test]
    fn repeated_ids_collapse() {
        let chunks = chunk_ids(&[3, 1, 3, 2, 1], 2);
        assert_eq!(chunks, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn groups_follow_first_seen_order() {
        let intents = vec![
            WriteIntent::set(1, "manufacturer", "Foton"),
            WriteIntent::set(2, "manufacturer", "DongFeng"),
            WriteIntent::set(3, "manufacturer", "Foton"),
        ];
        let groups = group_intents(intents);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "manufacturer=Foton");
        assert_eq!(groups[0].ids, vec![1, 3]);
        assert_eq!(groups[1].label, "manufacturer=DongFeng");
        assert_eq!(groups[1].ids, vec![2]);
    }
}
