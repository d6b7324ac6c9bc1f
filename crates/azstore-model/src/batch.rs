//! Partition-bounded transaction planning.
//!
//! The table service only accepts atomic transactions whose operations all
//! target one partition and number at most [`MAX_TRANSACTION_SIZE`].
//! [`plan_batches`] turns an arbitrary entity list into chunks that satisfy
//! both rules.

use std::collections::HashMap;

use crate::entity::TableEntity;

/// Maximum number of operations in one entity group transaction
pub const MAX_TRANSACTION_SIZE: usize = 100;

/// Entities sharing one partition key, small enough for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionChunk<'a, T> {
    pub partition_key: &'a str,
    pub items: Vec<&'a T>,
}

impl<T> PartitionChunk<'_, T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Group `entities` by partition key and split each group into chunks of at
/// most `max_size` items.
///
/// Groups appear in the order their partition key is first seen; items keep
/// their input order inside a group. `max_size` is clamped to at least one.
pub fn plan_batches<T: TableEntity>(entities: &[T], max_size: usize) -> Vec<PartitionChunk<'_, T>> {
    let max_size = max_size.max(1);

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&T>> = HashMap::new();
    for entity in entities {
        let pk = entity.partition_key();
        groups
            .entry(pk)
            .or_insert_with(|| {
                order.push(pk);
                Vec::new()
            })
            .push(entity);
    }

    let mut chunks = Vec::new();
    for pk in order {
        let Some(group) = groups.remove(pk) else {
            continue;
        };
        for slice in group.chunks(max_size) {
            chunks.push(PartitionChunk {
                partition_key: pk,
                items: slice.to_vec(),
            });
        }
    }

    chunks
}
