//! Splits statements into fixed-size transaction batches.

use crate::query::InsertStatement;
use std::num::NonZeroUsize;

/// Default number of statements committed per transaction
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// A run of statements committed in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch within its table
    pub index: usize,
    pub statements: Vec<InsertStatement>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Lazy iterator over the batches of one statement list
#[derive(Debug)]
pub struct Batches {
    statements: std::vec::IntoIter<InsertStatement>,
    batch_size: usize,
    next_index: usize,
}

/// Chunk `statements` into batches of exactly `batch_size`, starting at the
/// first statement. Only the last batch may be shorter.
pub fn partition(statements: Vec<InsertStatement>, batch_size: NonZeroUsize) -> Batches {
    Batches {
        statements: statements.into_iter(),
        batch_size: batch_size.get(),
        next_index: 0,
    }
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let statements: Vec<InsertStatement> =
            self.statements.by_ref().take(self.batch_size).collect();
        if statements.is_empty() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Batch { index, statements })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.statements.len().div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches {}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(n: usize) -> Vec<InsertStatement> {
        (0..n)
            .map(|i| InsertStatement::new(format!("insert $x isa t, has id {};", i)))
            .collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_1001_statements_in_batches_of_250() {
        let batches: Vec<Batch> = partition(statements(1001), size(250)).collect();

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![250, 250, 250, 250, 1]);
        assert_eq!(sizes.iter().sum::<usize>(), 1001);
    }

    #[test]
    fn test_concatenation_equals_input() {
        for n in [1, 2, 9, 10, 11, 99, 100, 101] {
            for b in [1, 3, 10, 100, 1000] {
                let input = statements(n);
                let batches: Vec<Batch> = partition(input.clone(), size(b)).collect();

                let joined: Vec<InsertStatement> =
                    batches.iter().flat_map(|b| b.statements.clone()).collect();
                assert_eq!(joined, input, "n={} b={}", n, b);
                assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= b));
                assert!(batches[..batches.len() - 1].iter().all(|batch| batch.len() == b));
                assert_eq!(batches.len(), n.div_ceil(b));
                assert!(batches.iter().enumerate().all(|(i, batch)| batch.index == i));
            }
        }
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert_eq!(partition(Vec::new(), size(10)).count(), 0);
    }

    #[test]
    fn test_size_hint_tracks_remaining() {
        let mut batches = partition(statements(25), size(10));
        assert_eq!(batches.len(), 3);
        batches.next();
        assert_eq!(batches.len(), 2);
    }
}
