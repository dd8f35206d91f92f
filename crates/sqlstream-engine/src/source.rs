//! Connection sources and cursors

use std::collections::VecDeque;

use sqlstream_ir::CompiledQuery;

use crate::error::BackendError;
use crate::mutation::GeneratedKeys;
use crate::row::RawRow;

/// A live result set.
pub trait RowCursor: Send {
    fn next_raw(&mut self) -> Result<Option<RawRow>, BackendError>;

    /// Rows not yet read, when the cursor knows.
    fn remaining(&self) -> Option<usize> {
        None
    }

    /// Move the unread rows into independent cursors. An empty result means
    /// the cursor cannot be segmented and was left untouched.
    fn split_off(&mut self, _strategy: PartitionStrategy) -> Vec<Box<dyn RowCursor>> {
        Vec::new()
    }
}

/// Executes compiled statements.
///
/// Implementations surface every driver failure as a [`BackendError`] and
/// never retry.
pub trait ConnectionSource: Send + Sync {
    fn query_count(&self, query: &CompiledQuery) -> Result<u64, BackendError>;

    fn query_rows(&self, query: &CompiledQuery) -> Result<Box<dyn RowCursor>, BackendError>;

    /// Run a mutation. With `returning`, the statement yields the generated
    /// keys as its first column and they are appended to `keys`.
    fn execute_mutation(
        &self,
        statement: &CompiledQuery,
        returning: bool,
        keys: GeneratedKeys,
    ) -> Result<(u64, GeneratedKeys), BackendError>;
}

/// How a segmentable cursor is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStrategy {
    /// This many segments of near-equal length
    EvenSegments(usize),
    /// Segments of this many rows; the last may be shorter
    FixedSegments(usize),
}

impl PartitionStrategy {
    pub fn segment_lengths(&self, total: usize) -> Vec<usize> {
        if total == 0 {
            return vec![0];
        }
        match *self {
            PartitionStrategy::EvenSegments(n) => {
                let n = n.clamp(1, total);
                let (base, extra) = (total / n, total % n);
                (0..n).map(|i| base + usize::from(i < extra)).collect()
            }
            PartitionStrategy::FixedSegments(0) => vec![total],
            PartitionStrategy::FixedSegments(size) => {
                let mut lengths = vec![size; total / size];
                if total % size != 0 {
                    lengths.push(total % size);
                }
                lengths
            }
        }
    }
}

/// Cursor over rows already fetched into memory.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<RawRow>,
}

impl BufferedCursor {
    pub fn new(rows: impl IntoIterator<Item = RawRow>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }
}

impl RowCursor for BufferedCursor {
    fn next_raw(&mut self) -> Result<Option<RawRow>, BackendError> {
        Ok(self.rows.pop_front())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn split_off(&mut self, strategy: PartitionStrategy) -> Vec<Box<dyn RowCursor>> {
        let lengths = strategy.segment_lengths(self.rows.len());
        if lengths.len() < 2 {
            return Vec::new();
        }

        let mut rows = std::mem::take(&mut self.rows);
        lengths
            .into_iter()
            .map(|len| {
                let rest = rows.split_off(len);
                let segment = std::mem::replace(&mut rows, rest);
                Box::new(BufferedCursor { rows: segment }) as Box<dyn RowCursor>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_segments() {
        let s = PartitionStrategy::EvenSegments(3);
        assert_eq!(s.segment_lengths(10), vec![4, 3, 3]);
        assert_eq!(s.segment_lengths(2), vec![1, 1]);
        assert_eq!(s.segment_lengths(0), vec![0]);
    }

    #[test]
    fn test_fixed_segments() {
        let s = PartitionStrategy::FixedSegments(4);
        assert_eq!(s.segment_lengths(10), vec![4, 4, 2]);
        assert_eq!(s.segment_lengths(8), vec![4, 4]);
        assert_eq!(PartitionStrategy::FixedSegments(0).segment_lengths(5), vec![5]);
    }
}
