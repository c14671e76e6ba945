//! Paired image / label tensors.

use std::ops::Range;

use aero_types::{Batch, Matrix};

use crate::error::{DatasetError, Result};

/// A labeled set of images: `xs` is `[n, h, w, c]`, `ys` is `[n, classes]`.
///
/// Row `i` of `ys` is the one-hot label of image `i` of `xs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    xs: Batch,
    ys: Matrix,
}

impl Dataset {
    /// Pairs images with labels.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::LabelMismatch`] if the image count differs from
    /// the label row count.
    pub fn new(xs: Batch, ys: Matrix) -> Result<Self> {
        if xs.batch_size() != ys.rows() {
            return Err(DatasetError::label_mismatch(xs.batch_size(), ys.rows()));
        }
        Ok(Self { xs, ys })
    }

    /// Returns the images.
    #[must_use]
    pub const fn xs(&self) -> &Batch {
        &self.xs
    }

    /// Returns the labels.
    #[must_use]
    pub const fn ys(&self) -> &Matrix {
        &self.ys
    }

    /// Splits into `(xs, ys)`.
    #[must_use]
    pub fn into_parts(self) -> (Batch, Matrix) {
        (self.xs, self.ys)
    }

    /// Returns the number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.xs.batch_size()
    }

    /// Returns `true` if there are no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Returns the label width (number of classes).
    #[must_use]
    pub const fn label_width(&self) -> usize {
        self.ys.cols()
    }

    /// Returns the samples at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error for an index past the end.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        Ok(Self {
            xs: self.xs.select(indices)?,
            ys: self.ys.select(indices)?,
        })
    }

    /// Returns the contiguous samples in `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range ends past the dataset.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        Ok(Self {
            xs: self.xs.slice(range.clone())?,
            ys: self.ys.slice(range)?,
        })
    }

    /// Splits into consecutive mini-batches of at most `batch_size` samples.
    ///
    /// The last batch holds the remainder. A `batch_size` of zero is treated
    /// as one.
    ///
    /// # Errors
    ///
    /// Propagates slicing errors.
    pub fn batches(&self, batch_size: usize) -> Result<Vec<Self>> {
        let batch_size = batch_size.max(1);
        (0..self.len())
            .step_by(batch_size)
            .map(|start| self.slice(start..(start + batch_size).min(self.len())))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn dataset(n: usize) -> Dataset {
        let xs = Batch::new([n, 1, 1, 1], (0..n).map(|i| i as f32).collect()).unwrap();
        let ys = Matrix::one_hot(&(0..n).map(|i| i % 2).collect::<Vec<_>>(), 2).unwrap();
        Dataset::new(xs, ys).unwrap()
    }

    #[test]
    fn new_rejects_count_mismatch() {
        let xs = Batch::zeros([3, 1, 1, 1]);
        let ys = Matrix::one_hot(&[0, 1], 2).unwrap();
        assert!(matches!(
            Dataset::new(xs, ys),
            Err(DatasetError::LabelMismatch { images: 3, labels: 2 })
        ));
    }

    #[test]
    fn select_keeps_pairs_together() {
        let ds = dataset(4);
        let picked = ds.select(&[3, 0]).unwrap();
        assert_eq!(picked.xs().data(), &[3.0, 0.0]);
        assert_eq!(picked.ys().argmax(0), Some(1));
        assert_eq!(picked.ys().argmax(1), Some(0));
    }

    #[test]
    fn batches_cover_all_samples() {
        let ds = dataset(5);
        let batches = ds.batches(2).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches.iter().map(Dataset::len).sum::<usize>(), 5);
    }

    #[test]
    fn batches_of_empty_dataset() {
        let ds = dataset(0);
        assert!(ds.is_empty());
        assert!(ds.batches(4).unwrap().is_empty());
    }
}
