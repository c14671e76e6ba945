//! Owned host tensors exchanged between pipeline stages.
//!
//! [`Batch`] is a 4-D image batch in `[batch, height, width, channels]`
//! layout and [`Matrix`] is a 2-D `[rows, cols]` array used for one-hot
//! labels and class scores. Both own their storage; every operation that
//! produces a new tensor returns a new value, and storage is released when
//! the value goes out of scope.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// A batch of same-shaped images, `[batch, height, width, channels]`.
///
/// # Example
///
/// ```
/// use aero_types::Batch;
///
/// let batch = Batch::zeros([2, 4, 4, 3]);
/// assert_eq!(batch.batch_size(), 2);
/// assert_eq!(batch.image_len(), 4 * 4 * 3);
/// assert_eq!(batch.data().len(), 2 * 4 * 4 * 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl Batch {
    /// Creates a batch from raw NHWC data.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::DataSizeMismatch`] if `data.len()` is not the
    /// product of `shape`.
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(TypesError::data_size_mismatch(expected, data.len()));
        }
        Ok(Self { shape, data })
    }

    /// Creates a zero-filled batch.
    #[must_use]
    pub fn zeros(shape: [usize; 4]) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Stacks individual HWC images into a batch.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::DataSizeMismatch`] if any image does not hold
    /// exactly `height * width * channels` values.
    pub fn stack(images: &[Vec<f32>], height: usize, width: usize, channels: usize) -> Result<Self> {
        let image_len = height * width * channels;
        let mut data = Vec::with_capacity(images.len() * image_len);
        for image in images {
            if image.len() != image_len {
                return Err(TypesError::data_size_mismatch(image_len, image.len()));
            }
            data.extend_from_slice(image);
        }
        Ok(Self {
            shape: [images.len(), height, width, channels],
            data,
        })
    }

    /// Returns the shape `[batch, height, width, channels]`.
    #[must_use]
    pub const fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Returns the number of images.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.shape[0]
    }

    /// Returns the image height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.shape[1]
    }

    /// Returns the image width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.shape[2]
    }

    /// Returns the channel count.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.shape[3]
    }

    /// Returns the number of values per image.
    #[must_use]
    pub const fn image_len(&self) -> usize {
        self.shape[1] * self.shape[2] * self.shape[3]
    }

    /// Returns `true` if the batch holds no images.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    /// Returns the flat NHWC data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the batch and returns its flat NHWC data.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns image `index` as a flat HWC slice.
    #[must_use]
    pub fn image(&self, index: usize) -> Option<&[f32]> {
        let len = self.image_len();
        if index >= self.batch_size() {
            return None;
        }
        self.data.get(index * len..(index + 1) * len)
    }

    /// Returns image `index` as a mutable flat HWC slice.
    pub fn image_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let len = self.image_len();
        if index >= self.batch_size() {
            return None;
        }
        self.data.get_mut(index * len..(index + 1) * len)
    }

    /// Returns a new batch holding the images at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::IndexOutOfRange`] for an index past the end.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let len = self.image_len();
        let mut data = Vec::with_capacity(indices.len() * len);
        for &i in indices {
            let image = self
                .image(i)
                .ok_or_else(|| TypesError::index_out_of_range(i, self.batch_size()))?;
            data.extend_from_slice(image);
        }
        Ok(Self {
            shape: [indices.len(), self.shape[1], self.shape[2], self.shape[3]],
            data,
        })
    }

    /// Returns a new batch holding the contiguous images in `range`.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::IndexOutOfRange`] if the range ends past the batch.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.batch_size() || range.start > range.end {
            return Err(TypesError::index_out_of_range(range.end, self.batch_size()));
        }
        let len = self.image_len();
        Ok(Self {
            shape: [range.len(), self.shape[1], self.shape[2], self.shape[3]],
            data: self.data[range.start * len..range.end * len].to_vec(),
        })
    }

    /// Returns the `(min, max)` over all values, or `None` when empty.
    #[must_use]
    pub fn value_range(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        Some(
            self.data
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                }),
        )
    }
}

/// A row-major 2-D array, `[rows, cols]`.
///
/// # Example
///
/// ```
/// use aero_types::Matrix;
///
/// let labels = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// assert_eq!(labels.rows(), 2);
/// assert_eq!(labels.argmax(1), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a matrix from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::DataSizeMismatch`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(TypesError::data_size_mismatch(rows * cols, data.len()));
        }
        Ok(Self { rows, cols, data })
    }

    /// Creates a matrix from equal-length rows.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::ShapeMismatch`] if rows differ in length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(TypesError::shape_mismatch(
                    format!("row {i} with {cols} columns"),
                    format!("{} columns", row.len()),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Creates a one-hot matrix for the given class indices.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::IndexOutOfRange`] if a class is `>= num_classes`.
    pub fn one_hot(classes: &[usize], num_classes: usize) -> Result<Self> {
        let mut data = vec![0.0; classes.len() * num_classes];
        for (row, &class) in classes.iter().enumerate() {
            if class >= num_classes {
                return Err(TypesError::index_out_of_range(class, num_classes));
            }
            data[row * num_classes + class] = 1.0;
        }
        Ok(Self {
            rows: classes.len(),
            cols: num_classes,
            data,
        })
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the flat row-major data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the matrix and returns its flat row-major data.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns row `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        self.data.get(index * self.cols..(index + 1) * self.cols)
    }

    /// Returns the column index of the largest value in row `index`.
    #[must_use]
    pub fn argmax(&self, index: usize) -> Option<usize> {
        self.row(index)?
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
    }

    /// Returns a new matrix holding the rows at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::IndexOutOfRange`] for an index past the end.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            let row = self
                .row(i)
                .ok_or_else(|| TypesError::index_out_of_range(i, self.rows))?;
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        })
    }

    /// Returns a new matrix holding the contiguous rows in `range`.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::IndexOutOfRange`] if the range ends past the matrix.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.end > self.rows || range.start > range.end {
            return Err(TypesError::index_out_of_range(range.end, self.rows));
        }
        Ok(Self {
            rows: range.len(),
            cols: self.cols,
            data: self.data[range.start * self.cols..range.end * self.cols].to_vec(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn numbered(shape: [usize; 4]) -> Batch {
        #[allow(clippy::cast_precision_loss)]
        let data = (0..shape.iter().product::<usize>()).map(|v| v as f32).collect();
        Batch::new(shape, data).unwrap()
    }

    #[test]
    fn batch_new_checks_length() {
        assert!(Batch::new([1, 2, 2, 1], vec![0.0; 4]).is_ok());
        assert!(matches!(
            Batch::new([1, 2, 2, 1], vec![0.0; 3]),
            Err(TypesError::DataSizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn batch_stack() {
        let batch = Batch::stack(&[vec![1.0; 4], vec![2.0; 4]], 2, 2, 1).unwrap();
        assert_eq!(batch.shape(), [2, 2, 2, 1]);
        assert_eq!(batch.image(1).unwrap(), &[2.0; 4]);

        assert!(Batch::stack(&[vec![1.0; 3]], 2, 2, 1).is_err());
    }

    #[test]
    fn batch_select_and_slice() {
        let batch = numbered([3, 1, 1, 2]);

        let picked = batch.select(&[2, 0]).unwrap();
        assert_eq!(picked.data(), &[4.0, 5.0, 0.0, 1.0]);

        let tail = batch.slice(1..3).unwrap();
        assert_eq!(tail.batch_size(), 2);
        assert_eq!(tail.data(), &[2.0, 3.0, 4.0, 5.0]);

        assert!(batch.select(&[3]).is_err());
        assert!(batch.slice(2..4).is_err());
    }

    #[test]
    fn batch_empty_slice() {
        let batch = numbered([2, 1, 1, 1]);
        let empty = batch.slice(2..2).unwrap();
        assert!(empty.is_empty());
        assert!(empty.value_range().is_none());
    }

    #[test]
    fn batch_value_range() {
        let batch = Batch::new([1, 1, 3, 1], vec![0.5, -1.0, 2.0]).unwrap();
        assert_eq!(batch.value_range(), Some((-1.0, 2.0)));
    }

    #[test]
    fn matrix_from_rows_checks_width() {
        assert!(Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0]]).is_err());
        let empty = Matrix::from_rows(&[]).unwrap();
        assert_eq!(empty.rows(), 0);
    }

    #[test]
    fn matrix_one_hot() {
        let m = Matrix::one_hot(&[2, 0], 3).unwrap();
        assert_eq!(m.data(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(m.argmax(0), Some(2));
        assert!(Matrix::one_hot(&[3], 3).is_err());
    }

    #[test]
    fn matrix_select_and_slice() {
        let m = Matrix::new(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.select(&[2, 1]).unwrap().data(), &[3.0, 2.0]);
        assert_eq!(m.slice(0..1).unwrap().data(), &[1.0]);
        assert!(m.row(3).is_none());
    }
}
