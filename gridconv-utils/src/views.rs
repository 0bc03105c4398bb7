/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Dense row-major matrices over owned or borrowed storage.
//!
//! [`MatrixBase`] is generic over its backing storage so the same type can
//! represent an owned buffer ([`Matrix`]), a read-only window into another
//! matrix ([`MatrixView`]), or a mutable window ([`MutMatrixView`]). Row bands
//! are everywhere in this codebase (slabs travel between ranks as contiguous
//! row ranges), so the API is row-oriented: single rows, row spans, and
//! (parallel) row iterators.

use thiserror::Error;

/// Read access to a contiguous row-major element buffer.
pub trait DenseStorage {
    type Elem;

    fn as_slice(&self) -> &[Self::Elem];
}

/// Write access to a contiguous row-major element buffer.
pub trait DenseStorageMut: DenseStorage {
    fn as_mut_slice(&mut self) -> &mut [Self::Elem];
}

impl<T> DenseStorage for Box<[T]> {
    type Elem = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T> DenseStorageMut for Box<[T]> {
    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

impl<T> DenseStorage for &[T] {
    type Elem = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T> DenseStorage for &mut [T] {
    type Elem = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T> DenseStorageMut for &mut [T] {
    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

/// The storage length does not factor into `rows * cols`, or `cols` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot view {len} elements as a {rows} x {cols} matrix")]
pub struct ShapeError {
    pub rows: usize,
    pub cols: usize,
    pub len: usize,
}

/// A row-major matrix over some [`DenseStorage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixBase<S: DenseStorage> {
    data: S,
    nrows: usize,
    ncols: usize,
}

/// A matrix owning its storage.
pub type Matrix<T> = MatrixBase<Box<[T]>>;

/// An immutable window into another matrix's rows.
pub type MatrixView<'a, T> = MatrixBase<&'a [T]>;

/// A mutable window into another matrix's rows.
pub type MutMatrixView<'a, T> = MatrixBase<&'a mut [T]>;

impl<S: DenseStorage> MatrixBase<S> {
    /// Wrap `data` as a `rows x cols` matrix.
    ///
    /// Fails when the element count does not match or `cols == 0`. Zero-row
    /// matrices are legal; surplus ranks carry them.
    pub fn try_from(data: S, nrows: usize, ncols: usize) -> Result<Self, ShapeError> {
        if ncols == 0 || data.as_slice().len() != nrows * ncols {
            return Err(ShapeError {
                rows: nrows,
                cols: ncols,
                len: data.as_slice().len(),
            });
        }
        Ok(Self { data, nrows, ncols })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.nrows * self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn as_slice(&self) -> &[S::Elem] {
        self.data.as_slice()
    }

    pub fn row(&self, row: usize) -> &[S::Elem] {
        assert!(
            row < self.nrows,
            "tried to access row {row} of a matrix with {} rows",
            self.nrows
        );
        &self.data.as_slice()[row * self.ncols..(row + 1) * self.ncols]
    }

    /// Borrow rows `start .. start + count` as a view.
    pub fn row_span(&self, start: usize, count: usize) -> MatrixView<'_, S::Elem> {
        assert!(
            start + count <= self.nrows,
            "row span {start}..{} exceeds a matrix with {} rows",
            start + count,
            self.nrows
        );
        MatrixBase {
            data: &self.data.as_slice()[start * self.ncols..(start + count) * self.ncols],
            nrows: count,
            ncols: self.ncols,
        }
    }

    pub fn as_view(&self) -> MatrixView<'_, S::Elem> {
        MatrixBase {
            data: self.data.as_slice(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    pub fn row_iter(&self) -> std::slice::ChunksExact<'_, S::Elem> {
        self.data.as_slice().chunks_exact(self.ncols)
    }

    #[cfg(feature = "rayon")]
    pub fn par_row_iter(&self) -> rayon::slice::ChunksExact<'_, S::Elem>
    where
        S::Elem: Sync,
    {
        use rayon::prelude::*;
        self.data.as_slice().par_chunks_exact(self.ncols)
    }

    /// Consume the matrix and return its backing storage.
    pub fn into_inner(self) -> S {
        self.data
    }
}

impl<S: DenseStorageMut> MatrixBase<S> {
    pub fn as_mut_slice(&mut self) -> &mut [S::Elem] {
        self.data.as_mut_slice()
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [S::Elem] {
        assert!(
            row < self.nrows,
            "tried to access row {row} of a matrix with {} rows",
            self.nrows
        );
        &mut self.data.as_mut_slice()[row * self.ncols..(row + 1) * self.ncols]
    }

    /// Borrow rows `start .. start + count` as a mutable view.
    ///
    /// Results returned by remote ranks are received straight into such a
    /// span of the assembled output.
    pub fn row_span_mut(&mut self, start: usize, count: usize) -> MutMatrixView<'_, S::Elem> {
        assert!(
            start + count <= self.nrows,
            "row span {start}..{} exceeds a matrix with {} rows",
            start + count,
            self.nrows
        );
        let ncols = self.ncols;
        MatrixBase {
            data: &mut self.data.as_mut_slice()[start * ncols..(start + count) * ncols],
            nrows: count,
            ncols,
        }
    }

    pub fn as_mut_view(&mut self) -> MutMatrixView<'_, S::Elem> {
        MatrixBase {
            data: self.data.as_mut_slice(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    pub fn row_iter_mut(&mut self) -> std::slice::ChunksExactMut<'_, S::Elem> {
        let ncols = self.ncols;
        self.data.as_mut_slice().chunks_exact_mut(ncols)
    }

    #[cfg(feature = "rayon")]
    pub fn par_row_iter_mut(&mut self) -> rayon::slice::ChunksExactMut<'_, S::Elem>
    where
        S::Elem: Send,
    {
        use rayon::prelude::*;
        let ncols = self.ncols;
        self.data.as_mut_slice().par_chunks_exact_mut(ncols)
    }
}

impl<T> Matrix<T> {
    /// An owned `rows x cols` matrix of default-valued elements.
    pub fn zeros(nrows: usize, ncols: usize) -> Self
    where
        T: Clone + Default,
    {
        assert!(ncols > 0, "matrix width must be at least 1");
        Self {
            data: vec![T::default(); nrows * ncols].into_boxed_slice(),
            nrows,
            ncols,
        }
    }

    /// An owned matrix with every element produced by `f(row, col)`.
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        assert!(ncols > 0, "matrix width must be at least 1");
        let mut data = Vec::with_capacity(nrows * ncols);
        for r in 0..nrows {
            for c in 0..ncols {
                data.push(f(r, c));
            }
        }
        Self {
            data: data.into_boxed_slice(),
            nrows,
            ncols,
        }
    }

    /// An owned matrix taking over `data` in row-major order.
    pub fn from_vec(data: Vec<T>, nrows: usize, ncols: usize) -> Result<Self, ShapeError> {
        Self::try_from(data.into_boxed_slice(), nrows, ncols)
    }
}

impl<S: DenseStorage> std::ops::Index<usize> for MatrixBase<S> {
    type Output = [S::Elem];

    fn index(&self, row: usize) -> &[S::Elem] {
        assert!(
            row < self.nrows,
            "row {row} is out of bounds (max: {})",
            self.nrows
        );
        &self.data.as_slice()[row * self.ncols..(row + 1) * self.ncols]
    }
}

impl<S: DenseStorageMut> std::ops::IndexMut<usize> for MatrixBase<S> {
    fn index_mut(&mut self, row: usize) -> &mut [S::Elem] {
        assert!(
            row < self.nrows,
            "row {row} is out of bounds (max: {})",
            self.nrows
        );
        &mut self.data.as_mut_slice()[row * self.ncols..(row + 1) * self.ncols]
    }
}
