/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Text matrix files.
//!
//! The on-disk layout is a header line `"<rows> <cols>"` followed by one line
//! per row, each value printed with three decimals and a trailing space:
//!
//! ```text
//! 2 3
//! 0.000 1.000 2.000
//! 3.000 4.000 5.000
//! ```
//!
//! Readers only tokenize on whitespace, so fixtures produced by other tools
//! load as long as the header and value count line up.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::views::{DenseStorage, Matrix, MatrixBase, ShapeError};

#[derive(Debug, Error)]
pub enum ReadMatrixError {
    #[error("matrix file is missing its dimension header")]
    MissingHeader,

    #[error("cannot parse {token:?} as a matrix dimension")]
    BadDimension { token: String },

    #[error("matrix dimensions must be at least 1 x 1 (file claims {rows} x {cols})")]
    ZeroDimension { rows: usize, cols: usize },

    #[error("a {rows} x {cols} matrix overflows the addressable element count")]
    Overflow { rows: usize, cols: usize },

    #[error("cannot parse {token:?} as a matrix element")]
    BadValue { token: String },

    #[error("expected {expected} matrix elements, file holds {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteMatrixError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read a matrix from `path`.
///
/// Tokens beyond `rows * cols` values are ignored, matching the reference
/// reader which consumed exactly the declared element count.
pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<Matrix<f32>, ReadMatrixError> {
    let content = std::fs::read_to_string(path)?;
    let mut tokens = content.split_ascii_whitespace();

    let rows = parse_dimension(tokens.next())?;
    let cols = parse_dimension(tokens.next())?;
    if rows == 0 || cols == 0 {
        return Err(ReadMatrixError::ZeroDimension { rows, cols });
    }
    let expected = rows
        .checked_mul(cols)
        .ok_or(ReadMatrixError::Overflow { rows, cols })?;

    let mut data = Vec::with_capacity(expected);
    for token in tokens.by_ref().take(expected) {
        let value: f32 = token
            .parse()
            .map_err(|_| ReadMatrixError::BadValue {
                token: token.to_owned(),
            })?;
        data.push(value);
    }
    if data.len() != expected {
        return Err(ReadMatrixError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    Ok(Matrix::from_vec(data, rows, cols)?)
}

fn parse_dimension(token: Option<&str>) -> Result<usize, ReadMatrixError> {
    let token = token.ok_or(ReadMatrixError::MissingHeader)?;
    token.parse().map_err(|_| ReadMatrixError::BadDimension {
        token: token.to_owned(),
    })
}

/// Write `matrix` to `path` in the text layout described in the module docs.
pub fn write_matrix<P, S>(path: P, matrix: &MatrixBase<S>) -> Result<(), WriteMatrixError>
where
    P: AsRef<Path>,
    S: DenseStorage<Elem = f32>,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{} {}", matrix.nrows(), matrix.ncols())?;
    for row in matrix.row_iter() {
        for value in row {
            write!(writer, "{value:.3} ")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
