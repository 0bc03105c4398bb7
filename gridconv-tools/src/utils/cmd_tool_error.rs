/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use gridconv::ConvError;

/// Error type for the command line tools.
///
/// Tools flatten every failure into a printable message; structured kinds
/// live in [`ConvError`] and stop mattering once the run has to abort anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CMDToolError {
    pub details: String,
}

impl std::fmt::Display for CMDToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl std::error::Error for CMDToolError {}

impl From<ConvError> for CMDToolError {
    fn from(err: ConvError) -> Self {
        CMDToolError {
            details: err.to_string(),
        }
    }
}
