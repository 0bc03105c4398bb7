/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod error;
pub mod kernel;
pub mod metrics;
pub mod partition;
pub mod roles;
pub mod transport;

// Top level exports.
pub use error::conv_error::{ConvError, ConvErrorKind, ConvResult};
