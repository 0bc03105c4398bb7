/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub(crate) mod conv_error;

pub use conv_error::ErrorContext;
