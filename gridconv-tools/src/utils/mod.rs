/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
pub mod cmd_tool_error;
pub use cmd_tool_error::*;

pub mod bench_inputs;
pub use bench_inputs::*;

pub type CMDResult<T> = Result<T, CMDToolError>;

pub mod tracing;
pub use tracing::{init_subscriber, init_test_subscriber};
