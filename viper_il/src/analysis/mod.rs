// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural analyses over IL functions.

pub mod bitset;
pub mod cfg;
pub(crate) mod dataflow;
pub mod dominators;
pub mod liveness;
pub mod loops;

pub use cfg::{BlockRef, CfgContext, FunctionCfg};
pub use dominators::DomTree;
pub use loops::{NaturalLoop, natural_loops};
