// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transformation passes and the [`PassManager`].
//!
//! Each pass module exposes a per-function entry point (useful for tests and tools) plus a
//! [`Pass`] wrapper registered under its pipeline name in [`PassRegistry`].

pub mod check_opt;
pub mod cse;
pub mod dce;
pub mod dse;
pub mod licm;
pub mod mem2reg;
pub mod pass_manager;
pub mod peephole;
pub mod sccp;
pub mod simplify_cfg;
mod util;

pub use check_opt::CheckOpt;
pub use cse::{EarlyCse, Gvn};
pub use dce::Dce;
pub use dse::Dse;
pub use licm::Licm;
pub use mem2reg::{Mem2Reg, Mem2RegOptions, Mem2RegStats};
pub use pass_manager::{OptLevel, Pass, PassManager, PassRegistry};
pub use peephole::Peephole;
pub use sccp::{Sccp, SccpStats};
pub use simplify_cfg::SimplifyCfg;
