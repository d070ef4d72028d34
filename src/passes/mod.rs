//! Built-in passes.

pub mod dce;
pub mod fold;
pub mod loop_info;
pub mod verify;

pub use dce::{DceConfig, DcePass, DceResult, eliminate_dead_code, eliminate_dead_code_with_config};
pub use fold::{FoldPass, FoldStats, fold_all};
pub use loop_info::{LoopInfoConfig, LoopInfoPass, LoopSummary, Vectorizable, analyze_loops};
pub use verify::VerifierPass;
