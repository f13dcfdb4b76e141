//! Modules necessary for graph-based and fixpoint-based analyses,
//! as well as the call graph analyses depending on these modules.

pub mod callgraph;
pub mod cha;
pub mod fixpoint;
pub mod vta;
