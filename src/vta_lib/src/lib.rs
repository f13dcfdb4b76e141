/*!
The main library of the VTA call graph analysis.

# What is VTA

Variable type analysis (VTA) is a static analysis that computes more precise call graphs
for programs with interfaces and first-class functions.
Starting from a conservative baseline call graph computed by class hierarchy analysis (CHA),
it tracks which concrete types may flow into each value of the program.
The callees of dynamic call sites, i.e. interface method invocations and calls through function values,
are then restricted to the methods and functions of the types actually reaching them.

The analyses work on an SSA-like [intermediate representation](crate::intermediate_representation)
of a whole program, including its named types and their method sets.

# Usage

The [`run`] function computes the refined call graph of a program.
The behaviour of the analysis can be modified through a configuration in JSON format.
Without an explicit configuration, `config.json` in the configuration directory of the user is used if it exists,
and the bundled standard configuration otherwise.
Start by taking a look at the standard configuration file located at `src/config.json`
and read the [analysis documentation](crate::analysis::vta) for more details about each field.

Both analyses are also available separately:
[`analysis::cha::compute_call_graph`] for the baseline call graph
and [`analysis::vta::compute_call_graph`] for refining a given baseline call graph.
*/

pub mod analysis;
pub mod intermediate_representation;
pub mod utils;

use analysis::callgraph::CallGraph;
use intermediate_representation::Program;
use utils::log::LogMessage;

mod prelude {
    pub use serde::{Deserialize, Serialize};

    pub use crate::intermediate_representation::{Term, Tid};
    pub use anyhow::{anyhow, Context, Error};
}
use prelude::*;

/// Compute the refined call graph of the program.
///
/// The configuration of the variable type analysis is read from the `VTA` entry of `config`.
/// If no configuration is given, the configuration file of the user or the bundled configuration is used.
/// If the entry is missing, the default configuration is used.
/// The returned log messages contain the messages of both the baseline and the refining analysis.
pub fn run(
    program: &Program,
    config: Option<&serde_json::Value>,
) -> Result<(CallGraph, Vec<LogMessage>), Error> {
    let loaded;
    let config = match config {
        Some(config) => config,
        None => {
            loaded = match utils::read_config_file("config.json") {
                Ok(config) => config,
                Err(_) => utils::default_config()?,
            };
            &loaded
        }
    };
    let vta_config: analysis::vta::Config = match config.get("VTA") {
        Some(vta_config) => serde_json::from_value(vta_config.clone())
            .context("Invalid configuration of the VTA analysis")?,
        None => analysis::vta::Config::default(),
    };
    let (baseline, mut logs) = analysis::cha::compute_call_graph(program)?;
    let (callgraph, vta_logs) =
        analysis::vta::compute_call_graph(program, &baseline, &vta_config)?;
    logs.extend(vta_logs);
    utils::log::add_debug_log_statistics(&mut logs);
    Ok((callgraph, logs))
}
