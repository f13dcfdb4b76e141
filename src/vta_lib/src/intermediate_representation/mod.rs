//! This module defines the intermediate representation used to represent a whole program
//! in static single assignment form.
//!
//! The main data structure is the `Program` struct,
//! which contains all functions of the program and the definitions of its named types.
//! To learn how individual instructions are encoded,
//! you should first take a look at the `Value` and `Type` types and then at the `Instr` data type,
//! which forms the basis of the basic block `Blk` struct.
//!
//! Generic functions are contained once per instantiation,
//! so that analyses never have to substitute type parameters themselves.

mod term;
pub use term::*;
mod types;
pub use types::*;
mod value;
pub use value::*;
mod instruction;
pub use instruction::*;
mod function;
pub use function::*;
mod program;
pub use program::*;
