use super::{Instr, Signature, Type, Variable};
use crate::prelude::*;

/// A basic block is a sequence of instructions executed in order.
///
/// The analyses of this crate are flow-insensitive,
/// so the control flow between blocks is not represented explicitly.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct Blk {
    /// The instructions of the block in order of execution.
    pub instrs: Vec<Term<Instr>>,
}

/// A function or method of the program.
///
/// Generic functions are represented by one `Function` per instantiation,
/// with the type arguments of the instantiation listed in `type_args`.
/// Functions without blocks are external, i.e. their bodies are not available.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Function {
    /// The name of the function, e.g. `main` or `(C).f`.
    pub name: String,
    /// The signature of the function, not including the receiver.
    pub signature: Signature,
    /// The receiver register of methods.
    #[serde(default)]
    pub receiver: Option<Variable>,
    /// The parameter registers, not including the receiver.
    #[serde(default)]
    pub params: Vec<Variable>,
    /// The free variables of closures.
    #[serde(default)]
    pub free_vars: Vec<Variable>,
    /// The basic blocks of the function body.
    #[serde(default)]
    pub blocks: Vec<Term<Blk>>,
    /// The type arguments of an instantiation of a generic function.
    #[serde(default)]
    pub type_args: Vec<Type>,
}

impl Function {
    /// Create a new function without receiver, parameters and body.
    pub fn new(name: impl ToString, signature: Signature) -> Function {
        Function {
            name: name.to_string(),
            signature,
            receiver: None,
            params: Vec::new(),
            free_vars: Vec::new(),
            blocks: Vec::new(),
            type_args: Vec::new(),
        }
    }

    /// Returns `true` if the body of the function is available.
    pub fn has_body(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Iterate over the parameters as they are passed at call sites,
    /// i.e. starting with the receiver for methods.
    pub fn call_params(&self) -> impl Iterator<Item = &Variable> {
        self.receiver.iter().chain(self.params.iter())
    }

    /// Iterate over all instructions of the function body.
    pub fn instructions(&self) -> impl Iterator<Item = &Term<Instr>> {
        self.blocks.iter().flat_map(|block| block.term.instrs.iter())
    }
}
