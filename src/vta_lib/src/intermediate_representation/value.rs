use super::{Program, Type};
use crate::prelude::*;
use std::fmt;

/// A single-assignment register of a function.
///
/// Registers hold instruction results, function parameters and free variables of closures.
/// Register names are only unique inside the function they belong to.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Variable {
    /// The name of the register, e.g. `t0`.
    pub name: String,
    /// The static type of the register.
    pub ty: Type,
}

impl Variable {
    /// Create a new register.
    pub fn new(name: impl ToString, ty: Type) -> Variable {
        Variable {
            name: name.to_string(),
            ty,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.name)
    }
}

/// An operand of an instruction.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Value {
    /// A register of the enclosing function.
    Var(Variable),
    /// A literal constant.
    Const {
        /// The static type of the constant.
        ty: Type,
        /// The literal, only used for display purposes.
        literal: String,
    },
    /// The address of a package-level variable.
    Global {
        /// The name of the global.
        name: String,
        /// The type of the global's address, i.e. a pointer to its declared type.
        ty: Type,
    },
    /// A function used as a value or as the target of a static call.
    Function(Tid),
    /// A built-in function like `recover` or `append`.
    /// Built-ins may only appear as targets of calls.
    Builtin(String),
}

impl Value {
    /// A register operand.
    pub fn var(name: impl ToString, ty: Type) -> Value {
        Value::Var(Variable::new(name, ty))
    }

    /// A constant operand.
    pub fn constant(literal: impl ToString, ty: Type) -> Value {
        Value::Const {
            ty,
            literal: literal.to_string(),
        }
    }

    /// The address of a global whose declared type is `declared`.
    pub fn global(name: impl ToString, declared: Type) -> Value {
        Value::Global {
            name: name.to_string(),
            ty: Type::pointer(declared),
        }
    }

    /// A function operand.
    pub fn function(id: impl ToString) -> Value {
        Value::Function(Tid::new(id))
    }

    /// A built-in function operand.
    pub fn builtin(name: impl ToString) -> Value {
        Value::Builtin(name.to_string())
    }

    /// Return the static type of the value.
    ///
    /// Function values are typed by the signature of the function.
    /// Returns an error for built-ins and for references to unknown functions.
    pub fn ty(&self, program: &Program) -> Result<Type, Error> {
        match self {
            Value::Var(var) => Ok(var.ty.clone()),
            Value::Const { ty, .. } | Value::Global { ty, .. } => Ok(ty.clone()),
            Value::Function(tid) => Ok(Type::Signature(
                program.function(tid)?.term.signature.clone(),
            )),
            Value::Builtin(name) => Err(anyhow!("Built-in {} has no type", name)),
        }
    }

    /// Returns `true` if the value is a built-in with the given name.
    pub fn is_builtin(&self, builtin_name: &str) -> bool {
        matches!(self, Value::Builtin(name) if name == builtin_name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Var(var) => write!(formatter, "{var}"),
            Value::Const { ty, literal } => write!(formatter, "{literal}:{ty}"),
            Value::Global { name, .. } => write!(formatter, "{name}"),
            Value::Function(tid) => write!(formatter, "{tid}"),
            Value::Builtin(name) => write!(formatter, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types() {
        let program = Program::mock_empty();
        assert_eq!(
            Value::var("t0", Type::int()).ty(&program).unwrap(),
            Type::int()
        );
        assert_eq!(
            Value::global("gl", Type::int()).ty(&program).unwrap(),
            Type::pointer(Type::int())
        );
        assert!(Value::builtin("recover").ty(&program).is_err());
        assert!(Value::function("missing").ty(&program).is_err());
        assert!(Value::builtin("recover").is_builtin("recover"));
        assert_eq!(
            Value::constant("0", Type::named("P.C")).to_string(),
            "0:P.C"
        );
    }
}
