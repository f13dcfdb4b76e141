use super::{ChanDir, Type, Value, Variable};
use crate::prelude::*;

/// Unary operators.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum UnOpKind {
    /// Pointer dereference `*x`.
    Deref,
    /// Channel receive `<-x`.
    /// With `comma_ok` the result is a `(value, bool)` tuple.
    Recv { comma_ok: bool },
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
    /// Bitwise complement.
    Xor,
}

/// One communication case of a `select` statement.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct SelectState {
    /// The channel of the case.
    pub chan: Value,
    /// `Send` or `Recv`.
    pub dir: ChanDir,
    /// The value sent for send cases.
    pub send: Option<Value>,
}

/// The operands shared by `Call`, `Go` and `Defer` instructions.
///
/// If `method` is set, the call is an interface method invocation ("invoke mode"):
/// `value` is the interface-typed receiver and `method` the name of the invoked method.
/// Otherwise `value` is the called function, which may be a function constant (static call),
/// a built-in or an arbitrary function-typed value (dynamic call).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct CallCommon {
    /// The callee or, in invoke mode, the receiver.
    pub value: Value,
    /// The name of the invoked interface method in invoke mode.
    pub method: Option<String>,
    /// The arguments of the call. In invoke mode the receiver is not contained.
    pub args: Vec<Value>,
}

impl CallCommon {
    /// A call of the function or function value `value`.
    pub fn call(value: Value, args: Vec<Value>) -> CallCommon {
        CallCommon {
            value,
            method: None,
            args,
        }
    }

    /// An invocation of `method` on the interface-typed `receiver`.
    pub fn invoke(receiver: Value, method: impl ToString, args: Vec<Value>) -> CallCommon {
        CallCommon {
            value: receiver,
            method: Some(method.to_string()),
            args,
        }
    }

    /// Returns `true` for interface invocations and calls through function values.
    pub fn is_dynamic(&self) -> bool {
        self.method.is_some() || !matches!(self.value, Value::Function(_) | Value::Builtin(_))
    }
}

/// An instruction of the program representation.
///
/// Instructions producing a value name their result register.
/// The result registers of tuple-valued instructions (comma-ok forms, `Select`, `Next`, calls with several results)
/// have tuple types.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum Instr {
    /// Allocation of a new variable; `result` is a pointer to it.
    Alloc { result: Variable },
    /// `*address = value`
    Store { address: Value, value: Value },
    /// A unary operation.
    UnOp {
        result: Variable,
        op: UnOpKind,
        operand: Value,
    },
    /// A binary operation.
    BinOp {
        result: Variable,
        lhs: Value,
        rhs: Value,
    },
    /// An SSA phi node with one incoming value per predecessor block.
    Phi { result: Variable, edges: Vec<Value> },
    /// Wrap a concrete value into an interface.
    MakeInterface { result: Variable, value: Value },
    /// Convert an interface value to another interface type.
    ChangeInterface { result: Variable, value: Value },
    /// A conversion between types with identical underlying types.
    ChangeType { result: Variable, value: Value },
    /// A value-changing conversion, e.g. between numeric types.
    Convert { result: Variable, value: Value },
    /// A type assertion `value.(asserted)`.
    TypeAssert {
        result: Variable,
        value: Value,
        asserted: Type,
        comma_ok: bool,
    },
    /// Extract the element at `index` of a tuple-typed value.
    Extract {
        result: Variable,
        tuple: Value,
        index: usize,
    },
    /// Read field number `field` of a struct value.
    Field {
        result: Variable,
        value: Value,
        field: usize,
    },
    /// Take the address of field number `field` of the struct `value` points to.
    FieldAddr {
        result: Variable,
        value: Value,
        field: usize,
    },
    /// Read an element of an array, slice or string.
    Index {
        result: Variable,
        value: Value,
        index: Value,
    },
    /// Take the address of an element of a slice or of an array behind a pointer.
    IndexAddr {
        result: Variable,
        value: Value,
        index: Value,
    },
    /// Map or string lookup `map[key]`.
    Lookup {
        result: Variable,
        map: Value,
        key: Value,
        comma_ok: bool,
    },
    /// `map[key] = value`
    MapUpdate { map: Value, key: Value, value: Value },
    /// Creation of a new map.
    MakeMap { result: Variable },
    /// Creation of a new channel.
    MakeChan { result: Variable },
    /// Creation of a new slice.
    MakeSlice { result: Variable },
    /// Slicing of a slice, string or array pointer.
    Slice { result: Variable, value: Value },
    /// Conversion of a slice to a pointer to an array.
    SliceToArrayPointer { result: Variable, value: Value },
    /// `chan <- value`
    Send { chan: Value, value: Value },
    /// A select statement.
    /// The result is a tuple `(index, recvOk, r_0, r_1, ...)` with one `r_i` per receive case.
    Select {
        result: Variable,
        states: Vec<SelectState>,
        blocking: bool,
    },
    /// Creation of an iterator over a map or string.
    Range { result: Variable, value: Value },
    /// Advance an iterator. The result is a tuple `(ok, key, value)`.
    Next {
        result: Variable,
        iter: Value,
        is_string: bool,
    },
    /// Creation of a closure of `function` binding the given values to its free variables.
    MakeClosure {
        result: Variable,
        function: Tid,
        bindings: Vec<Value>,
    },
    /// A function call. `result` is absent if the result is not used.
    Call {
        result: Option<Variable>,
        call: CallCommon,
    },
    /// A `go` statement.
    Go { call: CallCommon },
    /// A `defer` statement.
    Defer { call: CallCommon },
    /// `panic(value)`
    Panic { value: Value },
    /// Return from the enclosing function.
    Return { results: Vec<Value> },
    /// An unconditional intraprocedural jump.
    Jump,
    /// A conditional intraprocedural jump.
    If { condition: Value },
    /// Execution of deferred calls.
    RunDefers,
}

impl Instr {
    /// Return the call operands for `Call`, `Go` and `Defer` instructions.
    pub fn call_common(&self) -> Option<&CallCommon> {
        match self {
            Instr::Call { call, .. } | Instr::Go { call } | Instr::Defer { call } => Some(call),
            _ => None,
        }
    }
}
