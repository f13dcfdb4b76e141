//! The nodes of the type propagation graph.

use crate::intermediate_representation::*;
use crate::prelude::*;
use std::fmt;

/// The identity of a register: the function it belongs to and the register itself.
///
/// Register names are only unique inside a function,
/// and each instantiation of a generic function is a function of its own.
/// So registers of different functions or of different instantiations never share an identity.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LocalId {
    /// The function containing the register.
    pub function: Tid,
    /// The register.
    pub var: Variable,
}

impl LocalId {
    /// Create the identity of the register `var` of `function`.
    pub fn new(function: &Tid, var: &Variable) -> LocalId {
        LocalId {
            function: function.clone(),
            var: var.clone(),
        }
    }
}

/// A node of the type propagation graph.
///
/// Nodes represent either values of the program (registers, constants, globals, functions)
/// or abstract memory locations that values can be stored to and loaded from
/// (pointees, map keys and values, slice and channel elements, struct fields).
/// Two nodes are equal if and only if they represent the same value or location.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Node {
    /// A constant of the given type.
    Constant(Type),
    /// The location a pointer of the given pointer type points to.
    Pointer(Type),
    /// The keys of all maps with the given key type.
    MapKey(Type),
    /// The values of all maps with the given value type.
    MapValue(Type),
    /// The elements of all slices and arrays with the given element type.
    SliceElem(Type),
    /// The elements of all channels with the given element type.
    ChannelElem(Type),
    /// A field of all structs of the given type.
    Field {
        /// The type of the struct, e.g. a named type with a struct as underlying type.
        struct_type: Type,
        /// The index of the field.
        index: usize,
        /// The name of the field.
        name: String,
        /// The type of the field.
        ty: Type,
    },
    /// A package-level variable.
    Global {
        /// The name of the global.
        name: String,
        /// The type of the global's address.
        ty: Type,
    },
    /// A register, parameter or free variable.
    Local(LocalId),
    /// An element of a register of tuple type.
    IndexedLocal {
        /// The tuple-typed register.
        local: LocalId,
        /// The index of the element inside the tuple.
        index: usize,
        /// The type of the element.
        ty: Type,
    },
    /// A function used as a value.
    Function {
        /// The function.
        function: Tid,
        /// The signature of the function.
        ty: Type,
    },
    /// Locations behind (possibly nested) pointers to the given interface type.
    NestedPtrInterface(Type),
    /// Locations behind (possibly nested) pointers to the given function type.
    NestedPtrFunction(Type),
    /// The arguments of all `panic` calls of the program.
    PanicArg,
    /// The results of all `recover` calls of the program.
    RecoverReturn,
}

impl Node {
    /// Get the static type of the node.
    /// Returns `None` for the `PanicArg` and `RecoverReturn` nodes.
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Node::Constant(ty)
            | Node::Pointer(ty)
            | Node::MapKey(ty)
            | Node::MapValue(ty)
            | Node::SliceElem(ty)
            | Node::ChannelElem(ty)
            | Node::Field { ty, .. }
            | Node::Global { ty, .. }
            | Node::IndexedLocal { ty, .. }
            | Node::Function { ty, .. }
            | Node::NestedPtrInterface(ty)
            | Node::NestedPtrFunction(ty) => Some(ty),
            Node::Local(local) => Some(&local.var.ty),
            Node::PanicArg | Node::RecoverReturn => None,
        }
    }

    /// Get the function represented by a `Function` node.
    pub fn function(&self) -> Option<&Tid> {
        match self {
            Node::Function { function, .. } => Some(function),
            _ => None,
        }
    }

    /// Returns `true` for the `PanicArg` and `RecoverReturn` nodes shared by the whole program.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Node::PanicArg | Node::RecoverReturn)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Constant(ty) => write!(formatter, "Constant({ty})"),
            Node::Pointer(ty) => write!(formatter, "Pointer({ty})"),
            Node::MapKey(ty) => write!(formatter, "MapKey({ty})"),
            Node::MapValue(ty) => write!(formatter, "MapValue({ty})"),
            Node::SliceElem(ty) => write!(formatter, "Slice([]{ty})"),
            Node::ChannelElem(ty) => write!(formatter, "Channel(chan {ty})"),
            Node::Field {
                struct_type, name, ..
            } => write!(formatter, "Field({struct_type}:{name})"),
            Node::Global { name, .. } => write!(formatter, "Global({name})"),
            Node::Local(local) => write!(formatter, "Local({})", local.var),
            Node::IndexedLocal { local, index, .. } => {
                write!(formatter, "Local({}[{index}])", local.var)
            }
            Node::Function { function, .. } => write!(formatter, "Function({function})"),
            Node::NestedPtrInterface(ty) => write!(formatter, "PtrInterface({ty})"),
            Node::NestedPtrFunction(ty) => write!(formatter, "PtrFunction({ty})"),
            Node::PanicArg => write!(formatter, "Panic"),
            Node::RecoverReturn => write!(formatter, "Recover"),
        }
    }
}
