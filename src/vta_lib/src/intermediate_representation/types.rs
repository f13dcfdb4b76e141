use crate::prelude::*;
use derive_more::{Display, From};
use itertools::Itertools;
use std::fmt;

/// The package-qualified name of a defined type, e.g. `pkg.T`.
///
/// Named types are compared by name only.
/// Their underlying types and methods are stored in the [`Program`](super::Program).
#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Display, From,
)]
#[serde(transparent)]
pub struct TypeName(String);

impl From<&str> for TypeName {
    fn from(name: &str) -> TypeName {
        TypeName(name.to_string())
    }
}

/// Predeclared basic types.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum BasicKind {
    Bool,
    Int,
    Int64,
    Uint8,
    Float64,
    String,
    UnsafePointer,
}

impl fmt::Display for BasicKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int64 => "int64",
            BasicKind::Uint8 => "byte",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
        };
        write!(formatter, "{name}")
    }
}

/// The direction of a channel type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum ChanDir {
    /// A bidirectional channel.
    Both,
    /// A send-only channel.
    Send,
    /// A receive-only channel.
    Recv,
}

/// A field of a struct type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct StructField {
    /// The name of the field.
    pub name: String,
    /// The type of the field.
    pub ty: Type,
}

/// A method name together with its signature (without the receiver).
///
/// Used both for the methods declared by interface types
/// and for the elements of the method set of a concrete type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct InterfaceMethod {
    /// The name of the method.
    pub name: String,
    /// The signature of the method.
    pub signature: Signature,
}

impl InterfaceMethod {
    /// Create a new method name/signature pair.
    pub fn new(name: impl ToString, signature: Signature) -> InterfaceMethod {
        InterfaceMethod {
            name: name.to_string(),
            signature,
        }
    }
}

/// A function signature.
///
/// The receiver of methods is not part of the signature,
/// so that a method and a function value with the same parameters have identical signatures.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Default)]
pub struct Signature {
    /// Parameter types.
    /// For variadic signatures the last parameter is a slice type.
    pub params: Vec<Type>,
    /// Result types.
    pub results: Vec<Type>,
    /// Whether the last parameter is variadic.
    #[serde(default)]
    pub variadic: bool,
}

impl Signature {
    /// Create a new non-variadic signature.
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Signature {
        Signature {
            params,
            results,
            variadic: false,
        }
    }

    /// Format the signature without the leading `func` keyword.
    fn fmt_tail(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let last = self.params.len().saturating_sub(1);
        let params = self
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| match param {
                Type::Slice(elem) if self.variadic && index == last => format!("...{elem}"),
                _ => param.to_string(),
            })
            .join(", ");
        write!(formatter, "({params})")?;
        match &self.results[..] {
            [] => Ok(()),
            [single] => write!(formatter, " {single}"),
            results => write!(formatter, " ({})", results.iter().join(", ")),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "func")?;
        self.fmt_tail(formatter)
    }
}

/// The static type of a value in the program representation.
///
/// Types are compared structurally, except for named types which are compared by name.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Type {
    /// A predeclared basic type.
    Basic(BasicKind),
    /// A defined type. Its definition is stored in the program.
    Named(TypeName),
    /// A pointer to the element type.
    Pointer(Box<Type>),
    /// A slice with the given element type.
    Slice(Box<Type>),
    /// An array with element type and length.
    Array(Box<Type>, u64),
    /// A map with key and value type.
    Map(Box<Type>, Box<Type>),
    /// A channel with element type and direction.
    Chan(Box<Type>, ChanDir),
    /// A struct type with its fields in declaration order.
    Struct(Vec<StructField>),
    /// An interface type with the methods it requires.
    Interface(Vec<InterfaceMethod>),
    /// A function type.
    Signature(Signature),
    /// The type of a register holding several values at once,
    /// e.g. the results of a call or a comma-ok expression.
    Tuple(Vec<Type>),
}

impl Type {
    /// The `bool` type.
    pub fn bool() -> Type {
        Type::Basic(BasicKind::Bool)
    }

    /// The `int` type.
    pub fn int() -> Type {
        Type::Basic(BasicKind::Int)
    }

    /// The `string` type.
    pub fn string() -> Type {
        Type::Basic(BasicKind::String)
    }

    /// The `byte` type.
    pub fn byte() -> Type {
        Type::Basic(BasicKind::Uint8)
    }

    /// A reference to the named type `name`.
    pub fn named(name: &str) -> Type {
        Type::Named(name.into())
    }

    /// A pointer to `elem`.
    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    /// A slice of `elem`.
    pub fn slice(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    /// An array of `len` elements of type `elem`.
    pub fn array(elem: Type, len: u64) -> Type {
        Type::Array(Box::new(elem), len)
    }

    /// A map from `key` to `value`.
    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    /// A bidirectional channel of `elem`.
    pub fn chan(elem: Type) -> Type {
        Type::Chan(Box::new(elem), ChanDir::Both)
    }

    /// A function type with the given parameter and result types.
    pub fn func(params: Vec<Type>, results: Vec<Type>) -> Type {
        Type::Signature(Signature::new(params, results))
    }

    /// An interface type requiring the given methods.
    pub fn interface(methods: Vec<InterfaceMethod>) -> Type {
        Type::Interface(methods)
    }

    /// The empty interface `interface{}`.
    pub fn empty_interface() -> Type {
        Type::Interface(Vec::new())
    }

    /// A struct type with the given `(name, type)` fields.
    pub fn structure(fields: Vec<(&str, Type)>) -> Type {
        Type::Struct(
            fields
                .into_iter()
                .map(|(name, ty)| StructField {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        )
    }

    /// A tuple type.
    pub fn tuple(types: Vec<Type>) -> Type {
        Type::Tuple(types)
    }

    /// If the type itself (not its underlying type) is a pointer, return the element type.
    pub fn pointer_elem(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// If the type is a tuple, return its element at `index`.
    pub fn tuple_elem(&self, index: usize) -> Option<&Type> {
        match self {
            Type::Tuple(types) => types.get(index),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Basic(kind) => write!(formatter, "{kind}"),
            Type::Named(name) => write!(formatter, "{name}"),
            Type::Pointer(elem) => write!(formatter, "*{elem}"),
            Type::Slice(elem) => write!(formatter, "[]{elem}"),
            Type::Array(elem, len) => write!(formatter, "[{len}]{elem}"),
            Type::Map(key, value) => write!(formatter, "map[{key}]{value}"),
            Type::Chan(elem, ChanDir::Both) => write!(formatter, "chan {elem}"),
            Type::Chan(elem, ChanDir::Send) => write!(formatter, "chan<- {elem}"),
            Type::Chan(elem, ChanDir::Recv) => write!(formatter, "<-chan {elem}"),
            Type::Struct(fields) => write!(
                formatter,
                "struct{{{}}}",
                fields
                    .iter()
                    .map(|field| format!("{} {}", field.name, field.ty))
                    .join("; ")
            ),
            Type::Interface(methods) => {
                write!(formatter, "interface{{")?;
                for (index, method) in methods.iter().enumerate() {
                    if index > 0 {
                        write!(formatter, "; ")?;
                    }
                    write!(formatter, "{}", method.name)?;
                    method.signature.fmt_tail(formatter)?;
                }
                write!(formatter, "}}")
            }
            Type::Signature(signature) => write!(formatter, "{signature}"),
            Type::Tuple(types) => write!(formatter, "({})", types.iter().join(", ")),
        }
    }
}
