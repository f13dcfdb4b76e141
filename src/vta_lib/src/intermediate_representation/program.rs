use super::{Function, InterfaceMethod, Signature, Type, TypeName};
use crate::prelude::*;
use std::collections::BTreeMap;

/// A method declared on a named type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Method {
    /// The name of the method.
    pub name: String,
    /// Whether the method is declared on the pointer type `*T` instead of `T`.
    pub pointer_receiver: bool,
    /// The term identifier of the function implementing the method.
    pub function: Tid,
}

/// The definition of a named type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct NamedType {
    /// The package-qualified name of the type.
    pub name: TypeName,
    /// The underlying type. Never a named type itself.
    pub underlying: Type,
    /// The methods declared on the type or on its pointer type.
    #[serde(default)]
    pub methods: Vec<Method>,
}

impl NamedType {
    /// Create a new named type without methods.
    pub fn new(name: &str, underlying: Type) -> NamedType {
        NamedType {
            name: name.into(),
            underlying,
            methods: Vec::new(),
        }
    }

    /// Add a method implemented by the function `function` to the type.
    pub fn with_method(mut self, name: &str, pointer_receiver: bool, function: &str) -> NamedType {
        self.methods.push(Method {
            name: name.to_string(),
            pointer_receiver,
            function: Tid::new(function),
        });
        self
    }
}

/// The method set of a concrete type:
/// for each method name its signature and the function implementing it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct MethodSet {
    methods: BTreeMap<String, (Signature, Tid)>,
}

impl MethodSet {
    /// Returns `true` if the method set contains every method required by an interface.
    pub fn implements(&self, interface_methods: &[InterfaceMethod]) -> bool {
        interface_methods.iter().all(|required| {
            matches!(self.methods.get(&required.name), Some((signature, _)) if *signature == required.signature)
        })
    }

    /// Return the function implementing the method with the given name.
    pub fn lookup(&self, name: &str) -> Option<&Tid> {
        self.methods.get(name).map(|(_, function)| function)
    }

    /// Returns `true` if the method set is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// The `Program` structure represents a whole program in SSA form.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    /// The functions of the program, including methods, closures and generic instantiations.
    pub functions: BTreeMap<Tid, Term<Function>>,
    /// The named types of the program.
    pub types: BTreeMap<TypeName, NamedType>,
}

impl Program {
    /// Add a function to the program.
    /// The ID of the term identifier is the name of the function.
    pub fn add_function(&mut self, function: Function) -> Tid {
        let tid = Tid::new(&function.name);
        self.functions.insert(
            tid.clone(),
            Term {
                tid: tid.clone(),
                term: function,
            },
        );
        tid
    }

    /// Add a named type to the program.
    pub fn add_named_type(&mut self, named_type: NamedType) {
        self.types.insert(named_type.name.clone(), named_type);
    }

    /// Find a function by its term identifier.
    pub fn function(&self, tid: &Tid) -> Result<&Term<Function>, Error> {
        self.functions
            .get(tid)
            .ok_or_else(|| anyhow!("Unknown function {}", tid))
    }

    /// Find the definition of a named type.
    pub fn named_type(&self, name: &TypeName) -> Result<&NamedType, Error> {
        self.types
            .get(name)
            .ok_or_else(|| anyhow!("Unknown named type {}", name))
    }

    /// Iterate over all functions whose bodies are available.
    pub fn functions_with_body(&self) -> impl Iterator<Item = &Term<Function>> {
        self.functions
            .values()
            .filter(|function| function.term.has_body())
    }

    /// Return the underlying type of a type.
    ///
    /// This is the type itself for all types except named types.
    pub fn underlying<'a>(&'a self, ty: &'a Type) -> Result<&'a Type, Error> {
        match ty {
            Type::Named(name) => {
                let underlying = &self.named_type(name)?.underlying;
                if let Type::Named(_) = underlying {
                    Err(anyhow!("Underlying type of {} is a named type", name))
                } else {
                    Ok(underlying)
                }
            }
            _ => Ok(ty),
        }
    }

    /// Returns `true` if the underlying type is an interface.
    pub fn is_interface(&self, ty: &Type) -> Result<bool, Error> {
        Ok(matches!(self.underlying(ty)?, Type::Interface(_)))
    }

    /// Returns `true` if the underlying type is a function type.
    pub fn is_function(&self, ty: &Type) -> Result<bool, Error> {
        Ok(matches!(self.underlying(ty)?, Type::Signature(_)))
    }

    /// Return the methods required by an interface type
    /// or `None` if the type is not an interface.
    pub fn interface_methods<'a>(
        &'a self,
        ty: &'a Type,
    ) -> Result<Option<&'a [InterfaceMethod]>, Error> {
        match self.underlying(ty)? {
            Type::Interface(methods) => Ok(Some(methods)),
            _ => Ok(None),
        }
    }

    /// Compute the method set of a concrete type.
    ///
    /// The method set of a named type `T` contains the methods declared with value receiver,
    /// the method set of `*T` contains all methods declared on `T`.
    /// Interface types and unnamed types have empty method sets.
    pub fn method_set(&self, ty: &Type) -> Result<MethodSet, Error> {
        let (name, include_pointer_methods) = match ty {
            Type::Named(name) => (name, false),
            Type::Pointer(elem) => match elem.as_ref() {
                Type::Named(name) => (name, true),
                _ => return Ok(MethodSet::default()),
            },
            _ => return Ok(MethodSet::default()),
        };
        let named_type = self.named_type(name)?;
        if let Type::Interface(_) = named_type.underlying {
            return Ok(MethodSet::default());
        }
        let mut method_set = MethodSet::default();
        for method in named_type
            .methods
            .iter()
            .filter(|method| include_pointer_methods || !method.pointer_receiver)
        {
            let signature = self
                .function(&method.function)
                .with_context(|| format!("Method {} of {}", method.name, name))?
                .term
                .signature
                .clone();
            method_set
                .methods
                .insert(method.name.clone(), (signature, method.function.clone()));
        }
        Ok(method_set)
    }
}
