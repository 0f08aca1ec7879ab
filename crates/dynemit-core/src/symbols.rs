//! Declared-symbol metadata supplied by the front end.

use crate::descriptor::TypeDescriptor;
use std::fmt;

/// Identity of a declared symbol (method, lambda or local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Ordinary,
    Constructor,
    AnonymousFunction,
}

/// A parameter of a method or anonymous function.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSymbol {
    pub name: String,
    pub ordinal: usize,
    pub ty: TypeDescriptor,
    /// The method that declares this parameter.
    pub owner: SymbolId,
}

/// A method, constructor or anonymous function.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSymbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: MethodKind,
    pub containing_type: TypeDescriptor,
    pub parameters: Vec<ParameterSymbol>,
    pub return_type: TypeDescriptor,
    pub is_static: bool,
    /// Explicit or inferred type arguments of a generic method.
    pub type_arguments: Vec<TypeDescriptor>,
}

impl MethodSymbol {
    /// A static method returning `void` with no parameters.
    pub fn new(id: SymbolId, name: impl Into<String>, containing_type: TypeDescriptor) -> Self {
        Self {
            id,
            name: name.into(),
            kind: MethodKind::Ordinary,
            containing_type,
            parameters: Vec::new(),
            return_type: TypeDescriptor::Void,
            is_static: true,
            type_arguments: Vec::new(),
        }
    }

    /// An anonymous function; its containing type is the enclosing method's.
    pub fn lambda(id: SymbolId, containing_type: TypeDescriptor) -> Self {
        Self {
            kind: MethodKind::AnonymousFunction,
            ..Self::new(id, format!("<lambda>{}", id.0), containing_type)
        }
    }

    pub fn constructor(id: SymbolId, containing_type: TypeDescriptor) -> Self {
        Self {
            kind: MethodKind::Constructor,
            is_static: false,
            return_type: containing_type.clone(),
            ..Self::new(id, ".ctor", containing_type)
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let ordinal = self.parameters.len();
        self.parameters.push(ParameterSymbol {
            name: name.into(),
            ordinal,
            ty,
            owner: self.id,
        });
        self
    }

    pub fn returns(mut self, ty: TypeDescriptor) -> Self {
        self.return_type = ty;
        self
    }

    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn with_type_args(mut self, type_arguments: Vec<TypeDescriptor>) -> Self {
        self.type_arguments = type_arguments;
        self
    }

    pub fn parameter(&self, ordinal: usize) -> Option<&ParameterSymbol> {
        self.parameters.get(ordinal)
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// `Type.Name(A, B)`, used in diagnostics.
    pub fn display_signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.to_string()).collect();
        format!("{}.{}({})", self.containing_type, self.name, params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSymbol {
    pub name: String,
    pub containing_type: TypeDescriptor,
    pub ty: TypeDescriptor,
    pub is_static: bool,
}

impl FieldSymbol {
    pub fn new(containing_type: TypeDescriptor, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            containing_type,
            ty,
            is_static: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySymbol {
    pub name: String,
    pub containing_type: TypeDescriptor,
    pub ty: TypeDescriptor,
    pub is_static: bool,
}

impl PropertySymbol {
    pub fn new(containing_type: TypeDescriptor, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            containing_type,
            ty,
            is_static: false,
        }
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A local variable declared in a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSymbol {
    pub id: SymbolId,
    pub name: String,
    pub ty: TypeDescriptor,
}

impl LocalSymbol {
    pub fn new(id: SymbolId, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
        }
    }
}
