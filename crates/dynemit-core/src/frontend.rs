//! Interface to the front-end compiler service.
//!
//! The compiler asks a [`SemanticModel`] for the resolved operation tree of a
//! syntax node and for the declarations of source-local methods it calls.
//! [`SourceCompilation`] is an in-memory model built directly from operation
//! trees.

use crate::operation::Operation;
use crate::symbols::{MethodSymbol, SymbolId};
use rustc_hash::FxHashMap;

/// Identity of a syntax node in the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxId(pub u32);

/// A source method: its symbol and resolved body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub symbol: MethodSymbol,
    pub body: Operation,
}

/// What a syntax node declares.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Method(MethodDeclaration),
    Expression(Operation),
    /// Anything else (type declarations, namespaces, ...).
    Other { kind: String },
}

impl Declaration {
    pub fn kind_name(&self) -> &str {
        match self {
            Declaration::Method(_) => "method declaration",
            Declaration::Expression(_) => "expression",
            Declaration::Other { kind } => kind,
        }
    }
}

/// Semantic queries the compiler needs from the front end.
pub trait SemanticModel: Send + Sync {
    /// The declaration or expression at `syntax`.
    fn declaration(&self, syntax: SyntaxId) -> Option<Declaration>;

    /// The declaration of a source-local method, if the front end owns it.
    fn method_body(&self, method: &MethodSymbol) -> Option<MethodDeclaration>;
}

/// In-memory front end.
#[derive(Debug, Default)]
pub struct SourceCompilation {
    next_syntax: u32,
    next_symbol: u32,
    nodes: FxHashMap<SyntaxId, Declaration>,
    methods: FxHashMap<SymbolId, SyntaxId>,
}

impl SourceCompilation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh symbol identity.
    pub fn symbol_id(&mut self) -> SymbolId {
        self.next_symbol += 1;
        SymbolId(self.next_symbol)
    }

    pub fn add_method(&mut self, declaration: MethodDeclaration) -> SyntaxId {
        let id = declaration.symbol.id;
        let syntax = self.add(Declaration::Method(declaration));
        self.methods.insert(id, syntax);
        syntax
    }

    pub fn add_expression(&mut self, expression: Operation) -> SyntaxId {
        self.add(Declaration::Expression(expression))
    }

    pub fn add(&mut self, declaration: Declaration) -> SyntaxId {
        self.next_syntax += 1;
        let syntax = SyntaxId(self.next_syntax);
        self.nodes.insert(syntax, declaration);
        syntax
    }
}

impl SemanticModel for SourceCompilation {
    fn declaration(&self, syntax: SyntaxId) -> Option<Declaration> {
        self.nodes.get(&syntax).cloned()
    }

    fn method_body(&self, method: &MethodSymbol) -> Option<MethodDeclaration> {
        let syntax = self.methods.get(&method.id)?;
        match self.nodes.get(syntax)? {
            Declaration::Method(declaration) => Some(declaration.clone()),
            _ => None,
        }
    }
}
