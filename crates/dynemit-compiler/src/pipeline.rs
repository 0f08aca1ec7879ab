//! The top-level compilation pipeline.
//!
//! One request compiles one method declaration or standalone expression:
//!
//! 1. a fresh [`CompilationSession`] is opened with a unit for the request
//! 2. nested lambdas are materialized into child units
//! 3. the body is compiled into the request's unit
//! 4. the unit is sealed and returned with its resolved delegate type
//!
//! Calls into other source-local methods run the same pipeline again on the
//! callee's declaration, once per call site.

use crate::bytecode::ConstantPool;
use crate::context::BodyContext;
use crate::emit::BytecodeEmitter;
use crate::lambda::LambdaMaterializer;
use crate::scope::Frame;
use crate::session::CompilationSession;
use crate::stmt::StmtCompiler;
use crate::unit::{CodeUnit, CompiledMethod};
use dynemit_core::{
    CompilationError, CompiledCode, Declaration, FunctionBody, FunctionSignature, FunctionValue, MethodDeclaration,
    MethodSymbol, Operation, SemanticModel, SymbolId, SyntaxId, TypeDescriptor, TypeHash,
};
use dynemit_registry::TypeCatalog;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

type Result<T> = std::result::Result<T, CompilationError>;

/// Symbol of the synthetic method wrapping a standalone expression.
const EXPRESSION_SYMBOL: SymbolId = SymbolId(0);

/// A sealed top-level compilation.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub unit: Arc<CodeUnit>,
    pub method: Arc<CompiledMethod>,
    pub delegate_type: TypeHash,
    pub signature: FunctionSignature,
}

impl CompiledFunction {
    /// Bind the compiled method into a function value of its delegate type.
    pub fn to_function_value(&self) -> Arc<FunctionValue> {
        let body: Arc<dyn CompiledCode> = self.method.clone();
        Arc::new(FunctionValue::new(
            self.delegate_type,
            self.signature.clone(),
            None,
            FunctionBody::Compiled(body),
        ))
    }
}

pub struct Pipeline<'a> {
    catalog: &'a TypeCatalog,
    model: &'a dyn SemanticModel,
    /// Methods whose compilation is in progress, outermost first.
    active: RefCell<Vec<SymbolId>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(catalog: &'a TypeCatalog, model: &'a dyn SemanticModel) -> Self {
        Self {
            catalog,
            model,
            active: RefCell::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &'a TypeCatalog {
        self.catalog
    }

    pub fn model(&self) -> &'a dyn SemanticModel {
        self.model
    }

    /// Compile whatever the front end declares at `syntax`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_syntax(&self, syntax: SyntaxId) -> Result<CompiledFunction> {
        match self.model.declaration(syntax) {
            Some(Declaration::Method(declaration)) => self.compile_method(&declaration),
            Some(Declaration::Expression(expression)) => self.compile_expression(&expression),
            Some(other) => Err(CompilationError::InvalidSymbolShape {
                expected: "method declaration or expression".into(),
                found: other.kind_name().to_string(),
            }),
            None => Err(CompilationError::InvalidSymbolShape {
                expected: "method declaration or expression".into(),
                found: format!("unknown syntax node {}", syntax.0),
            }),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_method(&self, declaration: &MethodDeclaration) -> Result<CompiledFunction> {
        let symbol = &declaration.symbol;
        if !symbol.is_static {
            return Err(CompilationError::InvalidSymbolShape {
                expected: "static method".into(),
                found: symbol.display_signature(),
            });
        }
        self.compile_top(symbol, &declaration.body)
    }

    /// Compile a standalone expression as a parameterless function.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_expression(&self, expression: &Operation) -> Result<CompiledFunction> {
        let return_type = expression.ty.clone().unwrap_or(TypeDescriptor::Void);
        let symbol = MethodSymbol::new(EXPRESSION_SYMBOL, "<expression>", TypeDescriptor::Void).returns(return_type);
        self.compile_top(&symbol, expression)
    }

    fn compile_top(&self, symbol: &MethodSymbol, body: &Operation) -> Result<CompiledFunction> {
        let _active = ActiveMethod::enter(&self.active, symbol)?;
        let (delegate_type, signature) = self.function_type(symbol)?;

        let mut session = CompilationSession::new();
        let unit = session.open_unit(&symbol.name);
        LambdaMaterializer::new(self).materialize(body, &mut session)?;

        let method = Arc::new(self.compile_body(&session, symbol, false, body)?);
        session.add_method(unit, Arc::clone(&method))?;
        let unit = session.seal_unit(unit)?;
        debug!(
            method = %symbol.display_signature(),
            unit = %unit.name,
            lambdas = session.lambda_count(),
            "compiled"
        );

        Ok(CompiledFunction {
            unit,
            method,
            delegate_type,
            signature,
        })
    }

    /// Delegate type and signature of a method symbol.
    pub(crate) fn function_type(&self, symbol: &MethodSymbol) -> Result<(TypeHash, FunctionSignature)> {
        // name the offending type rather than the whole signature when possible
        for param in &symbol.parameters {
            self.catalog.resolve_or_fail(&param.ty)?;
        }
        if symbol.returns_value() {
            self.catalog.resolve_or_fail(&symbol.return_type)?;
        }

        let unresolved = || CompilationError::unresolved_type(symbol.display_signature());
        let delegate_type = self.catalog.resolve_function_type(symbol).ok_or_else(unresolved)?;
        let signature = self.catalog.delegate_signature(delegate_type).ok_or_else(unresolved)?;
        Ok((delegate_type, signature))
    }

    /// Compile one body into a method of the session's current unit.
    pub(crate) fn compile_body(
        &self,
        session: &CompilationSession,
        symbol: &MethodSymbol,
        has_this: bool,
        body: &Operation,
    ) -> Result<CompiledMethod> {
        let mut constants = ConstantPool::new();
        let mut ctx = BodyContext::new(self, session, Frame::for_method(symbol, has_this));
        let chunk = {
            let mut emitter = BytecodeEmitter::new(&mut constants);
            StmtCompiler::new(&mut ctx, &mut emitter, symbol.returns_value()).compile_body(body)?;
            emitter.finish()
        };
        let (frame, lambdas, callees) = ctx.into_parts();

        Ok(CompiledMethod {
            name: symbol.name.clone(),
            param_count: frame.param_count(),
            has_this,
            local_count: frame.local_count(),
            returns_value: symbol.returns_value(),
            chunk,
            constants,
            lambdas,
            callees,
        })
    }

    /// Compile a source-local method called from the body being compiled.
    pub(crate) fn compile_callee(&self, method: &MethodSymbol) -> Result<Arc<CompiledMethod>> {
        let declaration = self
            .model
            .method_body(method)
            .ok_or_else(|| CompilationError::unresolved_type(method.containing_type.to_string()))?;
        debug!(method = %method.display_signature(), "recompiling source-local callee");
        Ok(self.compile_method(&declaration)?.method)
    }
}

/// Marks a method as being compiled until dropped.
struct ActiveMethod<'p> {
    active: &'p RefCell<Vec<SymbolId>>,
}

impl<'p> ActiveMethod<'p> {
    fn enter(active: &'p RefCell<Vec<SymbolId>>, symbol: &MethodSymbol) -> Result<Self> {
        let mut stack = active.borrow_mut();
        if stack.contains(&symbol.id) {
            return Err(CompilationError::unsupported(format!(
                "recursive call cycle through '{}'",
                symbol.display_signature()
            )));
        }
        stack.push(symbol.id);
        Ok(Self { active })
    }
}

impl Drop for ActiveMethod<'_> {
    fn drop(&mut self) {
        self.active.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;
    use crate::expr::test_support::catalog;
    use dynemit_core::{BinaryOperator, SourceCompilation};

    fn calc() -> TypeDescriptor {
        TypeDescriptor::named("Calc")
    }

    /// `static int F(int x) => 20 * x + 1;`
    fn linear(source: &mut SourceCompilation) -> (MethodSymbol, SyntaxId) {
        let id = source.symbol_id();
        let symbol = MethodSymbol::new(id, "F", calc())
            .with_param("x", TypeDescriptor::int())
            .returns(TypeDescriptor::int());
        let x = Operation::parameter(&symbol.parameters[0]);
        let body = Operation::binary(
            BinaryOperator::Add,
            Operation::binary(BinaryOperator::Multiply, Operation::int(20), x, TypeDescriptor::int()),
            Operation::int(1),
            TypeDescriptor::int(),
        );
        let syntax = source.add_method(MethodDeclaration {
            symbol: symbol.clone(),
            body,
        });
        (symbol, syntax)
    }

    #[test]
    fn method_compiles_into_a_sealed_unit() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let (_, syntax) = linear(&mut source);

        let compiled = Pipeline::new(&catalog, &source).compile_syntax(syntax).unwrap();
        assert_eq!(compiled.unit.methods.len(), 1);
        assert!(compiled.unit.name.ends_with(".F"));
        assert_eq!(compiled.signature.arity(), 1);
        let func = TypeDescriptor::generic("Func", vec![TypeDescriptor::int(), TypeDescriptor::int()]);
        assert_eq!(Some(compiled.delegate_type), catalog.resolve(&func));
        compiled.method.chunk.assert_opcodes(&[
            OpCode::Constant,
            OpCode::GetArg,
            OpCode::Mul,
            OpCode::Constant,
            OpCode::Add,
            OpCode::Return,
        ]);
    }

    #[test]
    fn independent_compiles_get_distinct_units() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let (_, syntax) = linear(&mut source);
        let pipeline = Pipeline::new(&catalog, &source);

        let a = pipeline.compile_syntax(syntax).unwrap();
        let b = pipeline.compile_syntax(syntax).unwrap();
        assert_ne!(a.unit.id, b.unit.id);
        assert_ne!(a.unit.name, b.unit.name);
        assert!(!Arc::ptr_eq(&a.method, &b.method));
    }

    #[test]
    fn expressions_compile_as_parameterless_functions() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let syntax = source.add_expression(Operation::string("hi"));

        let compiled = Pipeline::new(&catalog, &source).compile_syntax(syntax).unwrap();
        assert_eq!(compiled.signature.arity(), 0);
        assert!(compiled.signature.returns_value());
        compiled.method.chunk.assert_opcodes(&[OpCode::Constant, OpCode::Return]);
    }

    #[test]
    fn other_declarations_are_rejected() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let syntax = source.add(Declaration::Other { kind: "class".into() });
        let err = Pipeline::new(&catalog, &source).compile_syntax(syntax).unwrap_err();
        assert_eq!(
            err,
            CompilationError::InvalidSymbolShape {
                expected: "method declaration or expression".into(),
                found: "class".into(),
            }
        );
    }

    #[test]
    fn unresolved_parameter_type_is_named() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let id = source.symbol_id();
        let symbol = MethodSymbol::new(id, "G", calc()).with_param("w", TypeDescriptor::named("Widget"));
        let syntax = source.add_method(MethodDeclaration {
            symbol,
            body: Operation::block(vec![]),
        });
        let err = Pipeline::new(&catalog, &source).compile_syntax(syntax).unwrap_err();
        assert_eq!(err, CompilationError::unresolved_type("Widget"));
    }

    #[test]
    fn source_callee_is_compiled_per_call_site() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let (f, _) = linear(&mut source);
        let id = source.symbol_id();
        let g = MethodSymbol::new(id, "G", calc()).returns(TypeDescriptor::int());
        let call = || Operation::invocation(None, f.clone(), vec![Operation::int(1)]);
        let body = Operation::binary(BinaryOperator::Add, call(), call(), TypeDescriptor::int());
        let syntax = source.add_method(MethodDeclaration { symbol: g, body });

        let compiled = Pipeline::new(&catalog, &source).compile_syntax(syntax).unwrap();
        let callees = &compiled.method.callees;
        assert_eq!(callees.len(), 2);
        assert!(!Arc::ptr_eq(&callees[0], &callees[1]));
        compiled.method.chunk.assert_opcodes(&[
            OpCode::Constant,
            OpCode::CallUnit,
            OpCode::Constant,
            OpCode::CallUnit,
            OpCode::Add,
            OpCode::Return,
        ]);
    }

    #[test]
    fn mutual_recursion_is_reported() {
        let catalog = catalog();
        let mut source = SourceCompilation::new();
        let f_id = source.symbol_id();
        let g_id = source.symbol_id();
        let f = MethodSymbol::new(f_id, "F", calc());
        let g = MethodSymbol::new(g_id, "G", calc());
        let f_syntax = source.add_method(MethodDeclaration {
            symbol: f.clone(),
            body: Operation::expression_statement(Operation::invocation(None, g.clone(), vec![])),
        });
        source.add_method(MethodDeclaration {
            symbol: g,
            body: Operation::expression_statement(Operation::invocation(None, f, vec![])),
        });

        let err = Pipeline::new(&catalog, &source).compile_syntax(f_syntax).unwrap_err();
        assert!(matches!(err, CompilationError::UnsupportedOperationShape { .. }));
    }
}
