//! Typed operation trees.
//!
//! An [`Operation`] is one resolved statement or expression as produced by the
//! front end: its shape, its static type (if any) and its compile-time
//! constant (if any). The compiler walks these trees; it never sees source
//! text.

use crate::descriptor::TypeDescriptor;
use crate::symbols::{FieldSymbol, LocalSymbol, MethodSymbol, ParameterSymbol, PropertySymbol};

/// A compile-time constant attached to an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Char(char),
    Decimal(i128, u8),
}

impl ConstantValue {
    /// Static type of the constant, `None` for `null`.
    pub fn descriptor(&self) -> Option<TypeDescriptor> {
        let name = match self {
            ConstantValue::Null => return None,
            ConstantValue::Bool(_) => "bool",
            ConstantValue::Int32(_) => "int",
            ConstantValue::Int64(_) => "int64",
            ConstantValue::UInt32(_) => "uint",
            ConstantValue::UInt64(_) => "uint64",
            ConstantValue::Float32(_) => "float",
            ConstantValue::Float64(_) => "double",
            ConstantValue::String(_) => "string",
            ConstantValue::Char(_) => "char",
            ConstantValue::Decimal(..) => "decimal",
        };
        Some(TypeDescriptor::named(name))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstantValue::Null => "null",
            ConstantValue::Bool(_) => "bool",
            ConstantValue::Int32(_) => "int",
            ConstantValue::Int64(_) => "int64",
            ConstantValue::UInt32(_) => "uint",
            ConstantValue::UInt64(_) => "uint64",
            ConstantValue::Float32(_) => "float",
            ConstantValue::Float64(_) => "double",
            ConstantValue::String(_) => "string",
            ConstantValue::Char(_) => "char",
            ConstantValue::Decimal(..) => "decimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ConditionalAnd,
    ConditionalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
    Not,
    BitwiseNot,
}

/// Extra argument attached to an interpolation hole.
#[derive(Debug, Clone, PartialEq)]
pub enum HoleArgument {
    /// `{value,alignment}`
    Alignment(Operation),
    /// `{value:format}`
    Format(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Text(String),
    Hole {
        value: Box<Operation>,
        arguments: Vec<HoleArgument>,
    },
}

/// The shape of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Value carried in [`Operation::constant`].
    Literal,
    ParameterReference(ParameterSymbol),
    LocalReference(LocalSymbol),
    /// The object under construction inside an object initializer.
    ImplicitReceiver,
    FieldReference {
        instance: Option<Box<Operation>>,
        field: FieldSymbol,
    },
    PropertyReference {
        instance: Option<Box<Operation>>,
        property: PropertySymbol,
    },
    ArrayElementReference {
        array: Box<Operation>,
        indices: Vec<Operation>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Operation>,
        right: Box<Operation>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Operation>,
    },
    Conversion {
        operand: Box<Operation>,
    },
    Conditional {
        condition: Box<Operation>,
        when_true: Box<Operation>,
        when_false: Option<Box<Operation>>,
    },
    Invocation {
        instance: Option<Box<Operation>>,
        method: MethodSymbol,
        arguments: Vec<Operation>,
    },
    AnonymousFunction {
        symbol: MethodSymbol,
        body: Box<Operation>,
    },
    DelegateCreation {
        target: Box<Operation>,
    },
    InterpolatedString {
        parts: Vec<InterpolationPart>,
    },
    ArrayCreation {
        dimension_sizes: Vec<Operation>,
        initializer: Option<Vec<Operation>>,
    },
    ObjectCreation {
        constructor: MethodSymbol,
        arguments: Vec<Operation>,
        initializer: Vec<Operation>,
    },
    SimpleAssignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    CompoundAssignment {
        operator: BinaryOperator,
        target: Box<Operation>,
        value: Box<Operation>,
    },
    VariableDeclaration {
        local: LocalSymbol,
        initializer: Option<Box<Operation>>,
    },
    Block {
        statements: Vec<Operation>,
    },
    ExpressionStatement {
        expression: Box<Operation>,
    },
    Parenthesized {
        operand: Box<Operation>,
    },
    Return {
        value: Option<Box<Operation>>,
    },
    WhileLoop {
        condition: Box<Operation>,
        body: Box<Operation>,
    },
    /// A front-end shape outside the compiled subset, named by `kind`.
    Unsupported {
        kind: String,
        children: Vec<Operation>,
    },
}

/// One node of a typed operation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Static type; `None` for statements and typeless expressions.
    pub ty: Option<TypeDescriptor>,
    pub constant: Option<ConstantValue>,
    /// Source line, zero when unknown.
    pub line: u32,
}

impl Operation {
    pub fn new(kind: OperationKind, ty: Option<TypeDescriptor>) -> Self {
        Self {
            kind,
            ty,
            constant: None,
            line: 0,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn with_constant(mut self, constant: ConstantValue) -> Self {
        self.constant = Some(constant);
        self
    }

    /// A literal typed from its constant.
    pub fn literal(value: ConstantValue) -> Self {
        let ty = value.descriptor();
        Self::new(OperationKind::Literal, ty).with_constant(value)
    }

    pub fn int(value: i32) -> Self {
        Self::literal(ConstantValue::Int32(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(ConstantValue::String(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(ConstantValue::Bool(value))
    }

    pub fn null(ty: TypeDescriptor) -> Self {
        Self::new(OperationKind::Literal, Some(ty)).with_constant(ConstantValue::Null)
    }

    pub fn parameter(param: &ParameterSymbol) -> Self {
        let ty = param.ty.clone();
        Self::new(OperationKind::ParameterReference(param.clone()), Some(ty))
    }

    pub fn local(local: &LocalSymbol) -> Self {
        let ty = local.ty.clone();
        Self::new(OperationKind::LocalReference(local.clone()), Some(ty))
    }

    pub fn implicit_receiver(ty: TypeDescriptor) -> Self {
        Self::new(OperationKind::ImplicitReceiver, Some(ty))
    }

    pub fn field(instance: Option<Operation>, field: FieldSymbol) -> Self {
        let ty = field.ty.clone();
        Self::new(
            OperationKind::FieldReference {
                instance: instance.map(Box::new),
                field,
            },
            Some(ty),
        )
    }

    pub fn property(instance: Option<Operation>, property: PropertySymbol) -> Self {
        let ty = property.ty.clone();
        Self::new(
            OperationKind::PropertyReference {
                instance: instance.map(Box::new),
                property,
            },
            Some(ty),
        )
    }

    pub fn element(array: Operation, indices: Vec<Operation>, ty: TypeDescriptor) -> Self {
        Self::new(
            OperationKind::ArrayElementReference {
                array: Box::new(array),
                indices,
            },
            Some(ty),
        )
    }

    pub fn binary(operator: BinaryOperator, left: Operation, right: Operation, ty: TypeDescriptor) -> Self {
        Self::new(
            OperationKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            Some(ty),
        )
    }

    pub fn unary(operator: UnaryOperator, operand: Operation, ty: TypeDescriptor) -> Self {
        Self::new(
            OperationKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            Some(ty),
        )
    }

    pub fn conversion(operand: Operation, ty: TypeDescriptor) -> Self {
        Self::new(
            OperationKind::Conversion {
                operand: Box::new(operand),
            },
            Some(ty),
        )
    }

    pub fn conditional(condition: Operation, when_true: Operation, when_false: Option<Operation>, ty: Option<TypeDescriptor>) -> Self {
        Self::new(
            OperationKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: when_false.map(Box::new),
            },
            ty,
        )
    }

    /// A call; its type is the method's return type.
    pub fn invocation(instance: Option<Operation>, method: MethodSymbol, arguments: Vec<Operation>) -> Self {
        let ty = (!method.return_type.is_void()).then(|| method.return_type.clone());
        Self::new(
            OperationKind::Invocation {
                instance: instance.map(Box::new),
                method,
                arguments,
            },
            ty,
        )
    }

    /// A lambda wrapped in the delegate creation that converts it to `delegate_type`.
    pub fn lambda(symbol: MethodSymbol, body: Operation, delegate_type: TypeDescriptor) -> Self {
        let function = Self::new(
            OperationKind::AnonymousFunction {
                symbol,
                body: Box::new(body),
            },
            None,
        );
        Self::new(
            OperationKind::DelegateCreation {
                target: Box::new(function),
            },
            Some(delegate_type),
        )
    }

    pub fn interpolated(parts: Vec<InterpolationPart>) -> Self {
        Self::new(OperationKind::InterpolatedString { parts }, Some(TypeDescriptor::string()))
    }

    pub fn new_array(ty: TypeDescriptor, dimension_sizes: Vec<Operation>, initializer: Option<Vec<Operation>>) -> Self {
        Self::new(
            OperationKind::ArrayCreation {
                dimension_sizes,
                initializer,
            },
            Some(ty),
        )
    }

    pub fn new_object(constructor: MethodSymbol, arguments: Vec<Operation>, initializer: Vec<Operation>) -> Self {
        let ty = constructor.containing_type.clone();
        Self::new(
            OperationKind::ObjectCreation {
                constructor,
                arguments,
                initializer,
            },
            Some(ty),
        )
    }

    pub fn assign(target: Operation, value: Operation) -> Self {
        let ty = target.ty.clone();
        Self::new(
            OperationKind::SimpleAssignment {
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn compound_assign(operator: BinaryOperator, target: Operation, value: Operation) -> Self {
        let ty = target.ty.clone();
        Self::new(
            OperationKind::CompoundAssignment {
                operator,
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn declare(local: LocalSymbol, initializer: Option<Operation>) -> Self {
        Self::new(
            OperationKind::VariableDeclaration {
                local,
                initializer: initializer.map(Box::new),
            },
            None,
        )
    }

    pub fn block(statements: Vec<Operation>) -> Self {
        Self::new(OperationKind::Block { statements }, None)
    }

    pub fn expression_statement(expression: Operation) -> Self {
        Self::new(
            OperationKind::ExpressionStatement {
                expression: Box::new(expression),
            },
            None,
        )
    }

    pub fn parenthesized(operand: Operation) -> Self {
        let ty = operand.ty.clone();
        let constant = operand.constant.clone();
        Self {
            kind: OperationKind::Parenthesized {
                operand: Box::new(operand),
            },
            ty,
            constant,
            line: 0,
        }
    }

    pub fn ret(value: Option<Operation>) -> Self {
        Self::new(
            OperationKind::Return {
                value: value.map(Box::new),
            },
            None,
        )
    }

    pub fn while_loop(condition: Operation, body: Operation) -> Self {
        Self::new(
            OperationKind::WhileLoop {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            None,
        )
    }

    pub fn unsupported(kind: impl Into<String>, ty: Option<TypeDescriptor>) -> Self {
        Self::new(
            OperationKind::Unsupported {
                kind: kind.into(),
                children: Vec::new(),
            },
            ty,
        )
    }

    /// True when evaluating this operation leaves a value on the stack.
    pub fn produces_value(&self) -> bool {
        self.ty.as_ref().is_some_and(|ty| !ty.is_void())
    }

    /// Short name of the operation shape, used in diagnostics.
    pub fn shape_name(&self) -> String {
        let name = match &self.kind {
            OperationKind::Literal => {
                return format!(
                    "Literal({})",
                    self.constant.as_ref().map_or("none", ConstantValue::kind_name)
                );
            }
            OperationKind::Unsupported { kind, .. } => return kind.clone(),
            OperationKind::ParameterReference(_) => "ParameterReference",
            OperationKind::LocalReference(_) => "LocalReference",
            OperationKind::ImplicitReceiver => "ImplicitReceiver",
            OperationKind::FieldReference { .. } => "FieldReference",
            OperationKind::PropertyReference { .. } => "PropertyReference",
            OperationKind::ArrayElementReference { .. } => "ArrayElementReference",
            OperationKind::Binary { .. } => "Binary",
            OperationKind::Unary { .. } => "Unary",
            OperationKind::Conversion { .. } => "Conversion",
            OperationKind::Conditional { .. } => "Conditional",
            OperationKind::Invocation { .. } => "Invocation",
            OperationKind::AnonymousFunction { .. } => "AnonymousFunction",
            OperationKind::DelegateCreation { .. } => "DelegateCreation",
            OperationKind::InterpolatedString { .. } => "InterpolatedString",
            OperationKind::ArrayCreation { .. } => "ArrayCreation",
            OperationKind::ObjectCreation { .. } => "ObjectCreation",
            OperationKind::SimpleAssignment { .. } => "SimpleAssignment",
            OperationKind::CompoundAssignment { .. } => "CompoundAssignment",
            OperationKind::VariableDeclaration { .. } => "VariableDeclaration",
            OperationKind::Block { .. } => "Block",
            OperationKind::ExpressionStatement { .. } => "ExpressionStatement",
            OperationKind::Parenthesized { .. } => "Parenthesized",
            OperationKind::Return { .. } => "Return",
            OperationKind::WhileLoop { .. } => "WhileLoop",
        };
        name.to_string()
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        match &self.kind {
            OperationKind::Literal
            | OperationKind::ParameterReference(_)
            | OperationKind::LocalReference(_)
            | OperationKind::ImplicitReceiver => {}
            OperationKind::FieldReference { instance, .. }
            | OperationKind::PropertyReference { instance, .. } => out.extend(instance.as_deref()),
            OperationKind::ArrayElementReference { array, indices } => {
                out.push(array.as_ref());
                out.extend(indices.iter());
            }
            OperationKind::Binary { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            OperationKind::Unary { operand, .. }
            | OperationKind::Conversion { operand }
            | OperationKind::Parenthesized { operand } => out.push(operand.as_ref()),
            OperationKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                out.push(condition.as_ref());
                out.push(when_true.as_ref());
                out.extend(when_false.as_deref());
            }
            OperationKind::Invocation {
                instance, arguments, ..
            } => {
                out.extend(instance.as_deref());
                out.extend(arguments.iter());
            }
            OperationKind::AnonymousFunction { body, .. } => out.push(body.as_ref()),
            OperationKind::DelegateCreation { target } => out.push(target.as_ref()),
            OperationKind::InterpolatedString { parts } => {
                for part in parts {
                    if let InterpolationPart::Hole { value, arguments } = part {
                        out.push(value.as_ref());
                        for argument in arguments {
                            if let HoleArgument::Alignment(alignment) = argument {
                                out.push(alignment);
                            }
                        }
                    }
                }
            }
            OperationKind::ArrayCreation {
                dimension_sizes,
                initializer,
            } => {
                out.extend(dimension_sizes.iter());
                if let Some(items) = initializer {
                    out.extend(items.iter());
                }
            }
            OperationKind::ObjectCreation {
                arguments,
                initializer,
                ..
            } => {
                out.extend(arguments.iter());
                out.extend(initializer.iter());
            }
            OperationKind::SimpleAssignment { target, value }
            | OperationKind::CompoundAssignment { target, value, .. } => {
                out.push(target.as_ref());
                out.push(value.as_ref());
            }
            OperationKind::VariableDeclaration { initializer, .. } => out.extend(initializer.as_deref()),
            OperationKind::Block { statements } => out.extend(statements.iter()),
            OperationKind::ExpressionStatement { expression } => out.push(expression.as_ref()),
            OperationKind::Return { value } => out.extend(value.as_deref()),
            OperationKind::WhileLoop { condition, body } => {
                out.push(condition.as_ref());
                out.push(body.as_ref());
            }
            OperationKind::Unsupported { children, .. } => out.extend(children.iter()),
        }
        out
    }

    /// All descendants in pre-order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        let mut stack: Vec<&Operation> = self.children().into_iter().rev().collect();
        while let Some(op) = stack.pop() {
            out.push(op);
            stack.extend(op.children().into_iter().rev());
        }
        out
    }
}
