//! Shared host types and source builders for the integration tests.

#![allow(dead_code)]

use dynemit::{
    DynamicMethodFactory, DynamicMethodFactoryBuilder, FromValue, FunctionValue, MethodDeclaration, MethodDef, Module,
    Operation, SourceCompilation, SyntaxId, TypeBuilder, TypeDescriptor, TypeRef, Value,
};
use dynemit_core::{BinaryOperator, MethodSymbol};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub struct Shape;

#[derive(Debug, Clone)]
pub struct Circle {
    pub radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub name: String,
    pub retries: i32,
    pub ratio: f64,
    pub label: String,
}

/// `Sequence`, `Point`, `Shape`/`Circle` and `Settings`.
pub fn host_module() -> Module {
    let mut module = Module::new("fixtures");
    module.add(
        TypeBuilder::<()>::static_class("Sequence")
            .method(
                MethodDef::new("Sum").static_().param(ints_ref()).returns(TypeRef::int()),
                |ctx| {
                    let mut total = 0i32;
                    for item in ctx.arg_slot(0)?.sequence_items()? {
                        total = total.wrapping_add(i32::from_value(&item)?);
                    }
                    ctx.set_return(total);
                    Ok(())
                },
            )
            .method(
                MethodDef::new("Apply")
                    .static_()
                    .param(TypeRef::generic("Func", vec![TypeRef::int(), TypeRef::int()]))
                    .param(TypeRef::int())
                    .returns(TypeRef::int()),
                |ctx| {
                    let function: Arc<FunctionValue> = ctx.arg(0)?;
                    let x = ctx.arg_slot(1)?.clone();
                    let result = ctx.invoke(&function, vec![x])?;
                    ctx.set_return_value(result);
                    Ok(())
                },
            )
            .build(),
    );
    module.add(
        TypeBuilder::<Point>::value_type("Point")
            .sealed()
            .constructor(vec![TypeRef::int(), TypeRef::int()], |ctx| {
                Ok(Point {
                    x: ctx.arg(0)?,
                    y: ctx.arg(1)?,
                })
            })
            .field("X", TypeRef::int(), |p: &Point| p.x, |p: &mut Point, v: i32| p.x = v)
            .property_rw("Y", TypeRef::int(), |p: &Point| p.y, |p: &mut Point, v: i32| p.y = v)
            .build(),
    );
    module.add(
        TypeBuilder::<Shape>::class("Shape")
            .abstract_()
            .virtual_property("Area", TypeRef::double(), |_: &Shape| 0.0)
            .build(),
    );
    module.add(
        TypeBuilder::<Circle>::class("Circle")
            .base("Shape")
            .sealed()
            .constructor(vec![TypeRef::double()], |ctx| Ok(Circle { radius: ctx.arg(0)? }))
            .virtual_property("Area", TypeRef::double(), |c: &Circle| 3.0 * c.radius * c.radius)
            .build(),
    );
    module.add(
        TypeBuilder::<Settings>::class("Settings")
            .sealed()
            .default_constructor()
            .property_rw("Name", TypeRef::string(), |s: &Settings| s.name.clone(), |s: &mut Settings, v: String| s.name = v)
            .property_rw("Retries", TypeRef::int(), |s: &Settings| s.retries, |s: &mut Settings, v: i32| s.retries = v)
            .property_rw("Ratio", TypeRef::double(), |s: &Settings| s.ratio, |s: &mut Settings, v: f64| s.ratio = v)
            .field("Label", TypeRef::string(), |s: &Settings| s.label.clone(), |s: &mut Settings, v: String| s.label = v)
            .build(),
    );
    module
}

pub fn builder() -> DynamicMethodFactoryBuilder {
    DynamicMethodFactory::builder().register_module(host_module())
}

pub fn factory() -> DynamicMethodFactory {
    builder().build().unwrap()
}

fn ints_ref() -> TypeRef {
    TypeRef::generic("IEnumerable", vec![TypeRef::int()])
}

pub fn calc() -> TypeDescriptor {
    TypeDescriptor::named("Calc")
}

pub fn int() -> TypeDescriptor {
    TypeDescriptor::int()
}

pub fn ints() -> TypeDescriptor {
    TypeDescriptor::generic("IEnumerable", vec![int()])
}

pub fn func(args: Vec<TypeDescriptor>) -> TypeDescriptor {
    TypeDescriptor::generic("Func", args)
}

pub fn binary(operator: BinaryOperator, left: Operation, right: Operation) -> Operation {
    Operation::binary(operator, left, right, int())
}

/// `new[] { items... }` passed where an `IEnumerable<int>` is expected.
pub fn int_sequence(items: &[i32]) -> Operation {
    let items = items.iter().map(|&i| Operation::int(i)).collect();
    Operation::conversion(Operation::new_array(TypeDescriptor::array(int()), vec![], Some(items)), ints())
}

pub fn host_static(owner: &str, name: &str, params: Vec<TypeDescriptor>, returns: TypeDescriptor) -> MethodSymbol {
    let symbol = MethodSymbol::new(dynemit_core::SymbolId(0), name, TypeDescriptor::named(owner)).returns(returns);
    params
        .into_iter()
        .enumerate()
        .fold(symbol, |symbol, (i, ty)| symbol.with_param(format!("p{i}"), ty))
}

/// Declare `Calc.<name>(int x) => <body(x)>` returning int.
pub fn add_unary_int(
    source: &mut SourceCompilation,
    name: &str,
    body: impl FnOnce(Operation) -> Operation,
) -> (MethodSymbol, SyntaxId) {
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, name, calc()).with_param("x", int()).returns(int());
    let body = body(Operation::parameter(&symbol.parameters[0]));
    let syntax = source.add_method(MethodDeclaration {
        symbol: symbol.clone(),
        body,
    });
    (symbol, syntax)
}

/// `Calc.F(int x) => 20 * x + 1`
pub fn linear(source: &mut SourceCompilation) -> (MethodSymbol, SyntaxId) {
    add_unary_int(source, "F", |x| {
        binary(
            BinaryOperator::Add,
            binary(BinaryOperator::Multiply, Operation::int(20), x),
            Operation::int(1),
        )
    })
}

pub fn point_of(value: &Value) -> Point {
    match value {
        Value::Object(object) => object.with(|p: &Point| p.clone()).unwrap(),
        other => panic!("expected a Point, got {}", other.kind_name()),
    }
}
