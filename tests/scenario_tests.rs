//! End-to-end compilation scenarios driven through the public factory.

mod common;

use common::*;
use dynemit::{
    CompilationError, DynEmitError, FunctionValue, MethodDeclaration, Operation, RuntimeError, SourceCompilation,
    TypeDescriptor, TypedFunction, Value,
};
use dynemit_core::{
    ArrayRef, BinaryOperator, ConversionError, HoleArgument, InterpolationPart, LocalSymbol, MethodSymbol,
    PropertySymbol, primitives,
};
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;

#[test]
fn linear_method_runs() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let (_, syntax) = linear(&mut source);

    let f: TypedFunction<(i32,), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(f.call((2,)).unwrap(), 41);
    assert_eq!(f.call((-1,)).unwrap(), -19);
}

#[test]
fn host_call_and_source_callee_combine() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let (f, _) = add_unary_int(&mut source, "F", |x| {
        binary(
            BinaryOperator::Add,
            binary(BinaryOperator::Multiply, Operation::int(4), x),
            Operation::int(1),
        )
    });

    // Sequence.Sum(new[] { 1, 2, 3 }) + F(10)
    let sum = host_static("Sequence", "Sum", vec![ints()], int());
    let body = binary(
        BinaryOperator::Add,
        Operation::invocation(None, sum, vec![int_sequence(&[1, 2, 3])]),
        Operation::invocation(None, f, vec![Operation::int(10)]),
    );
    let id = source.symbol_id();
    let g = MethodSymbol::new(id, "G", calc()).returns(int());
    let syntax = source.add_method(MethodDeclaration { symbol: g, body });

    let g: TypedFunction<(), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(g.call(()).unwrap(), 47);
}

#[test]
fn caller_sequence_reaches_host_and_source_callees() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let (f, _) = add_unary_int(&mut source, "F", |x| {
        binary(
            BinaryOperator::Add,
            binary(BinaryOperator::Multiply, Operation::int(4), x),
            Operation::int(1),
        )
    });

    // S(IEnumerable<int> xs) => Sequence.Sum(xs) + F(10)
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "S", calc()).with_param("xs", ints()).returns(int());
    let sum = host_static("Sequence", "Sum", vec![ints()], int());
    let body = binary(
        BinaryOperator::Add,
        Operation::invocation(None, sum, vec![Operation::parameter(&symbol.parameters[0])]),
        Operation::invocation(None, f, vec![Operation::int(10)]),
    );
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let s: Arc<FunctionValue> = factory.create_method(syntax, &source).unwrap();
    let xs = ArrayRef::from_vec(primitives::INT32, vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
    assert_eq!(factory.invoke(&s, vec![Value::Array(xs)]).unwrap(), Value::Int32(47));
}

#[rstest]
#[case(Some(5), None, "n=    7")]
#[case(Some(-5), None, "n=7    ")]
#[case(None, Some("D3"), "n=007")]
#[case(None, None, "n=7")]
fn interpolation_applies_alignment_and_format(
    #[case] alignment: Option<i32>,
    #[case] format: Option<&str>,
    #[case] expected: &str,
) {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Show", calc())
        .with_param("n", int())
        .returns(TypeDescriptor::string());

    let mut arguments = Vec::new();
    if let Some(width) = alignment {
        arguments.push(HoleArgument::Alignment(Operation::int(width)));
    }
    if let Some(format) = format {
        arguments.push(HoleArgument::Format(format.into()));
    }
    let body = Operation::interpolated(vec![
        InterpolationPart::Text("n=".into()),
        InterpolationPart::Hole {
            value: Box::new(Operation::parameter(&symbol.parameters[0])),
            arguments,
        },
    ]);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let show: TypedFunction<(i32,), String> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(show.call((7,)).unwrap(), expected);
}

#[test]
fn object_creation_runs_initializer() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let point = TypeDescriptor::named("Point");
    let ctor = MethodSymbol::constructor(id, point.clone())
        .with_param("x", int())
        .with_param("y", int());
    let y = PropertySymbol::new(point.clone(), "Y", int());
    let creation = Operation::new_object(
        ctor,
        vec![Operation::int(0), Operation::int(1)],
        vec![Operation::assign(
            Operation::property(Some(Operation::implicit_receiver(point)), y),
            Operation::int(2),
        )],
    );
    let syntax = source.add_expression(creation);

    let make: Arc<FunctionValue> = factory.create_method(syntax, &source).unwrap();
    let value = factory.invoke(&make, vec![]).unwrap();
    assert_eq!(point_of(&value), Point { x: 0, y: 2 });
}

#[test]
fn value_type_assignment_copies() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Detach", calc()).returns(int());
    let point = TypeDescriptor::named("Point");
    let ctor_id = source.symbol_id();
    let ctor = MethodSymbol::constructor(ctor_id, point.clone())
        .with_param("x", int())
        .with_param("y", int());
    let p = LocalSymbol::new(source.symbol_id(), "p", point.clone());
    let q = LocalSymbol::new(source.symbol_id(), "q", point.clone());
    let y = |local: &LocalSymbol| {
        Operation::property(Some(Operation::local(local)), PropertySymbol::new(point.clone(), "Y", int()))
    };

    // Point p = new Point(0, 1); Point q = p; q.Y = 5; return p.Y * 10 + q.Y;
    let body = Operation::block(vec![
        Operation::declare(
            p.clone(),
            Some(Operation::new_object(ctor, vec![Operation::int(0), Operation::int(1)], vec![])),
        ),
        Operation::declare(q.clone(), Some(Operation::local(&p))),
        Operation::expression_statement(Operation::assign(y(&q), Operation::int(5))),
        Operation::ret(Some(binary(
            BinaryOperator::Add,
            binary(BinaryOperator::Multiply, y(&p), Operation::int(10)),
            y(&q),
        ))),
    ]);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let detach: TypedFunction<(), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(detach.call(()).unwrap(), 15);
}

#[test]
fn value_type_arguments_are_copied_into_the_callee() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let point = TypeDescriptor::named("Point");
    let y = PropertySymbol::new(point.clone(), "Y", int());

    // Bump(Point p) { p.Y = 9; return p.Y; }
    let bump_id = source.symbol_id();
    let bump = MethodSymbol::new(bump_id, "Bump", calc()).with_param("p", point.clone()).returns(int());
    let bumped = || Operation::property(Some(Operation::parameter(&bump.parameters[0])), y.clone());
    let bump_body = Operation::block(vec![
        Operation::expression_statement(Operation::assign(bumped(), Operation::int(9))),
        Operation::ret(Some(bumped())),
    ]);
    source.add_method(MethodDeclaration {
        symbol: bump.clone(),
        body: bump_body,
    });

    // Point p = new Point(0, 1); Bump(p); return p.Y;
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Keep", calc()).returns(int());
    let ctor_id = source.symbol_id();
    let ctor = MethodSymbol::constructor(ctor_id, point.clone())
        .with_param("x", int())
        .with_param("y", int());
    let p = LocalSymbol::new(source.symbol_id(), "p", point);
    let body = Operation::block(vec![
        Operation::declare(
            p.clone(),
            Some(Operation::new_object(ctor, vec![Operation::int(0), Operation::int(1)], vec![])),
        ),
        Operation::expression_statement(Operation::invocation(None, bump, vec![Operation::local(&p)])),
        Operation::ret(Some(Operation::property(Some(Operation::local(&p)), y))),
    ]);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let keep: TypedFunction<(), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(keep.call(()).unwrap(), 1);
}

#[test]
fn oversized_array_creation_fails_at_run_time() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let grid = TypeDescriptor::array_of_rank(int(), 2);
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Grid", calc()).returns(grid.clone());

    // new int[int.MaxValue, int.MaxValue]
    let body = Operation::new_array(grid, vec![Operation::int(i32::MAX), Operation::int(i32::MAX)], None);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let make: Arc<FunctionValue> = factory.create_method(syntax, &source).unwrap();
    let side = i32::MAX as usize;
    assert_eq!(
        factory.invoke(&make, vec![]).unwrap_err(),
        RuntimeError::AllocationFailed {
            dimensions: vec![side, side],
        }
    );
}

#[test]
fn virtual_property_dispatches_on_runtime_type() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Area", calc())
        .with_param("r", TypeDescriptor::double())
        .returns(TypeDescriptor::double());
    let ctor_id = source.symbol_id();
    let circle = MethodSymbol::constructor(ctor_id, TypeDescriptor::named("Circle")).with_param("r", TypeDescriptor::double());
    let shape = Operation::conversion(
        Operation::new_object(circle, vec![Operation::parameter(&symbol.parameters[0])], vec![]),
        TypeDescriptor::named("Shape"),
    );
    let area = PropertySymbol::new(TypeDescriptor::named("Shape"), "Area", TypeDescriptor::double());
    let body = Operation::property(Some(shape), area);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let area: TypedFunction<(f64,), f64> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(area.call((2.0,)).unwrap(), 12.0);
}

#[test]
fn while_loop_accumulates() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Triangle", calc()).with_param("x", int()).returns(int());
    let total_id = source.symbol_id();
    let total = LocalSymbol::new(total_id, "total", int());
    let x = || Operation::parameter(&symbol.parameters[0]);

    // int total = 0; while (x > 0) { total += x; x -= 1; } return total;
    let body = Operation::block(vec![
        Operation::declare(total.clone(), Some(Operation::int(0))),
        Operation::while_loop(
            Operation::binary(BinaryOperator::GreaterThan, x(), Operation::int(0), TypeDescriptor::bool()),
            Operation::block(vec![
                Operation::expression_statement(Operation::compound_assign(
                    BinaryOperator::Add,
                    Operation::local(&total),
                    x(),
                )),
                Operation::expression_statement(Operation::compound_assign(BinaryOperator::Subtract, x(), Operation::int(1))),
            ]),
        ),
        Operation::ret(Some(Operation::local(&total))),
    ]);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let triangle: TypedFunction<(i32,), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(triangle.call((4,)).unwrap(), 10);
    assert_eq!(triangle.call((0,)).unwrap(), 0);
}

#[test]
fn lambda_passes_through_host_method() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let lambda_id = source.symbol_id();
    let lambda = MethodSymbol::lambda(lambda_id, calc()).with_param("v", int()).returns(int());
    let tripled = binary(BinaryOperator::Multiply, Operation::parameter(&lambda.parameters[0]), Operation::int(3));
    let func_int = func(vec![int(), int()]);

    // Sequence.Apply(v => v * 3, 5)
    let apply = host_static("Sequence", "Apply", vec![func_int.clone(), int()], int());
    let body = Operation::invocation(
        None,
        apply,
        vec![Operation::lambda(lambda, tripled, func_int), Operation::int(5)],
    );
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Run", calc()).returns(int());
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let run: TypedFunction<(), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(run.call(()).unwrap(), 15);
}

#[test]
fn lambda_delegate_is_reused_across_calls() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let lambda_id = source.symbol_id();
    let lambda = MethodSymbol::lambda(lambda_id, calc()).with_param("v", int()).returns(int());
    let increment = binary(BinaryOperator::Add, Operation::parameter(&lambda.parameters[0]), Operation::int(1));
    let func_int = func(vec![int(), int()]);
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Make", calc()).returns(func_int.clone());
    let syntax = source.add_method(MethodDeclaration {
        symbol,
        body: Operation::lambda(lambda, increment, func_int),
    });

    let make: Arc<FunctionValue> = factory.create_method(syntax, &source).unwrap();
    let (Value::Function(first), Value::Function(second)) =
        (factory.invoke(&make, vec![]).unwrap(), factory.invoke(&make, vec![]).unwrap())
    else {
        panic!("expected function values");
    };
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.invoke(&first, vec![Value::Int32(41)]).unwrap(), Value::Int32(42));
}

#[test]
fn independent_compiles_get_distinct_units() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let (_, syntax) = linear(&mut source);

    let first = factory.compile(syntax, &source).unwrap();
    let second = factory.compile(syntax, &source).unwrap();
    assert!(!Arc::ptr_eq(&first.unit, &second.unit));
    assert_ne!(first.unit.id, second.unit.id);
}

#[test]
fn callee_without_body_names_its_type() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let missing = MethodSymbol::new(id, "Missing", TypeDescriptor::named("Elsewhere")).returns(int());
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Caller", calc()).returns(int());
    let syntax = source.add_method(MethodDeclaration {
        symbol,
        body: Operation::invocation(None, missing, vec![]),
    });

    let err = factory.create_method::<Arc<FunctionValue>>(syntax, &source).unwrap_err();
    assert!(matches!(
        err,
        DynEmitError::Compilation(CompilationError::UnresolvedType { ref name }) if name == "Elsewhere"
    ));
}

#[test]
fn host_overload_mismatch_is_reported() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let sum = host_static("Sequence", "Sum", vec![TypeDescriptor::string()], int());
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Bad", calc()).returns(int());
    let syntax = source.add_method(MethodDeclaration {
        symbol,
        body: Operation::invocation(None, sum, vec![Operation::string("text")]),
    });

    let err = factory.create_method::<Arc<FunctionValue>>(syntax, &source).unwrap_err();
    assert!(matches!(
        err,
        DynEmitError::Compilation(CompilationError::UnresolvedMethodOverload { ref name, .. }) if name.contains("Sum")
    ));
}

#[test]
fn typed_binding_checks_the_signature() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let (_, syntax) = linear(&mut source);

    let err = factory.create_method::<TypedFunction<(i64,), i32>>(syntax, &source).unwrap_err();
    assert!(matches!(err, DynEmitError::Conversion(ConversionError::SignatureMismatch { .. })));
}

#[test]
fn runaway_recursion_is_stopped() {
    let factory = builder().max_call_depth(16).build().unwrap();
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Forever", calc()).with_param("x", int()).returns(int());
    let body = Operation::invocation(None, symbol.clone(), vec![Operation::parameter(&symbol.parameters[0])]);
    let syntax = source.add_method(MethodDeclaration { symbol, body });

    let forever: TypedFunction<(i32,), i32> = factory.create_method(syntax, &source).unwrap();
    assert_eq!(forever.call((1,)).unwrap_err(), RuntimeError::CallDepthExceeded { limit: 16 });
}

/// `Calc.Op(int a, int b) => a <operator> b`
fn operator_method(operator: BinaryOperator, returns: TypeDescriptor) -> (SourceCompilation, dynemit::SyntaxId) {
    let mut source = SourceCompilation::new();
    let id = source.symbol_id();
    let symbol = MethodSymbol::new(id, "Op", calc())
        .with_param("a", int())
        .with_param("b", int())
        .returns(returns.clone());
    let body = Operation::binary(
        operator,
        Operation::parameter(&symbol.parameters[0]),
        Operation::parameter(&symbol.parameters[1]),
        returns,
    );
    let syntax = source.add_method(MethodDeclaration { symbol, body });
    (source, syntax)
}

fn int_operator(operator: BinaryOperator) -> TypedFunction<(i32, i32), i32> {
    let (source, syntax) = operator_method(operator, int());
    factory().create_method(syntax, &source).unwrap()
}

fn comparison(operator: BinaryOperator) -> TypedFunction<(i32, i32), bool> {
    let (source, syntax) = operator_method(operator, TypeDescriptor::bool());
    factory().create_method(syntax, &source).unwrap()
}

#[test]
fn integer_division_by_zero_is_an_error() {
    for operator in [BinaryOperator::Divide, BinaryOperator::Remainder] {
        assert_eq!(int_operator(operator).call((7, 0)).unwrap_err(), RuntimeError::DivisionByZero);
    }
}

#[test]
fn non_strict_comparisons_negate_the_strict_ones() {
    let factory = factory();
    let mut source = SourceCompilation::new();
    let mut add = |operator: BinaryOperator| {
        let id = source.symbol_id();
        let symbol = MethodSymbol::new(id, "Cmp", calc())
            .with_param("a", TypeDescriptor::double())
            .with_param("b", TypeDescriptor::double())
            .returns(TypeDescriptor::bool());
        let body = Operation::binary(
            operator,
            Operation::parameter(&symbol.parameters[0]),
            Operation::parameter(&symbol.parameters[1]),
            TypeDescriptor::bool(),
        );
        source.add_method(MethodDeclaration { symbol, body })
    };
    let (lt, le, ge) = (
        add(BinaryOperator::LessThan),
        add(BinaryOperator::LessThanOrEqual),
        add(BinaryOperator::GreaterThanOrEqual),
    );

    let lt: TypedFunction<(f64, f64), bool> = factory.create_method(lt, &source).unwrap();
    let le: TypedFunction<(f64, f64), bool> = factory.create_method(le, &source).unwrap();
    let ge: TypedFunction<(f64, f64), bool> = factory.create_method(ge, &source).unwrap();
    assert!(!lt.call((f64::NAN, 0.0)).unwrap());
    // `<=` is `!(a > b)`, so an unordered pair satisfies it.
    assert!(le.call((f64::NAN, 0.0)).unwrap());
    assert!(ge.call((0.0, f64::NAN)).unwrap());
    assert!(le.call((1.0, 1.0)).unwrap());
    assert!(!ge.call((0.5, 1.0)).unwrap());
}

proptest! {
    #[test]
    fn linear_matches_wrapping_arithmetic(x in any::<i32>()) {
        let factory = factory();
        let mut source = SourceCompilation::new();
        let (_, syntax) = linear(&mut source);
        let f: TypedFunction<(i32,), i32> = factory.create_method(syntax, &source).unwrap();
        prop_assert_eq!(f.call((x,)).unwrap(), x.wrapping_mul(20).wrapping_add(1));
    }

    #[test]
    fn comparisons_match_integer_ordering(a in any::<i32>(), b in any::<i32>()) {
        let cases = [
            (BinaryOperator::Equals, a == b),
            (BinaryOperator::NotEquals, a != b),
            (BinaryOperator::LessThan, a < b),
            (BinaryOperator::LessThanOrEqual, a <= b),
            (BinaryOperator::GreaterThan, a > b),
            (BinaryOperator::GreaterThanOrEqual, a >= b),
        ];
        for (operator, expected) in cases {
            prop_assert_eq!(comparison(operator).call((a, b)).unwrap(), expected);
        }
    }

    #[test]
    fn shifts_mask_the_count(a in any::<i32>(), count in 0..96i32) {
        prop_assert_eq!(
            int_operator(BinaryOperator::LeftShift).call((a, count)).unwrap(),
            a.wrapping_shl(count as u32)
        );
        prop_assert_eq!(
            int_operator(BinaryOperator::RightShift).call((a, count)).unwrap(),
            a.wrapping_shr(count as u32)
        );
    }

    #[test]
    fn division_truncates_toward_zero(a in any::<i32>(), b in any::<i32>().prop_filter("non-zero divisor", |b| *b != 0)) {
        prop_assert_eq!(int_operator(BinaryOperator::Divide).call((a, b)).unwrap(), a.wrapping_div(b));
        prop_assert_eq!(int_operator(BinaryOperator::Remainder).call((a, b)).unwrap(), a.wrapping_rem(b));
    }

    #[test]
    fn widening_conversions_preserve_the_value(x in any::<i32>()) {
        let factory = factory();
        let mut source = SourceCompilation::new();
        let id = source.symbol_id();
        let symbol = MethodSymbol::new(id, "Square", calc())
            .with_param("x", int())
            .returns(TypeDescriptor::int64());
        let wide = || Operation::conversion(Operation::parameter(&symbol.parameters[0]), TypeDescriptor::int64());
        let body = Operation::binary(BinaryOperator::Multiply, wide(), wide(), TypeDescriptor::int64());
        let square_syntax = source.add_method(MethodDeclaration { symbol, body });

        let id = source.symbol_id();
        let symbol = MethodSymbol::new(id, "Real", calc())
            .with_param("x", int())
            .returns(TypeDescriptor::double());
        let body = Operation::conversion(Operation::parameter(&symbol.parameters[0]), TypeDescriptor::double());
        let real_syntax = source.add_method(MethodDeclaration { symbol, body });

        let square: TypedFunction<(i32,), i64> = factory.create_method(square_syntax, &source).unwrap();
        let real: TypedFunction<(i32,), f64> = factory.create_method(real_syntax, &source).unwrap();
        prop_assert_eq!(square.call((x,)).unwrap(), i64::from(x) * i64::from(x));
        prop_assert_eq!(real.call((x,)).unwrap(), f64::from(x));
    }
}
