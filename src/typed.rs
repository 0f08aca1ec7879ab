//! Typed views of compiled function values.
//!
//! [`FunctionShape`] is what [`DynamicMethodFactory::create_method`] can
//! return: the raw [`Arc<FunctionValue>`] or a [`TypedFunction`] whose
//! parameter and return shapes were checked against the compiled signature.
//!
//! [`DynamicMethodFactory::create_method`]: crate::DynamicMethodFactory::create_method

use crate::vm::Vm;
use dynemit_core::{
    ConversionError, FromValue, FunctionSignature, FunctionValue, IntoValue, RuntimeError, TypeHash, TypedValue, Value,
};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A Rust-side function shape a compiled function value can be bound to.
pub trait FunctionShape: Sized {
    fn bind(function: Arc<FunctionValue>, vm: Arc<Vm>) -> Result<Self, ConversionError>;
}

impl FunctionShape for Arc<FunctionValue> {
    fn bind(function: Arc<FunctionValue>, _vm: Arc<Vm>) -> Result<Self, ConversionError> {
        Ok(function)
    }
}

/// Argument tuples accepted by [`TypedFunction::call`].
pub trait ArgList {
    fn param_types() -> Vec<TypeHash>;
    fn into_values(self) -> Vec<Value>;
}

impl ArgList for () {
    fn param_types() -> Vec<TypeHash> {
        Vec::new()
    }

    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_arg_list {
    ($($name:ident),+) => {
        impl<$($name: IntoValue + TypedValue),+> ArgList for ($($name,)+) {
            fn param_types() -> Vec<TypeHash> {
                vec![$($name::TYPE),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into_value()),+]
            }
        }
    };
}

impl_arg_list!(A);
impl_arg_list!(A, B);
impl_arg_list!(A, B, C);
impl_arg_list!(A, B, C, D);
impl_arg_list!(A, B, C, D, E);
impl_arg_list!(A, B, C, D, E, F);
impl_arg_list!(A, B, C, D, E, F, G);
impl_arg_list!(A, B, C, D, E, F, G, H);

/// A function value bound to Rust argument and return types.
pub struct TypedFunction<Args, R> {
    function: Arc<FunctionValue>,
    vm: Arc<Vm>,
    _shape: PhantomData<fn(Args) -> R>,
}

impl<Args, R> Clone for TypedFunction<Args, R> {
    fn clone(&self) -> Self {
        Self {
            function: Arc::clone(&self.function),
            vm: Arc::clone(&self.vm),
            _shape: PhantomData,
        }
    }
}

impl<Args, R> fmt::Debug for TypedFunction<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFunction")
            .field("signature", self.function.signature())
            .finish_non_exhaustive()
    }
}

impl<Args: ArgList, R: FromValue> TypedFunction<Args, R> {
    pub fn call(&self, args: Args) -> Result<R, RuntimeError> {
        let result = self.vm.call(&self.function, args.into_values())?;
        Ok(R::from_value(&result)?)
    }

    pub fn function(&self) -> &Arc<FunctionValue> {
        &self.function
    }
}

impl<Args: ArgList, R: FromValue> FunctionShape for TypedFunction<Args, R> {
    fn bind(function: Arc<FunctionValue>, vm: Arc<Vm>) -> Result<Self, ConversionError> {
        check_signature(function.signature(), &Args::param_types(), R::is_void_shape())?;
        Ok(Self {
            function,
            vm,
            _shape: PhantomData,
        })
    }
}

fn check_signature(signature: &FunctionSignature, params: &[TypeHash], void: bool) -> Result<(), ConversionError> {
    if signature.params == params && signature.returns_value() != void {
        return Ok(());
    }
    let describe = |params: &[TypeHash], returns: bool| {
        let list: Vec<String> = params.iter().map(ToString::to_string).collect();
        format!("({}) -> {}", list.join(", "), if returns { "value" } else { "void" })
    };
    Err(ConversionError::SignatureMismatch {
        expected: describe(params, !void),
        actual: describe(&signature.params, signature.returns_value()),
    })
}
