//! Native functions and the context that bridges them to the executor.

use crate::convert::{FromValue, IntoValue};
use crate::error::RuntimeError;
use crate::function::{FunctionValue, Invoker};
use crate::type_hash::TypeHash;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type NativeBody = dyn Fn(&mut CallContext<'_>) -> Result<(), RuntimeError> + Send + Sync;

/// Type-erased host function.
///
/// Cloning shares the underlying closure.
#[derive(Clone)]
pub struct NativeFn {
    id: TypeHash,
    inner: Arc<NativeBody>,
}

impl NativeFn {
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        Self { id, inner: Arc::new(f) }
    }

    pub fn id(&self) -> TypeHash {
        self.id
    }

    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), RuntimeError> {
        (self.inner)(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Context for one native call.
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// ctx.set_return(x + 1);
/// ```
pub struct CallContext<'vm> {
    this: Option<&'vm Value>,
    args: &'vm [Value],
    return_slot: Value,
    invoker: &'vm dyn Invoker,
    /// Runtime type of the object a constructor is building.
    constructed_type: Option<TypeHash>,
}

impl<'vm> CallContext<'vm> {
    pub fn new(this: Option<&'vm Value>, args: &'vm [Value], invoker: &'vm dyn Invoker) -> Self {
        Self {
            this,
            args,
            return_slot: Value::Void,
            invoker,
            constructed_type: None,
        }
    }

    /// Context for a constructor building an object of `type_hash`.
    pub fn for_constructor(args: &'vm [Value], type_hash: TypeHash, invoker: &'vm dyn Invoker) -> Self {
        Self {
            constructed_type: Some(type_hash),
            ..Self::new(None, args, invoker)
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn arg_slot(&self, index: usize) -> Result<&Value, RuntimeError> {
        self.args.get(index).ok_or_else(|| RuntimeError::TypeMismatch {
            expected: format!("argument {index}"),
            actual: format!("{} arguments", self.args.len()),
        })
    }

    /// Typed argument extraction.
    pub fn arg<T: FromValue>(&self, index: usize) -> Result<T, RuntimeError> {
        Ok(T::from_value(self.arg_slot(index)?)?)
    }

    pub fn this_value(&self) -> Result<&Value, RuntimeError> {
        self.this.ok_or_else(|| RuntimeError::NullReference {
            context: "instance call without receiver".into(),
        })
    }

    /// Borrow the receiver's payload as `T`.
    pub fn with_this<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, RuntimeError> {
        match self.this_value()? {
            Value::Object(obj) => obj.with(f),
            other => Err(RuntimeError::TypeMismatch {
                expected: std::any::type_name::<T>().into(),
                actual: other.kind_name().into(),
            }),
        }
    }

    pub fn with_this_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RuntimeError> {
        match self.this_value()? {
            Value::Object(obj) => obj.with_mut(f),
            other => Err(RuntimeError::TypeMismatch {
                expected: std::any::type_name::<T>().into(),
                actual: other.kind_name().into(),
            }),
        }
    }

    pub fn constructed_type(&self) -> Option<TypeHash> {
        self.constructed_type
    }

    pub fn set_return<T: IntoValue>(&mut self, value: T) {
        self.return_slot = value.into_value();
    }

    pub fn set_return_value(&mut self, value: Value) {
        self.return_slot = value;
    }

    pub fn take_return(&mut self) -> Value {
        std::mem::take(&mut self.return_slot)
    }

    /// Call a function value (e.g. a delegate argument) from inside a native.
    pub fn invoke(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.invoker.invoke(function, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoInvoker;

    impl Invoker for NoInvoker {
        fn invoke(&self, _: &FunctionValue, _: Vec<Value>) -> Result<Value, RuntimeError> {
            Err(RuntimeError::native("unused"))
        }
    }

    #[test]
    fn typed_arguments_and_return() {
        let args = [Value::Int32(2), Value::String("x".into())];
        let mut ctx = CallContext::new(None, &args, &NoInvoker);
        let n: i32 = ctx.arg(0).unwrap();
        let s: String = ctx.arg(1).unwrap();
        assert_eq!((n, s.as_str()), (2, "x"));
        assert!(ctx.arg::<i32>(2).is_err());
        ctx.set_return(n + 1);
        assert_eq!(ctx.take_return(), Value::Int32(3));
        assert_eq!(ctx.take_return(), Value::Void);
    }

    #[test]
    fn receiver_access() {
        let this = Value::object(TypeHash::from_name("Counter"), 5u32);
        let ctx = CallContext::new(Some(&this), &[], &NoInvoker);
        ctx.with_this_mut(|n: &mut u32| *n += 1).unwrap();
        assert_eq!(ctx.with_this(|n: &u32| *n).unwrap(), 6);

        let static_ctx = CallContext::new(None, &[], &NoInvoker);
        assert!(matches!(static_ctx.this_value(), Err(RuntimeError::NullReference { .. })));
    }

    #[test]
    fn native_fn_shares_closure_on_clone() {
        let f = NativeFn::new(TypeHash::from_name("id"), |ctx| {
            let v = ctx.arg_slot(0)?.clone();
            ctx.set_return_value(v);
            Ok(())
        });
        let g = f.clone();
        let args = [Value::Bool(true)];
        let mut ctx = CallContext::new(None, &args, &NoInvoker);
        g.call(&mut ctx).unwrap();
        assert_eq!(ctx.take_return(), Value::Bool(true));
        assert_eq!(f.id(), g.id());
    }
}
