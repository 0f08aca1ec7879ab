//! Activation records and the instruction loop.

use super::{Execution, arith};
use dynemit_compiler::{CompiledMethod, Constant, NumericKind, OpCode};
use dynemit_core::{
    ArrayRef, CallContext, FromValue, FunctionValue, Invoker, ObjectRef, RuntimeError, TypeHash, Value,
};
use dynemit_registry::{MethodEntry, MethodImpl, PropertyEntry};
use std::sync::Arc;

type Result<T> = std::result::Result<T, RuntimeError>;

/// One activation of a compiled method.
pub(super) struct StackFrame<'m> {
    method: &'m CompiledMethod,
    /// Receiver (when the method has one) followed by the arguments.
    args: Vec<Value>,
    locals: Vec<Value>,
    stack: Vec<Value>,
    ip: usize,
}

impl<'m> StackFrame<'m> {
    pub(super) fn new(method: &'m CompiledMethod, this: Option<Value>, args: Vec<Value>) -> Result<Self> {
        if args.len() != method.param_count {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{} argument(s) for '{}'", method.param_count, method.name),
                actual: args.len().to_string(),
            });
        }
        let mut slots = Vec::with_capacity(method.arg_slots());
        if method.has_this {
            slots.push(this.unwrap_or(Value::Null));
        }
        for arg in args {
            slots.push(arg.copied()?);
        }

        Ok(Self {
            method,
            args: slots,
            locals: vec![Value::Void; method.local_count],
            stack: Vec::with_capacity(16),
            ip: 0,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::InvalidBytecode {
            offset: self.ip,
            reason: reason.into(),
        }
    }

    fn read_op(&mut self) -> Result<OpCode> {
        let byte = self.read_byte()?;
        OpCode::from_u8(byte).ok_or_else(|| self.invalid(format!("unknown opcode {byte:#04x}")))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = self
            .method
            .chunk
            .read_byte(self.ip)
            .ok_or_else(|| self.invalid("unexpected end of code"))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let value = self
            .method
            .chunk
            .read_u16(self.ip)
            .ok_or_else(|| self.invalid("unexpected end of code"))?;
        self.ip += 2;
        Ok(value)
    }

    fn constant(&self, index: u32) -> Result<Value> {
        self.method
            .constants
            .get(index)
            .and_then(Constant::to_value)
            .ok_or_else(|| self.invalid(format!("constant {index} is not a value")))
    }

    fn read_hash(&mut self) -> Result<TypeHash> {
        let index = u32::from(self.read_u16()?);
        self.method
            .constants
            .get(index)
            .and_then(Constant::as_hash)
            .ok_or_else(|| self.invalid(format!("constant {index} is not a hash")))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or_else(|| self.invalid("stack underflow"))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        if self.stack.len() < count {
            return Err(self.invalid("stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or_else(|| self.invalid("stack underflow"))
    }

    fn pop_bool(&mut self) -> Result<bool> {
        let value = self.pop()?;
        Ok(bool::from_value(&value)?)
    }

    fn pop_indices(&mut self, rank: u8) -> Result<Vec<i64>> {
        self.pop_n(usize::from(rank))?
            .iter()
            .map(|index| i64::from_value(index).map_err(RuntimeError::from))
            .collect()
    }

    fn arg(&self, slot: u8) -> Result<Value> {
        self.args
            .get(usize::from(slot))
            .cloned()
            .ok_or_else(|| self.invalid(format!("argument slot {slot} out of range")))
    }

    fn set_arg(&mut self, slot: u8, value: Value) -> Result<()> {
        let Some(target) = self.args.get_mut(usize::from(slot)) else {
            return Err(self.invalid(format!("argument slot {slot} out of range")));
        };
        *target = value;
        Ok(())
    }

    fn local(&self, slot: u16) -> Result<Value> {
        self.locals
            .get(usize::from(slot))
            .cloned()
            .ok_or_else(|| self.invalid(format!("local slot {slot} out of range")))
    }

    fn set_local(&mut self, slot: u16, value: Value) -> Result<()> {
        let Some(target) = self.locals.get_mut(usize::from(slot)) else {
            return Err(self.invalid(format!("local slot {slot} out of range")));
        };
        *target = value;
        Ok(())
    }
}

fn expect_object(value: &Value, member: &str) -> Result<ObjectRef> {
    match value {
        Value::Object(object) => Ok(object.clone()),
        Value::Null | Value::Void => Err(RuntimeError::NullReference {
            context: format!("access to '{member}'"),
        }),
        other => Err(RuntimeError::TypeMismatch {
            expected: "object".into(),
            actual: other.kind_name().into(),
        }),
    }
}

fn expect_array(value: &Value) -> Result<&ArrayRef> {
    match value {
        Value::Array(array) => Ok(array),
        Value::Null | Value::Void => Err(RuntimeError::NullReference {
            context: "array element access".into(),
        }),
        other => Err(RuntimeError::TypeMismatch {
            expected: "array".into(),
            actual: other.kind_name().into(),
        }),
    }
}

fn expect_receiver(value: &Value, member: &str) -> Result<()> {
    if value.is_null() || value.is_void() {
        return Err(RuntimeError::NullReference {
            context: format!("call to '{member}'"),
        });
    }
    Ok(())
}

impl Execution<'_> {
    /// Run `method` to completion in a fresh frame.
    pub(super) fn run(&self, method: &CompiledMethod, this: Option<Value>, args: Vec<Value>) -> Result<Value> {
        let _depth = self.enter()?;
        let mut frame = StackFrame::new(method, this, args)?;

        loop {
            let op = frame.read_op()?;
            match op {
                OpCode::Constant => {
                    let index = u32::from(frame.read_byte()?);
                    let value = frame.constant(index)?;
                    frame.push(value);
                }
                OpCode::ConstantWide => {
                    let index = u32::from(frame.read_u16()?);
                    let value = frame.constant(index)?;
                    frame.push(value);
                }
                OpCode::PushNull => frame.push(Value::Null),
                OpCode::PushTrue => frame.push(Value::Bool(true)),
                OpCode::PushFalse => frame.push(Value::Bool(false)),
                OpCode::PushDefault => {
                    let ty = frame.read_hash()?;
                    frame.push(self.catalog().default_value(ty));
                }
                OpCode::Pop => {
                    frame.pop()?;
                }
                OpCode::Dup => {
                    let top = frame.peek()?.clone();
                    frame.push(top);
                }

                OpCode::GetArg => {
                    let slot = frame.read_byte()?;
                    let value = frame.arg(slot)?;
                    frame.push(value);
                }
                OpCode::SetArg => {
                    let slot = frame.read_byte()?;
                    let value = frame.pop()?.copied()?;
                    frame.set_arg(slot, value)?;
                }
                OpCode::GetLocal => {
                    let slot = frame.read_u16()?;
                    let value = frame.local(slot)?;
                    frame.push(value);
                }
                OpCode::SetLocal => {
                    let slot = frame.read_u16()?;
                    let value = frame.pop()?.copied()?;
                    frame.set_local(slot, value)?;
                }

                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Rem
                | OpCode::BitAnd
                | OpCode::BitOr
                | OpCode::BitXor
                | OpCode::Shl
                | OpCode::Shr => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.push(arith::binary(op, &left, &right)?);
                }
                OpCode::Neg | OpCode::Not | OpCode::BitNot => {
                    let operand = frame.pop()?;
                    frame.push(arith::unary(op, &operand)?);
                }
                OpCode::Eq => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.push(Value::Bool(left == right));
                }
                OpCode::Lt | OpCode::Gt => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    frame.push(Value::Bool(arith::compare(op, &left, &right)?));
                }
                OpCode::Convert => {
                    let byte = frame.read_byte()?;
                    let kind = NumericKind::try_from(byte)
                        .map_err(|_| frame.invalid(format!("unknown numeric kind {byte}")))?;
                    let value = frame.pop()?;
                    frame.push(arith::convert(&value, kind)?);
                }

                OpCode::Jump => {
                    let offset = usize::from(frame.read_u16()?);
                    frame.ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = usize::from(frame.read_u16()?);
                    if !frame.pop_bool()? {
                        frame.ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = usize::from(frame.read_u16()?);
                    frame.ip = frame
                        .ip
                        .checked_sub(offset)
                        .ok_or_else(|| frame.invalid("loop target before start of code"))?;
                }

                OpCode::CallStatic | OpCode::CallMethod | OpCode::CallVirtual => {
                    let hash = frame.read_hash()?;
                    let argc = usize::from(frame.read_byte()?);
                    let args = frame.pop_n(argc)?;
                    let entry = self.host_method(hash)?;
                    let returns_value = entry.returns_value();

                    let result = if op == OpCode::CallStatic {
                        self.call_host(&entry, None, args)?
                    } else {
                        let receiver = frame.pop()?;
                        expect_receiver(&receiver, &entry.name)?;
                        let entry = match receiver.runtime_type() {
                            Some(runtime) if op == OpCode::CallVirtual => {
                                self.catalog().resolve_override(runtime, &entry)
                            }
                            _ => entry,
                        };
                        self.call_host(&entry, Some(&receiver), args)?
                    };
                    if returns_value {
                        frame.push(result);
                    }
                }
                OpCode::CallUnit => {
                    let index = usize::from(frame.read_byte()?);
                    let argc = usize::from(frame.read_byte()?);
                    let callee = frame
                        .method
                        .callees
                        .get(index)
                        .map(Arc::clone)
                        .ok_or_else(|| frame.invalid(format!("callee {index} out of range")))?;
                    let args = frame.pop_n(argc)?;
                    let result = self.run(&callee, None, args)?;
                    if callee.returns_value {
                        frame.push(result);
                    }
                }
                OpCode::CallSelf => {
                    let argc = usize::from(frame.read_byte()?);
                    let args = frame.pop_n(argc)?;
                    let method = frame.method;
                    let this = if method.has_this { frame.arg(0).ok() } else { None };
                    let result = self.run(method, this, args)?;
                    if method.returns_value {
                        frame.push(result);
                    }
                }
                OpCode::New => {
                    let ty = frame.read_hash()?;
                    let ctor = frame.read_hash()?;
                    let argc = usize::from(frame.read_byte()?);
                    let args = frame.pop_n(argc)?;
                    let object = self.construct(ty, ctor, &args)?;
                    frame.push(object);
                }
                OpCode::Return => return frame.pop(),
                OpCode::ReturnVoid => return Ok(Value::Void),

                OpCode::GetField => {
                    let hash = frame.read_hash()?;
                    let field = self.catalog().field(hash).ok_or_else(|| self.missing_member(hash))?;
                    let receiver = frame.pop()?;
                    let object = expect_object(&receiver, &field.name)?;
                    frame.push((field.getter)(&object)?);
                }
                OpCode::SetField => {
                    let hash = frame.read_hash()?;
                    let field = self.catalog().field(hash).ok_or_else(|| self.missing_member(hash))?;
                    let value = frame.pop()?.copied()?;
                    let receiver = frame.pop()?;
                    let object = expect_object(&receiver, &field.name)?;
                    (field.setter)(&object, value)?;
                }
                OpCode::GetProperty | OpCode::GetPropertyVirtual | OpCode::GetStaticProperty => {
                    let hash = frame.read_hash()?;
                    let property = self.property(hash)?;
                    let value = if op == OpCode::GetStaticProperty {
                        self.get_property(&property, None)?
                    } else {
                        let receiver = frame.pop()?;
                        expect_receiver(&receiver, &property.name)?;
                        let property = self.dispatch_property(op == OpCode::GetPropertyVirtual, &receiver, property);
                        self.get_property(&property, Some(&receiver))?
                    };
                    frame.push(value);
                }
                OpCode::SetProperty | OpCode::SetPropertyVirtual | OpCode::SetStaticProperty => {
                    let hash = frame.read_hash()?;
                    let property = self.property(hash)?;
                    let value = frame.pop()?;
                    if op == OpCode::SetStaticProperty {
                        self.set_property(&property, None, value)?;
                    } else {
                        let receiver = frame.pop()?;
                        expect_receiver(&receiver, &property.name)?;
                        let property = self.dispatch_property(op == OpCode::SetPropertyVirtual, &receiver, property);
                        self.set_property(&property, Some(&receiver), value)?;
                    }
                }

                OpCode::NewArray => {
                    let element = frame.read_hash()?;
                    let rank = frame.read_byte()?;
                    let dims = frame
                        .pop_indices(rank)?
                        .into_iter()
                        .map(|size| usize::try_from(size).map_err(|_| RuntimeError::IndexOutOfRange { index: size, length: 0 }))
                        .collect::<Result<Vec<_>>>()?;
                    let fill = self.catalog().default_value(element);
                    frame.push(Value::Array(ArrayRef::new(element, dims, fill)?));
                }
                OpCode::LoadElement => {
                    let rank = frame.read_byte()?;
                    let indices = frame.pop_indices(rank)?;
                    let array = frame.pop()?;
                    frame.push(expect_array(&array)?.get(&indices)?);
                }
                OpCode::StoreElement => {
                    let rank = frame.read_byte()?;
                    let value = frame.pop()?.copied()?;
                    let indices = frame.pop_indices(rank)?;
                    let array = frame.pop()?;
                    expect_array(&array)?.set(&indices, value)?;
                }

                OpCode::LoadDelegate => {
                    let index = usize::from(frame.read_byte()?);
                    let lambda = frame
                        .method
                        .lambdas
                        .get(index)
                        .ok_or_else(|| frame.invalid(format!("lambda {index} out of range")))?;
                    frame.push(Value::Function(lambda.delegate()));
                }
                OpCode::InvokeDelegate => {
                    let argc = usize::from(frame.read_byte()?);
                    let args = frame.pop_n(argc)?;
                    let callee = frame.pop()?;
                    let function = expect_function(&callee)?;
                    let result = self.invoke(&function, args)?;
                    if function.signature().returns_value() {
                        frame.push(result);
                    }
                }
            }
        }
    }

    fn host_method(&self, hash: TypeHash) -> Result<Arc<MethodEntry>> {
        self.catalog().method(hash).ok_or_else(|| self.missing_member(hash))
    }

    fn property(&self, hash: TypeHash) -> Result<Arc<PropertyEntry>> {
        self.catalog().property(hash).ok_or_else(|| self.missing_member(hash))
    }

    fn missing_member(&self, hash: TypeHash) -> RuntimeError {
        RuntimeError::MemberNotFound {
            type_name: "<catalog>".into(),
            member: hash.to_string(),
        }
    }

    fn call_host(&self, entry: &MethodEntry, this: Option<&Value>, args: Vec<Value>) -> Result<Value> {
        match &entry.implementation {
            MethodImpl::Native(native) => {
                let mut ctx = CallContext::new(this, &args, self);
                native.call(&mut ctx)?;
                Ok(ctx.take_return())
            }
            MethodImpl::DelegateInvoke => {
                let callee = this.ok_or_else(|| RuntimeError::NullReference {
                    context: format!("call to '{}'", entry.name),
                })?;
                let function = expect_function(callee)?;
                self.invoke(&function, args)
            }
        }
    }

    fn construct(&self, ty: TypeHash, ctor: TypeHash, args: &[Value]) -> Result<Value> {
        let entry = self.host_method(ctor)?;
        let MethodImpl::Native(native) = &entry.implementation else {
            return Err(RuntimeError::TypeMismatch {
                expected: "native constructor".into(),
                actual: entry.name.clone(),
            });
        };
        let mut ctx = CallContext::for_constructor(args, ty, self);
        native.call(&mut ctx)?;
        Ok(ctx.take_return())
    }

    fn dispatch_property(&self, virtual_: bool, receiver: &Value, property: Arc<PropertyEntry>) -> Arc<PropertyEntry> {
        match receiver.runtime_type() {
            Some(runtime) if virtual_ => self.catalog().resolve_property_override(runtime, &property),
            _ => property,
        }
    }

    fn get_property(&self, property: &PropertyEntry, this: Option<&Value>) -> Result<Value> {
        let getter = property.getter.as_ref().ok_or_else(|| RuntimeError::MemberNotFound {
            type_name: self.catalog().display_name(property.owner),
            member: format!("get_{}", property.name),
        })?;
        let mut ctx = CallContext::new(this, &[], self);
        getter.call(&mut ctx)?;
        Ok(ctx.take_return())
    }

    fn set_property(&self, property: &PropertyEntry, this: Option<&Value>, value: Value) -> Result<()> {
        let setter = property.setter.as_ref().ok_or_else(|| RuntimeError::MemberNotFound {
            type_name: self.catalog().display_name(property.owner),
            member: format!("set_{}", property.name),
        })?;
        let args = [value];
        let mut ctx = CallContext::new(this, &args, self);
        setter.call(&mut ctx)
    }
}

fn expect_function(value: &Value) -> Result<Arc<FunctionValue>> {
    match value {
        Value::Function(function) => Ok(Arc::clone(function)),
        Value::Null | Value::Void => Err(RuntimeError::NullReference {
            context: "delegate invocation".into(),
        }),
        other => Err(RuntimeError::TypeMismatch {
            expected: "function value".into(),
            actual: other.kind_name().into(),
        }),
    }
}
