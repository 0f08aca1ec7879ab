//! Operation codes.
//!
//! Each opcode is one byte with its operands inline, 16-bit operands
//! big-endian. The machine is stack based: operands are pushed before the
//! operator that consumes them.

use dynemit_core::{TypeHash, primitives};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool.
    /// Operand: u8 constant index
    Constant = 0,
    /// Operand: u16 constant index
    ConstantWide,
    PushNull,
    PushTrue,
    PushFalse,
    /// Push the default value of a type.
    /// Operand: u16 constant index (type hash)
    PushDefault,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop,
    Dup,

    // =========================================================================
    // Arguments and Locals
    // =========================================================================
    /// Operand: u8 argument slot (slot 0 is `this` for instance methods)
    GetArg,
    /// Operand: u8 argument slot
    SetArg,
    /// Operand: u16 local slot
    GetLocal,
    /// Operand: u16 local slot
    SetLocal,

    // =========================================================================
    // Arithmetic and Bitwise
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,

    // =========================================================================
    // Comparison
    // =========================================================================
    Eq,
    Lt,
    Gt,
    Not,

    /// Numeric conversion.
    /// Operand: u8 [`NumericKind`]
    Convert,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Operand: u16 forward offset
    Jump,
    /// Pops the condition.
    /// Operand: u16 forward offset
    JumpIfFalse,
    /// Operand: u16 backward offset
    Loop,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Operand: u16 constant index (method hash) + u8 arg count
    CallStatic,
    /// Receiver below the arguments.
    /// Operand: u16 constant index (method hash) + u8 arg count
    CallMethod,
    /// Dispatch on the receiver's runtime type.
    /// Operand: u16 constant index (method hash) + u8 arg count
    CallVirtual,
    /// Call a separately compiled source method.
    /// Operand: u8 callee index + u8 arg count
    CallUnit,
    /// Operand: u8 arg count
    CallSelf,
    /// Operand: u16 type constant + u16 constructor constant + u8 arg count
    New,
    Return,
    ReturnVoid,

    // =========================================================================
    // Members
    // =========================================================================
    /// Operand: u16 constant index (member hash), for all member opcodes
    GetField,
    SetField,
    GetProperty,
    GetPropertyVirtual,
    GetStaticProperty,
    SetProperty,
    SetPropertyVirtual,
    SetStaticProperty,

    // =========================================================================
    // Arrays
    // =========================================================================
    /// Pops one size per dimension.
    /// Operand: u16 constant index (element type) + u8 rank
    NewArray,
    /// Operand: u8 rank
    LoadElement,
    /// Operand: u8 rank
    StoreElement,

    // =========================================================================
    // Function Values
    // =========================================================================
    /// Push the cached function value of a materialized lambda.
    /// Operand: u8 lambda index
    LoadDelegate,
    /// Function value below the arguments.
    /// Operand: u8 arg count
    InvokeDelegate,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        OpCode::try_from(byte).ok()
    }

    /// Operand bytes following the opcode.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushNull
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Neg
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::BitNot
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Eq
            | OpCode::Lt
            | OpCode::Gt
            | OpCode::Not
            | OpCode::Return
            | OpCode::ReturnVoid => 0,

            OpCode::Constant
            | OpCode::GetArg
            | OpCode::SetArg
            | OpCode::Convert
            | OpCode::CallSelf
            | OpCode::LoadElement
            | OpCode::StoreElement
            | OpCode::LoadDelegate
            | OpCode::InvokeDelegate => 1,

            OpCode::ConstantWide
            | OpCode::PushDefault
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop
            | OpCode::CallUnit
            | OpCode::GetField
            | OpCode::SetField
            | OpCode::GetProperty
            | OpCode::GetPropertyVirtual
            | OpCode::GetStaticProperty
            | OpCode::SetProperty
            | OpCode::SetPropertyVirtual
            | OpCode::SetStaticProperty => 2,

            OpCode::CallStatic | OpCode::CallMethod | OpCode::CallVirtual | OpCode::NewArray => 3,

            OpCode::New => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushDefault => "PUSH_DEFAULT",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::GetArg => "GET_ARG",
            OpCode::SetArg => "SET_ARG",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Rem => "REM",
            OpCode::Neg => "NEG",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::BitNot => "BIT_NOT",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::Not => "NOT",
            OpCode::Convert => "CONVERT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::Loop => "LOOP",
            OpCode::CallStatic => "CALL_STATIC",
            OpCode::CallMethod => "CALL_METHOD",
            OpCode::CallVirtual => "CALL_VIRTUAL",
            OpCode::CallUnit => "CALL_UNIT",
            OpCode::CallSelf => "CALL_SELF",
            OpCode::New => "NEW",
            OpCode::Return => "RETURN",
            OpCode::ReturnVoid => "RETURN_VOID",
            OpCode::GetField => "GET_FIELD",
            OpCode::SetField => "SET_FIELD",
            OpCode::GetProperty => "GET_PROPERTY",
            OpCode::GetPropertyVirtual => "GET_PROPERTY_VIRTUAL",
            OpCode::GetStaticProperty => "GET_STATIC_PROPERTY",
            OpCode::SetProperty => "SET_PROPERTY",
            OpCode::SetPropertyVirtual => "SET_PROPERTY_VIRTUAL",
            OpCode::SetStaticProperty => "SET_STATIC_PROPERTY",
            OpCode::NewArray => "NEW_ARRAY",
            OpCode::LoadElement => "LOAD_ELEMENT",
            OpCode::StoreElement => "STORE_ELEMENT",
            OpCode::LoadDelegate => "LOAD_DELEGATE",
            OpCode::InvokeDelegate => "INVOKE_DELEGATE",
        }
    }
}

/// Target of a [`OpCode::Convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NumericKind {
    Int32 = 0,
    Int64,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl NumericKind {
    /// Kind of a numeric primitive type.
    pub fn of(hash: TypeHash) -> Option<NumericKind> {
        Some(match hash {
            h if h == primitives::INT32 => NumericKind::Int32,
            h if h == primitives::INT64 => NumericKind::Int64,
            h if h == primitives::UINT32 => NumericKind::UInt32,
            h if h == primitives::UINT64 => NumericKind::UInt64,
            h if h == primitives::FLOAT => NumericKind::Float32,
            h if h == primitives::DOUBLE => NumericKind::Float64,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumericKind::Int32 => "int",
            NumericKind::Int64 => "int64",
            NumericKind::UInt32 => "uint",
            NumericKind::UInt64 => "uint64",
            NumericKind::Float32 => "float",
            NumericKind::Float64 => "double",
        }
    }
}
