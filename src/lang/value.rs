use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::op::Instructions;

/// Runtime value in the Cinder language.
///
/// Values live on the VM's stack, in the globals array and in the constant
/// pool. Heap-backed kinds share their payload through `Rc`, which is what
/// gives `==`/`!=` their identity semantics on non-integer kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit floating-point number. Not hashable.
    Float(f64),

    /// Boolean value.
    Boolean(bool),

    /// Immutable string.
    Str(Rc<String>),

    Null,

    /// Ordered, 0-indexed sequence.
    Array(Rc<Vec<Value>>),

    /// Mapping from hash keys to (original key, stored value) pairs.
    Hash(Rc<HashMap<HashKey, HashPair>>),

    /// A runtime error surfaced as a value (produced by builtins).
    Error(String),

    /// Bytecode function, callable by the VM.
    CompiledFunction(Rc<CompiledFunction>),

    /// Native function registered by name.
    Builtin(Builtin),
}

/// A function lowered to bytecode.
///
/// Parameters occupy the first `num_parameters` local slots, so
/// `num_locals >= num_parameters` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A native function invokable from user code.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(&[Value]) -> Value,
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Key under which a hashable value is stored in a `Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: &'static str,
    pub value: u64,
}

/// One occupied hash slot: the original key (kept for inspection) plus the
/// stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a over a byte slice.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

impl Value {
    /// The value's kind string, as it appears in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Error(_) => "ERROR",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION_OBJ",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// Builds the hash key for this value, or `None` for unhashable kinds.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(value) => Some(HashKey {
                kind: self.kind(),
                value: *value as u64,
            }),
            Value::Boolean(value) => Some(HashKey {
                kind: self.kind(),
                value: u64::from(*value),
            }),
            Value::Str(value) => Some(HashKey {
                kind: self.kind(),
                value: fnv1a(value.as_bytes()),
            }),
            _ => None,
        }
    }

    /// Identity comparison backing the VM's `Equal`/`NotEqual` on
    /// non-integer kinds: booleans and null compare as singletons,
    /// heap-backed kinds compare by pointer, mixed kinds never match.
    pub fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Canonical human-readable rendering ("inspect").
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::Error(message) => write!(f, "ERROR: {}", message),
            Value::CompiledFunction(func) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}
