//! Registered surfaces, host values and shared instance handles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use log::trace;
use serde::Deserialize;

use super::naming::Role;
use crate::codes::{CapabilitySet, Coder, CoderFactory};
use crate::error::{Error, Result};

/// How host byte buffers shorter than the engine expects are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferPolicy {
    /// Reject short buffers with [`Error::BufferLength`].
    #[default]
    Strict,
    /// Copy what is there and zero-fill the rest.
    Truncate,
}

impl BufferPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            BufferPolicy::Strict => "strict",
            BufferPolicy::Truncate => "truncate",
        }
    }
}

impl fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BufferPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(BufferPolicy::Strict),
            "truncate" => Ok(BufferPolicy::Truncate),
            other => Err(Error::Config(format!("unknown buffer policy: {}", other))),
        }
    }
}

/// A value crossing the host boundary.
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    Coder(CoderHandle),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Coder(_) => "coder",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers are accepted where a float is expected.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_coder(self) -> Option<CoderHandle> {
        match self {
            Value::Coder(c) => Some(c),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Length an engine expects from a host input buffer.
#[derive(Debug, Clone, Copy)]
pub enum Expect {
    /// Fixed-size input such as a symbol, a block or a feedback bitmap.
    Exact(usize),
    /// Self-describing input such as a payload; the engine validates the
    /// framing, so short input is only padded under `Truncate`.
    UpTo(usize),
}

/// Arguments of one call, with the marshaling rules of its surface.
pub struct Args<'a> {
    surface: &'a str,
    operation: &'a str,
    values: &'a [Value],
    policy: BufferPolicy,
}

impl<'a> Args<'a> {
    pub fn new(surface: &'a str, operation: &'a str, values: &'a [Value], policy: BufferPolicy) -> Self {
        Args {
            surface,
            operation,
            values,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> Error {
        Error::Argument {
            operation: self.operation.to_string(),
            index,
            expected,
        }
    }

    fn get(&self, index: usize, expected: &'static str) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| self.mismatch(index, expected))
    }

    /// Fails when more than `count` arguments were passed.
    pub fn at_most(&self, count: usize) -> Result<()> {
        if self.values.len() > count {
            return Err(self.mismatch(count, "absent"));
        }
        Ok(())
    }

    pub fn uint(&self, index: usize) -> Result<u64> {
        const EXPECTED: &str = "an unsigned integer";
        self.get(index, EXPECTED)?
            .as_uint()
            .ok_or_else(|| self.mismatch(index, EXPECTED))
    }

    pub fn index(&self, index: usize) -> Result<usize> {
        Ok(self.uint(index)? as usize)
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        const EXPECTED: &str = "a number";
        self.get(index, EXPECTED)?
            .as_float()
            .ok_or_else(|| self.mismatch(index, EXPECTED))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        const EXPECTED: &str = "a bool";
        self.get(index, EXPECTED)?
            .as_bool()
            .ok_or_else(|| self.mismatch(index, EXPECTED))
    }

    pub fn str(&self, index: usize) -> Result<&str> {
        const EXPECTED: &str = "a string";
        self.get(index, EXPECTED)?
            .as_str()
            .ok_or_else(|| self.mismatch(index, EXPECTED))
    }

    pub fn bytes(&self, index: usize) -> Result<&[u8]> {
        const EXPECTED: &str = "bytes";
        self.get(index, EXPECTED)?
            .as_bytes()
            .ok_or_else(|| self.mismatch(index, EXPECTED))
    }

    /// Copies a host buffer into one sized for the engine.
    ///
    /// Longer input is cut in every mode. Shorter input fails under
    /// `Strict` for fixed-size inputs and is zero-filled under `Truncate`.
    pub fn input(&self, index: usize, expect: Expect) -> Result<Vec<u8>> {
        let data = self.bytes(index)?;
        let (expected, exact) = match expect {
            Expect::Exact(n) => (n, true),
            Expect::UpTo(n) => (n, false),
        };
        if data.len() >= expected {
            return Ok(data[..expected].to_vec());
        }
        match self.policy {
            BufferPolicy::Strict if exact => Err(Error::BufferLength {
                operation: self.operation.to_string(),
                expected,
                actual: data.len(),
            }),
            BufferPolicy::Strict => Ok(data.to_vec()),
            BufferPolicy::Truncate => {
                let mut buf = vec![0u8; expected];
                buf[..data.len()].copy_from_slice(data);
                Ok(buf)
            }
        }
    }

    /// Unwraps a capability accessor of the engine behind this call.
    pub fn require<T>(&self, accessor: Option<T>, capability: &'static str) -> Result<T> {
        accessor.ok_or_else(|| Error::MissingCapability {
            surface: self.surface.to_string(),
            capability: capability.to_string(),
        })
    }
}

/// Runs `write` against a scratch buffer of `size` bytes and returns the
/// bytes it reports as written.
pub fn scratch<W>(size: usize, write: W) -> Result<Value>
where
    W: FnOnce(&mut [u8]) -> Result<usize>,
{
    let mut buf = vec![0u8; size];
    let written = write(&mut buf)?;
    buf.truncate(written);
    Ok(Value::Bytes(buf))
}

type Method<T> = Arc<dyn Fn(&mut T, &Args<'_>) -> Result<Value> + Send + Sync>;

/// Named dispatch table over one kind of target.
pub struct Surface<T: ?Sized> {
    name: String,
    role: Role,
    capabilities: CapabilitySet,
    policy: BufferPolicy,
    methods: BTreeMap<&'static str, Method<T>>,
}

pub type CoderSurface = Surface<dyn Coder>;

impl<T: ?Sized> Surface<T> {
    pub(crate) fn new(name: String, role: Role, capabilities: CapabilitySet, policy: BufferPolicy) -> Self {
        Surface {
            name,
            role,
            capabilities,
            policy,
            methods: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Bound operation names, sorted.
    pub fn operations(&self) -> Vec<&'static str> {
        self.methods.keys().copied().collect()
    }

    pub fn has(&self, operation: &str) -> bool {
        self.methods.contains_key(operation)
    }

    pub(crate) fn bind<M>(&mut self, operation: &'static str, method: M) -> Result<()>
    where
        M: Fn(&mut T, &Args<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        if self.methods.contains_key(operation) {
            return Err(Error::DuplicateName(format!("{}.{}", self.name, operation)));
        }
        self.methods.insert(operation, Arc::new(method));
        Ok(())
    }

    pub(crate) fn invoke(&self, target: &mut T, operation: &str, values: &[Value]) -> Result<Value> {
        let method = self
            .methods
            .get(operation)
            .ok_or_else(|| Error::NoSuchOperation {
                surface: self.name.clone(),
                operation: operation.to_string(),
            })?;
        trace!("{}.{}({} args)", self.name, operation, values.len());
        method(target, &Args::new(&self.name, operation, values, self.policy))
    }
}

impl<T: ?Sized> fmt::Debug for Surface<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("operations", &self.operations())
            .finish()
    }
}

/// Shared reference to one live coder instance.
///
/// Clones alias the same instance; it is dropped with the last handle.
/// Calls lock the instance, so one handle may be used from several threads
/// but calls against it are serialized.
#[derive(Clone)]
pub struct CoderHandle {
    surface: Arc<CoderSurface>,
    instance: Arc<Mutex<Box<dyn Coder>>>,
}

impl CoderHandle {
    pub(crate) fn new(surface: Arc<CoderSurface>, coder: Box<dyn Coder>) -> Self {
        CoderHandle {
            surface,
            instance: Arc::new(Mutex::new(coder)),
        }
    }

    pub fn name(&self) -> &str {
        self.surface.name()
    }

    pub fn surface(&self) -> &CoderSurface {
        &self.surface
    }

    pub fn call(&self, operation: &str, args: &[Value]) -> Result<Value> {
        let mut coder = self.instance.lock().map_err(|_| Error::Poisoned)?;
        self.surface.invoke(&mut **coder, operation, args)
    }

    /// Number of live handles to this instance.
    pub fn references(&self) -> usize {
        Arc::strong_count(&self.instance)
    }
}

impl fmt::Debug for CoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoderHandle")
            .field("surface", &self.surface.name())
            .field("references", &self.references())
            .finish()
    }
}

type Constructor = Arc<dyn Fn(usize, usize) -> Result<Box<dyn CoderFactory>> + Send + Sync>;

/// Factory surface plus the constructor taking
/// `(max_symbols, max_symbol_size)`.
pub struct FactorySurface {
    ops: Surface<dyn CoderFactory>,
    coder: Arc<CoderSurface>,
    expansion: bool,
    constructor: Constructor,
}

impl FactorySurface {
    pub(crate) fn new<K>(ops: Surface<dyn CoderFactory>, coder: Arc<CoderSurface>, expansion: bool, constructor: K) -> Self
    where
        K: Fn(usize, usize) -> Result<Box<dyn CoderFactory>> + Send + Sync + 'static,
    {
        FactorySurface {
            ops,
            coder,
            expansion,
            constructor: Arc::new(constructor),
        }
    }

    pub fn name(&self) -> &str {
        self.ops.name()
    }

    pub fn role(&self) -> Role {
        self.ops.role()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.ops.operations()
    }

    pub fn has(&self, operation: &str) -> bool {
        self.ops.has(operation)
    }

    /// Surface of the coders this factory builds.
    pub fn coder_surface(&self) -> &Arc<CoderSurface> {
        &self.coder
    }

    /// Whether the factory carries fulcrum expansion state.
    pub fn has_expansion(&self) -> bool {
        self.expansion
    }

    pub(crate) fn ops_mut(&mut self) -> &mut Surface<dyn CoderFactory> {
        &mut self.ops
    }

    pub fn construct(self: &Arc<Self>, max_symbols: usize, max_symbol_size: usize) -> Result<FactoryHandle> {
        let factory = (self.constructor)(max_symbols, max_symbol_size)?;
        Ok(FactoryHandle {
            surface: Arc::clone(self),
            factory: Arc::new(Mutex::new(factory)),
        })
    }
}

impl fmt::Debug for FactorySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorySurface")
            .field("name", &self.ops.name())
            .field("builds", &self.coder.name())
            .field("operations", &self.ops.operations())
            .finish()
    }
}

/// Shared reference to one factory instance.
#[derive(Clone)]
pub struct FactoryHandle {
    surface: Arc<FactorySurface>,
    factory: Arc<Mutex<Box<dyn CoderFactory>>>,
}

impl FactoryHandle {
    pub fn name(&self) -> &str {
        self.surface.name()
    }

    pub fn surface(&self) -> &FactorySurface {
        &self.surface
    }

    pub fn call(&self, operation: &str, args: &[Value]) -> Result<Value> {
        let mut factory = self.factory.lock().map_err(|_| Error::Poisoned)?;
        self.surface.ops.invoke(&mut **factory, operation, args)
    }

    /// Shorthand for `call("build", &[])`.
    pub fn build(&self) -> Result<CoderHandle> {
        self.call("build", &[])?
            .into_coder()
            .ok_or_else(|| Error::InvalidParameter("build did not return a coder".into()))
    }
}

impl fmt::Debug for FactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryHandle")
            .field("surface", &self.surface.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(values: &'a [Value], policy: BufferPolicy) -> Args<'a> {
        Args::new("Test", "op", values, policy)
    }

    #[test]
    fn strict_rejects_short_fixed_input() {
        let values = [Value::from(vec![1u8, 2])];
        let err = args(&values, BufferPolicy::Strict).input(0, Expect::Exact(4)).unwrap_err();
        assert!(matches!(err, Error::BufferLength { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn truncate_zero_fills_short_input() {
        let values = [Value::from(vec![1u8, 2])];
        let buf = args(&values, BufferPolicy::Truncate).input(0, Expect::Exact(4)).unwrap();
        assert_eq!(buf, vec![1, 2, 0, 0]);
    }

    #[test]
    fn long_input_is_cut_in_both_modes() {
        let values = [Value::from(vec![1u8, 2, 3, 4, 5])];
        for policy in [BufferPolicy::Strict, BufferPolicy::Truncate] {
            let buf = args(&values, policy).input(0, Expect::Exact(3)).unwrap();
            assert_eq!(buf, vec![1, 2, 3]);
        }
    }

    #[test]
    fn strict_passes_short_payloads_through() {
        let values = [Value::from(vec![1u8, 2])];
        let buf = args(&values, BufferPolicy::Strict).input(0, Expect::UpTo(8)).unwrap();
        assert_eq!(buf, vec![1, 2]);
    }

    #[test]
    fn scratch_returns_written_bytes_only() {
        let value = scratch(8, |buf| {
            buf[..3].copy_from_slice(&[7, 8, 9]);
            Ok(3)
        })
        .unwrap();
        assert_eq!(value.as_bytes(), Some(&[7u8, 8, 9][..]));
    }

    #[test]
    fn argument_type_mismatch_names_the_slot() {
        let values = [Value::from("x")];
        let err = args(&values, BufferPolicy::Strict).uint(0).unwrap_err();
        assert!(matches!(err, Error::Argument { index: 0, .. }));
        assert!(args(&values, BufferPolicy::Strict).at_most(0).is_err());
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("Truncate".parse::<BufferPolicy>().unwrap(), BufferPolicy::Truncate);
        assert!("lenient".parse::<BufferPolicy>().is_err());
    }
}
