use crate::Memory;
use crate::errors::{ErrorKind, Exception, Result};
use crate::memory::MemoryType;
use crate::values::{Value, ValueKind};
use crate::vm::ValueContainer;

/// Name resolution scopes.
///
/// The four bottom scopes are installed at construction and never removed.
/// From the bottom up they are: host, system, global and user. Scopes
/// opened with `begin` sit above them.
///
/// Resolution scans from the top down to the system scope and only then
/// consults the host scope: hosts can add names but cannot shadow builtins.
#[derive(Debug)]
pub struct DictionaryStack {
    container: ValueContainer,
}

impl DictionaryStack {
    pub const INITIAL_CAPACITY: usize = 8;
    pub const INCREMENT: usize = 8;
    /// Number of permanent scopes.
    pub const PERMANENT: usize = 4;

    pub const HOST: usize = 0;
    pub const SYSTEM: usize = 1;
    pub const GLOBAL: usize = 2;
    pub const USER: usize = 3;

    pub(crate) fn new(memory: &mut Memory) -> Result<Self> {
        Ok(Self {
            container: ValueContainer::new(
                &mut memory.ledger,
                MemoryType::System,
                ValueContainer::VALUE_SLOT,
                Self::INITIAL_CAPACITY,
                Self::INCREMENT,
            )?,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.container.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Scopes from bottom (host) to top.
    pub fn items(&self) -> &[Value] {
        self.container.items()
    }

    pub fn top(&self) -> Option<&Value> {
        self.container.peek(0)
    }

    /// Permanent scope by index (`HOST`, `SYSTEM`, `GLOBAL` or `USER`).
    pub fn permanent(&self, index: usize) -> Option<&Value> {
        (index < Self::PERMANENT)
            .then(|| self.container.get(index))
            .flatten()
    }

    /// Install the permanent scopes, bottom first.
    pub(crate) fn install(&mut self, memory: &mut Memory, scopes: [Value; 4]) -> Result<()> {
        debug_assert!(self.is_empty(), "permanent scopes installed twice");
        self.container.popush(memory, 0, &scopes)
    }

    pub(crate) fn begin(&mut self, memory: &mut Memory, dictionary: Value) -> Result<()> {
        if dictionary.kind() != ValueKind::Dictionary {
            return Err(Exception::type_check("begin expects a dictionary"));
        }
        self.container.push(memory, dictionary)
    }

    /// Close the innermost scope opened with `begin`.
    ///
    /// # Errors
    ///
    /// `dictstackunderflow` when only the permanent scopes are left.
    pub(crate) fn end(&mut self, memory: &mut Memory) -> Result<()> {
        if self.len() <= Self::PERMANENT {
            return Err(Exception::new(
                ErrorKind::DictStackUnderflow,
                "cannot remove a permanent dictionary",
            ));
        }
        self.container.pop(memory, 1)
    }

    /// Scan order: top down to the system scope, then the host scope.
    fn scan_order(&self) -> impl Iterator<Item = &Value> {
        let items = self.container.items();
        let split = Self::SYSTEM.min(items.len());
        items[split..].iter().rev().chain(items[..split].iter())
    }

    /// The scope defining `name` and the bound value.
    pub fn locate<'a>(&'a self, memory: &'a Memory, name: &str) -> Option<(&'a Value, &'a Value)> {
        self.scan_order().find_map(|scope| {
            let id = scope.heap_id()?;
            memory.dictionary(id).get(name).map(|value| (scope, value))
        })
    }

    /// The value bound to `name`.
    ///
    /// # Errors
    ///
    /// `undefined` when no scope defines it.
    pub fn lookup<'a>(&'a self, memory: &'a Memory, name: &str) -> Result<&'a Value> {
        self.locate(memory, name)
            .map(|(_, value)| value)
            .ok_or_else(|| Exception::new(ErrorKind::Undefined, name.to_string()))
    }

    pub(crate) fn dispose(self, memory: &mut Memory) {
        self.container.dispose(memory);
    }
}
