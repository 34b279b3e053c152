use crate::errors::{ErrorKind, Exception};
use crate::memory::{Ledger, MemorySize, MemoryType};

/// A raised exception together with what it costs in the ledger.
///
/// The record is charged as system memory when it is raised. If the ledger
/// cannot hold it, a bare `vmoverflow` without message nor trail is kept
/// instead, uncharged, so raising itself never fails. A fatal exception keeps
/// its kind in that case.
#[derive(Debug)]
pub struct PendingException {
    exception: Exception,
    charge: MemorySize,
}

impl PendingException {
    pub(crate) fn charge(ledger: &mut Ledger, exception: Exception) -> Self {
        let size = exception.memory_size();
        match ledger.allocate(size, MemoryType::System) {
            Ok(()) => Self {
                exception,
                charge: size,
            },
            Err(_) => {
                let kind = if exception.kind().is_fatal() {
                    exception.kind()
                } else {
                    ErrorKind::VmOverflow
                };
                Self {
                    exception: Exception::new(kind, ""),
                    charge: MemorySize::default(),
                }
            }
        }
    }

    pub fn exception(&self) -> &Exception {
        &self.exception
    }

    pub fn kind(&self) -> ErrorKind {
        self.exception.kind()
    }

    /// Give back the charge, keeping the exception.
    pub(crate) fn discharge(self, ledger: &mut Ledger) -> Exception {
        ledger.release(self.charge, MemoryType::System);
        self.exception
    }
}
