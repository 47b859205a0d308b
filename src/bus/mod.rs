//! Exclusive access to the line a sensor hangs off.
//!
//! A session owns its device node for its whole life. Opening the same line
//! twice in one process is refused, and closing is safe to repeat.

use {
    crate::error::{Error, Result},
    lazy_static::lazy_static,
    log::debug,
    std::{collections::HashSet, sync::Mutex},
};

pub mod adc;
mod i2c;

pub use {adc::AdcLine, i2c::I2cSession};

lazy_static! {
    static ref CLAIMED: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

pub trait BusSession {
    /// Send a command (e.g. "start measurement") to the device.
    fn write_command(&mut self, command: &[u8]) -> Result<()>;

    /// Fill as much of `buf` as the device delivers, returning the count.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying resource. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Read exactly `len` bytes. Anything shorter is a failed read.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        let actual = self.read_into(&mut buf)?;
        if actual < len {
            return Err(Error::ShortRead {
                expected: len,
                actual,
            });
        }

        Ok(buf)
    }
}

/// Marks a bus line as in use by this process until dropped.
#[derive(Debug)]
pub struct Claim {
    line: String,
}

impl Claim {
    pub fn acquire(line: impl Into<String>) -> Result<Self> {
        let line = line.into();
        let mut claimed = CLAIMED.lock().unwrap_or_else(|e| e.into_inner());

        if !claimed.insert(line.clone()) {
            return Err(Error::BusUnavailable {
                line,
                reason: "already claimed by another session".to_string(),
            });
        }

        debug!("Claimed bus line {}", line);
        Ok(Claim { line })
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        CLAIMED
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.line);
        debug!("Released bus line {}", self.line);
    }
}
