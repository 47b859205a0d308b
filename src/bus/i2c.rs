use {
    crate::{
        bus::{BusSession, Claim},
        error::{Error, Result},
    },
    embedded_hal::blocking::i2c::{Read, Write},
    linux_embedded_hal::I2cdev,
    log::{debug, info},
    std::fmt::Debug,
};

/// One sensor address on an I2C bus.
///
/// The device node and its claim are released by `close` or, failing that,
/// when the session is dropped.
pub struct I2cSession<I2C> {
    address: u8,
    line: String,
    dev: Option<(I2C, Claim)>,
}

impl I2cSession<I2cdev> {
    pub fn open(path: &str, address: u8) -> Result<Self> {
        let claim = Claim::acquire(path)?;
        let dev = I2cdev::new(path).map_err(|e| Error::BusUnavailable {
            line: path.to_string(),
            reason: format!("{:?}", e),
        })?;

        info!("Opened {} for device 0x{:02x}", path, address);
        Ok(Self::with_device(dev, address, claim))
    }
}

impl<I2C> I2cSession<I2C> {
    pub fn with_device(dev: I2C, address: u8, claim: Claim) -> Self {
        I2cSession {
            address,
            line: claim.line().to_string(),
            dev: Some((dev, claim)),
        }
    }

    fn device(&mut self) -> Result<&mut I2C> {
        match self.dev.as_mut() {
            Some((dev, _)) => Ok(dev),
            None => Err(Error::IoFailure(format!("{} is closed", self.line))),
        }
    }
}

impl<I2C> BusSession for I2cSession<I2C>
where
    I2C: Read + Write,
    <I2C as Read>::Error: Debug,
    <I2C as Write>::Error: Debug,
{
    fn write_command(&mut self, command: &[u8]) -> Result<()> {
        let address = self.address;
        self.device()?
            .write(address, command)
            .map_err(|e| Error::IoFailure(format!("write to 0x{:02x}: {:?}", address, e)))
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let address = self.address;
        self.device()?
            .read(address, buf)
            .map_err(|e| Error::IoFailure(format!("read from 0x{:02x}: {:?}", address, e)))?;

        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        if self.dev.take().is_some() {
            debug!("Closed {}", self.line);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.dev.is_some()
    }
}
