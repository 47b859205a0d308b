use {
    crate::{
        bus::{BusSession, Claim},
        error::{Error, Result},
    },
    log::{debug, info},
    std::{
        fs::File,
        io::{Read, Seek, SeekFrom},
    },
};

/// Width of the sample an ADC line hands out: the count as big-endian `u16`.
pub const SAMPLE_LEN: usize = 2;

/// A single ADC channel exposed by the kernel's IIO subsystem, e.g.
/// `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`.
pub struct AdcLine {
    path: String,
    file: Option<(File, Claim)>,
}

impl AdcLine {
    pub fn open(path: &str) -> Result<Self> {
        let claim = Claim::acquire(path)?;
        let file = File::open(path).map_err(|e| Error::BusUnavailable {
            line: path.to_string(),
            reason: e.to_string(),
        })?;

        info!("Opened ADC line {}", path);
        Ok(AdcLine {
            path: path.to_string(),
            file: Some((file, claim)),
        })
    }

    fn read_count(&mut self) -> Result<u16> {
        let path = &self.path;
        let (file, _) = self
            .file
            .as_mut()
            .ok_or_else(|| Error::IoFailure(format!("{} is closed", path)))?;

        let mut text = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut text))
            .map_err(|e| Error::IoFailure(format!("read {}: {}", path, e)))?;

        text.trim()
            .parse()
            .map_err(|e| Error::IoFailure(format!("{} returned {:?}: {}", path, text.trim(), e)))
    }
}

impl BusSession for AdcLine {
    fn write_command(&mut self, _command: &[u8]) -> Result<()> {
        Err(Error::IoFailure(format!(
            "{} does not accept commands",
            self.path
        )))
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = self.read_count()?.to_be_bytes();
        let n = buf.len().min(SAMPLE_LEN);
        buf[..n].copy_from_slice(&count[..n]);

        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            debug!("Closed ADC line {}", self.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::fs};

    fn channel(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("rpi-thermometer-{}", name));
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn count_is_read_as_big_endian_sample() {
        let path = channel("adc-count", "512\n");
        let mut line = AdcLine::open(&path).unwrap();

        assert_eq!(line.read_bytes(SAMPLE_LEN).unwrap(), vec![0x02, 0x00]);

        // sysfs attributes are re-read from the start every time
        fs::write(&path, "1023\n").unwrap();
        assert_eq!(line.read_bytes(SAMPLE_LEN).unwrap(), vec![0x03, 0xFF]);
    }

    #[test]
    fn garbage_is_an_io_failure() {
        let path = channel("adc-garbage", "n/a\n");
        let mut line = AdcLine::open(&path).unwrap();

        assert!(matches!(
            line.read_bytes(SAMPLE_LEN),
            Err(Error::IoFailure(_))
        ));
    }

    #[test]
    fn missing_line_is_unavailable_and_not_left_claimed() {
        let path = std::env::temp_dir()
            .join("rpi-thermometer-adc-missing")
            .to_string_lossy()
            .into_owned();
        let _ = fs::remove_file(&path);

        assert!(matches!(
            AdcLine::open(&path),
            Err(Error::BusUnavailable { .. })
        ));
        assert!(Claim::acquire(path).is_ok());
    }

    #[test]
    fn asking_for_more_than_a_sample_is_a_short_read() {
        let path = channel("adc-short", "7\n");
        let mut line = AdcLine::open(&path).unwrap();

        assert!(matches!(
            line.read_bytes(6),
            Err(Error::ShortRead {
                expected: 6,
                actual: 2
            })
        ));
    }

    #[test]
    fn line_rejects_commands_and_closes_once() {
        let path = channel("adc-close", "0\n");
        let mut line = AdcLine::open(&path).unwrap();

        assert!(line.write_command(&[0x2C, 0x06]).is_err());

        line.close().unwrap();
        line.close().unwrap();
        assert!(!line.is_open());
        assert!(matches!(line.read_bytes(SAMPLE_LEN), Err(Error::IoFailure(_))));
    }
}
