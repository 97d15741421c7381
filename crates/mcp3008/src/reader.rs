use embedded_hal::spi::SpiDevice;

use crate::{normalize, read_mode, Error, Mode};

/// MCP3008 driver
///
/// Owns its SPI device until [`close`](Mcp3008::close) is called or the driver is dropped.
#[derive(Debug)]
pub struct Mcp3008<SPI> {
    spi: Option<SPI>,
}

impl<SPI: SpiDevice> Mcp3008<SPI> {
    /// Creates a new driver from an SPI peripheral.
    /// Please ensure the SPI bus is in SPI mode 0, aka (0, 0).
    pub fn new(spi: SPI) -> Self {
        spi.into()
    }

    /// Releases the SPI device. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.spi.take().is_some() {
            log::debug!("mcp3008 SPI device released");
        }
    }

    /// `true` once [`close`](Mcp3008::close) has run.
    pub fn is_closed(&self) -> bool {
        self.spi.is_none()
    }

    /// Read a mode and return the 10 bit value as a [`u16`].
    pub fn read(&mut self, mode: Mode) -> Result<u16, Error<SPI::Error>> {
        let spi = self.spi.as_mut().ok_or(Error::Closed)?;

        read_mode(spi, mode).map_err(Error::Transfer)
    }

    /// Read a mode and scale the result to `reference`, usually V_REF.
    pub fn read_normalized(&mut self, mode: Mode, reference: f64) -> Result<f64, Error<SPI::Error>> {
        self.read(mode).map(|raw| normalize(raw, reference))
    }

    /// Read a mode given by its numeric code. Codes outside `0..=15` are rejected before touching the bus.
    pub fn read_code(&mut self, code: u8) -> Result<u16, Error<SPI::Error>> {
        let mode = Mode::try_from(code)?;

        self.read(mode)
    }

    /// [`read_code`](Mcp3008::read_code), scaled to `reference`.
    pub fn read_code_normalized(
        &mut self,
        code: u8,
        reference: f64,
    ) -> Result<f64, Error<SPI::Error>> {
        self.read_code(code).map(|raw| normalize(raw, reference))
    }

    /// Read every mode.
    ///
    /// Order: DF0 - DF7, then CH0 - CH7, so index `i` holds the reading for code `i`.
    pub fn read_all(&mut self) -> Result<[u16; 16], Error<SPI::Error>> {
        self.read_modes(&Mode::ALL)
    }

    /// [`read_all`](Mcp3008::read_all), scaled to `reference`.
    pub fn read_all_normalized(&mut self, reference: f64) -> Result<[f64; 16], Error<SPI::Error>> {
        self.read_modes_normalized(&Mode::ALL, reference)
    }

    /// Read `modes` one after the other, returning readings in the same order.
    /// Stops at the first failed transfer.
    pub fn read_modes<const N: usize>(
        &mut self,
        modes: &[Mode; N],
    ) -> Result<[u16; N], Error<SPI::Error>> {
        let mut readings = [0; N];

        self.read_modes_into(modes, &mut readings)?;

        Ok(readings)
    }

    /// [`read_modes`](Mcp3008::read_modes), scaled to `reference`.
    pub fn read_modes_normalized<const N: usize>(
        &mut self,
        modes: &[Mode; N],
        reference: f64,
    ) -> Result<[f64; N], Error<SPI::Error>> {
        self.read_modes(modes)
            .map(|readings| readings.map(|raw| normalize(raw, reference)))
    }

    /// Read `modes` in order into the front of `readings`.
    /// Stops at the first failed transfer, leaving later slots untouched.
    ///
    /// # Panics
    ///
    /// If `readings` is shorter than `modes`.
    pub fn read_modes_into(
        &mut self,
        modes: &[Mode],
        readings: &mut [u16],
    ) -> Result<(), Error<SPI::Error>> {
        for (reading, &mode) in readings[..modes.len()].iter_mut().zip(modes) {
            *reading = self.read(mode)?;
        }

        Ok(())
    }

    /// [`read_modes_into`](Mcp3008::read_modes_into), scaled to `reference`.
    ///
    /// # Panics
    ///
    /// If `readings` is shorter than `modes`.
    pub fn read_modes_normalized_into(
        &mut self,
        modes: &[Mode],
        reference: f64,
        readings: &mut [f64],
    ) -> Result<(), Error<SPI::Error>> {
        for (reading, &mode) in readings[..modes.len()].iter_mut().zip(modes) {
            *reading = self.read_normalized(mode, reference)?;
        }

        Ok(())
    }

    /// Bind this driver to a fixed list of modes.
    pub fn fixed<const N: usize>(self, modes: [Mode; N]) -> FixedReader<SPI, N> {
        FixedReader { adc: self, modes }
    }
}

impl<SPI: SpiDevice> From<SPI> for Mcp3008<SPI> {
    fn from(spi: SPI) -> Self {
        Self { spi: Some(spi) }
    }
}

impl<SPI> Drop for Mcp3008<SPI> {
    fn drop(&mut self) {
        if self.spi.take().is_some() {
            log::debug!("mcp3008 SPI device released on drop");
        }
    }
}

/// A [`Mcp3008`] that always reads the same modes, in the same order.
#[derive(Debug)]
pub struct FixedReader<SPI, const N: usize> {
    adc: Mcp3008<SPI>,
    modes: [Mode; N],
}

impl<SPI: SpiDevice, const N: usize> FixedReader<SPI, N> {
    /// Read the bound modes.
    pub fn read(&mut self) -> Result<[u16; N], Error<SPI::Error>> {
        self.adc.read_modes(&self.modes)
    }

    /// Read the bound modes, scaled to `reference`.
    pub fn read_normalized(&mut self, reference: f64) -> Result<[f64; N], Error<SPI::Error>> {
        self.adc.read_modes_normalized(&self.modes, reference)
    }

    /// The modes read on every call, in order.
    pub fn modes(&self) -> &[Mode; N] {
        &self.modes
    }

    /// See [`Mcp3008::close`].
    pub fn close(&mut self) {
        self.adc.close();
    }

    /// See [`Mcp3008::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.adc.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InvalidMode;
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, PartialEq)]
    struct MockError;

    impl embedded_hal::spi::Error for MockError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// What the mock saw, shared with the test after the driver takes ownership.
    #[derive(Default)]
    struct Log {
        requests: Vec<[u8; 3]>,
        drops: usize,
    }

    /// Answers mode `m` with `[0xFF, 0xFC | m >> 2, m << 6 | m]`, failing on `fail_on`.
    struct MockSpi {
        log: Rc<RefCell<Log>>,
        response: Option<[u8; 3]>,
        fail_on: Option<Mode>,
    }

    impl MockSpi {
        fn new() -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let spi = Self {
                log: log.clone(),
                response: None,
                fail_on: None,
            };

            (spi, log)
        }

        fn expected(mode: Mode) -> u16 {
            let code = u16::from(mode.code());

            ((code >> 2) << 8) | ((code << 6) & 0xFF) | code
        }
    }

    impl ErrorType for MockSpi {
        type Error = MockError;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            assert_eq!(operations.len(), 1);

            match &mut operations[0] {
                Operation::TransferInPlace(words) => {
                    assert_eq!(words.len(), 3, "Not a 3 byte frame");
                    assert_eq!(words[0], 0b0000_0001, "Missing start flag");

                    let request = [words[0], words[1], words[2]];
                    self.log.borrow_mut().requests.push(request);

                    let code = words[1] >> 4;

                    if self.fail_on.map(Mode::code) == Some(code) {
                        return Err(MockError);
                    }

                    let response = self
                        .response
                        .unwrap_or([0xFF, 0xFC | code >> 2, code << 6 | code]);

                    words.copy_from_slice(&response);
                }
                _ => panic!("Not an expected operation"),
            }

            Ok(())
        }
    }

    impl Drop for MockSpi {
        fn drop(&mut self) {
            self.log.borrow_mut().drops += 1;
        }
    }

    #[test]
    fn mock_spi() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        for mode in Mode::all() {
            assert_eq!(mcp.read(mode), Ok(MockSpi::expected(mode)));
        }

        let requests = &log.borrow().requests;
        assert_eq!(requests.len(), 16);

        for (request, mode) in requests.iter().zip(Mode::all()) {
            assert_eq!(*request, [1, mode.code() << 4, 0]);
        }
    }

    #[test]
    fn decodes_worked_example() {
        let (mut spi, _log) = MockSpi::new();
        spi.response = Some([0x00, 0x02, 0x34]);

        let mut mcp = Mcp3008::new(spi);

        assert_eq!(mcp.read(Mode::CH0), Ok(564));

        let volts = mcp.read_normalized(Mode::CH0, 5.0).unwrap();
        assert!((volts - 2.7539).abs() < 1e-4);
    }

    #[test]
    fn normalized_matches_raw() {
        let (spi, _log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        for mode in Mode::all() {
            let raw = mcp.read(mode).unwrap();
            let scaled = mcp.read_normalized(mode, 3.3).unwrap();

            assert_eq!(scaled, 3.3 * f64::from(raw) / 1024.0);
        }
    }

    #[test]
    fn invalid_code_issues_no_transfer() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        for code in [16, 17, 100, u8::MAX] {
            assert_eq!(mcp.read_code(code), Err(Error::InvalidMode(code)));
            assert_eq!(
                mcp.read_code_normalized(code, 5.0),
                Err(Error::InvalidMode(code))
            );
        }

        assert!(log.borrow().requests.is_empty());

        assert_eq!(mcp.read_code(8), Ok(MockSpi::expected(Mode::CH0)));
        assert_eq!(log.borrow().requests, vec![[1, 0x80, 0]]);
        assert_eq!(Mode::try_from(16), Err(InvalidMode(16)));
    }

    #[test]
    fn read_all_is_in_code_order() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        let readings = mcp.read_all().unwrap();

        for (reading, mode) in readings.iter().zip(Mode::all()) {
            assert_eq!(*reading, MockSpi::expected(mode));
        }

        let codes: Vec<u8> = log.borrow().requests.iter().map(|r| r[1] >> 4).collect();
        assert_eq!(codes, (0..16).collect::<Vec<u8>>());

        let scaled = mcp.read_all_normalized(2.0).unwrap();
        assert_eq!(scaled, readings.map(|raw| normalize(raw, 2.0)));
    }

    #[test]
    fn read_modes_keeps_caller_order() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        let modes = [Mode::CH7, Mode::DF2, Mode::CH7, Mode::CH0];
        let readings = mcp.read_modes(&modes).unwrap();

        assert_eq!(readings, modes.map(MockSpi::expected));
        assert_eq!(
            log.borrow().requests,
            vec![[1, 0xF0, 0], [1, 0x20, 0], [1, 0xF0, 0], [1, 0x80, 0]]
        );
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let (mut spi, log) = MockSpi::new();
        spi.fail_on = Some(Mode::DF3);

        let mut mcp = Mcp3008::new(spi);

        assert_eq!(mcp.read_all(), Err(Error::Transfer(MockError)));
        assert_eq!(log.borrow().requests.len(), 4);

        assert_eq!(
            mcp.read_modes_normalized(&[Mode::CH1, Mode::DF3, Mode::CH2], 5.0),
            Err(Error::Transfer(MockError))
        );
        assert_eq!(log.borrow().requests.len(), 6);
    }

    #[test]
    fn close_is_idempotent() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        assert!(!mcp.is_closed());

        mcp.close();
        assert!(mcp.is_closed());
        assert_eq!(log.borrow().drops, 1);

        mcp.close();
        drop(mcp);
        assert_eq!(log.borrow().drops, 1);
    }

    #[test]
    fn drop_releases_device() {
        let (spi, log) = MockSpi::new();

        {
            let mut mcp = Mcp3008::new(spi);
            mcp.read(Mode::CH3).unwrap();
            assert_eq!(log.borrow().drops, 0);
        }

        assert_eq!(log.borrow().drops, 1);
    }

    #[test]
    fn reads_after_close_fail() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);
        mcp.close();

        assert_eq!(mcp.read(Mode::CH0), Err(Error::Closed));
        assert_eq!(mcp.read_normalized(Mode::CH0, 5.0), Err(Error::Closed));
        assert_eq!(mcp.read_code(3), Err(Error::Closed));
        assert_eq!(mcp.read_all(), Err(Error::Closed));
        assert_eq!(mcp.read_modes(&[Mode::DF1]), Err(Error::Closed));

        assert!(log.borrow().requests.is_empty());
    }

    #[test]
    fn fixed_reader() {
        let (spi, log) = MockSpi::new();
        let mut chip = Mcp3008::new(spi).fixed([Mode::DF0, Mode::CH0]);

        assert_eq!(chip.modes(), &[Mode::DF0, Mode::CH0]);
        assert_eq!(
            chip.read(),
            Ok([MockSpi::expected(Mode::DF0), MockSpi::expected(Mode::CH0)])
        );
        assert_eq!(log.borrow().requests, vec![[1, 0x00, 0], [1, 0x80, 0]]);

        let scaled = chip.read_normalized(4.35).unwrap();
        assert_eq!(scaled[1], normalize(MockSpi::expected(Mode::CH0), 4.35));

        chip.close();
        chip.close();
        assert!(chip.is_closed());
        assert_eq!(chip.read(), Err(Error::Closed));
        assert_eq!(log.borrow().requests.len(), 4);
        assert_eq!(log.borrow().drops, 1);
    }

    #[test]
    fn read_modes_into_runtime_list() {
        let (spi, log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        let modes = vec![Mode::CH2, Mode::DF5, Mode::CH2];
        let mut readings = vec![u16::MAX; 4];

        mcp.read_modes_into(&modes, &mut readings).unwrap();

        assert_eq!(
            readings,
            vec![
                MockSpi::expected(Mode::CH2),
                MockSpi::expected(Mode::DF5),
                MockSpi::expected(Mode::CH2),
                u16::MAX,
            ]
        );
        assert_eq!(
            log.borrow().requests,
            vec![[1, 0xA0, 0], [1, 0x50, 0], [1, 0xA0, 0]]
        );

        let mut volts = vec![0.0; modes.len()];
        mcp.read_modes_normalized_into(&modes, 5.0, &mut volts).unwrap();

        assert_eq!(volts[1], normalize(MockSpi::expected(Mode::DF5), 5.0));
    }

    #[test]
    fn read_modes_into_stops_at_first_failure() {
        let (mut spi, log) = MockSpi::new();
        spi.fail_on = Some(Mode::CH1);

        let mut mcp = Mcp3008::new(spi);
        let mut readings = [0; 3];

        assert_eq!(
            mcp.read_modes_into(&[Mode::CH0, Mode::CH1, Mode::CH2], &mut readings),
            Err(Error::Transfer(MockError))
        );
        assert_eq!(readings, [MockSpi::expected(Mode::CH0), 0, 0]);
        assert_eq!(log.borrow().requests.len(), 2);

        mcp.close();

        assert_eq!(
            mcp.read_modes_normalized_into(&[Mode::CH0], 1.0, &mut [0.0]),
            Err(Error::Closed)
        );
        assert_eq!(log.borrow().requests.len(), 2);
    }

    #[test]
    #[should_panic]
    fn read_modes_into_short_buffer() {
        let (spi, _log) = MockSpi::new();
        let mut mcp = Mcp3008::new(spi);

        let _ = mcp.read_modes_into(&[Mode::CH0, Mode::CH1], &mut [0; 1]);
    }

    #[test]
    fn debug_shows_closed_state() {
        #[derive(Debug)]
        struct Named;

        impl ErrorType for Named {
            type Error = MockError;
        }

        impl SpiDevice for Named {
            fn transaction(&mut self, _: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
                Ok(())
            }
        }

        let mut mcp = Mcp3008::new(Named);
        assert_eq!(format!("{mcp:?}"), "Mcp3008 { spi: Some(Named) }");

        mcp.close();
        assert_eq!(format!("{mcp:?}"), "Mcp3008 { spi: None }");
    }
}
