use core::fmt::Debug;

use embedded_hal::delay::DelayNs;

use crate::descriptor::DeviceDescriptor;
use crate::error::Error;
use crate::poll::{cycles_to_ns, wait_ready, Budget, Timing};
use crate::regs::{pack_granule, unpack_granule, Command, DATA_WORDS, GRANULE, STAT};
use crate::session::{Function, Session, State};
use crate::traits::{ControllerRegisters, HardwareFlashDevice};

/// Blocking driver for the BFLASH controller.
///
/// Operations other than [`init`](Self::init) fail with
/// [`Error::NotInitialized`] unless they run between `init` and
/// [`uninit`](Self::uninit).
pub struct BootFlash<R, D> {
    regs: R,
    delay: D,
    state: State,
}

impl<R, D> Debug for BootFlash<R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootFlash")
            .field("device", &self.state.descriptor.name)
            .field("session", &self.state.session)
            .finish()
    }
}

impl<R, D> BootFlash<R, D>
where
    R: ControllerRegisters,
    D: DelayNs,
{
    pub fn new(regs: R, delay: D, descriptor: &'static DeviceDescriptor) -> Self {
        Self {
            regs,
            delay,
            state: State::new(descriptor),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.state.timing = timing;
        self
    }

    pub fn timing(&self) -> Timing {
        self.state.timing
    }

    pub fn descriptor(&self) -> &'static DeviceDescriptor {
        self.state.descriptor
    }

    pub fn session(&self) -> Option<Session> {
        self.state.session
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn release(self) -> (R, D) {
        (self.regs, self.delay)
    }

    /// `Init`: opens a session for `function`.
    ///
    /// The controller needs no setup and no register is touched; the clock
    /// only scales the command settle delay.
    pub fn init(&mut self, base_address: u32, clock_hz: u32, function: Function) -> Result<(), Error> {
        self.state.open(base_address, clock_hz, function)
    }

    /// `UnInit`: closes the session opened for `function` and drops back to
    /// the nominal 100 MHz timing.
    pub fn uninit(&mut self, function: Function) -> Result<(), Error> {
        self.state.close(function)
    }

    pub fn is_service_mode(&mut self) -> bool {
        self.regs.service_mode()
    }

    pub fn is_busy(&mut self) -> bool {
        self.regs.read_stat().is_set(STAT::BUSY)
    }

    /// `EraseChip`: sets the whole array to the erased value.
    ///
    /// In service mode the erase is handed to the out-of-band trigger and the
    /// call returns without waiting for it.
    pub fn erase_chip(&mut self) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        if self.is_service_mode() {
            warn!("service mode: full erase through the service trigger");
            self.regs.trigger_service_erase();
            return Ok(());
        }
        let mut budget = Budget::from_ms(self.state.timing.erase_timeout_ms);
        self.issue(
            Command::FullErase,
            self.state.timing.command_settle_cycles,
            clock_hz,
            &mut budget,
        )
    }

    /// `EraseSector`: erases the sector holding `address`. The controller
    /// resolves the sector boundaries.
    pub fn erase_sector(&mut self, address: u32) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        self.state.check_range(address, 1)?;
        let mut budget = Budget::from_ms(self.state.timing.erase_timeout_ms);
        self.regs.write_addr(address);
        self.issue(
            Command::SectorErase,
            self.state.timing.command_settle_cycles,
            clock_hz,
            &mut budget,
        )
    }

    /// `ProgramPage`: programs `data` at `address`, one 16-byte granule per
    /// `Write` command.
    ///
    /// `address` must be granule aligned. A short last granule is padded with
    /// the erased value, which leaves the bytes after `data` untouched. All
    /// granules share one program timeout.
    pub fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        self.state.check_program(address, data.len())?;
        let fill = self.state.descriptor.empty;
        let mut budget = Budget::from_ms(self.state.timing.program_timeout_ms);
        let mut granule_address = address;
        for chunk in data.chunks(GRANULE) {
            self.regs.write_addr(granule_address);
            for (index, word) in pack_granule(chunk, fill).into_iter().enumerate() {
                self.regs.write_data(index, word);
            }
            granule_address += GRANULE as u32;
            self.issue(
                Command::Write,
                self.state.timing.write_settle_cycles,
                clock_hz,
                &mut budget,
            )?;
        }
        Ok(())
    }

    /// Reads the array through the controller's `Read` command.
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        self.state.check_range(address, buf.len())?;
        let mut budget = Budget::from_ms(self.state.timing.erase_timeout_ms);
        self.read_granules(address, buf, clock_hz, &mut budget)
    }

    /// Compares the array at `address` with `data`.
    pub fn verify(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        self.state.check_range(address, data.len())?;
        let mut budget = Budget::from_ms(self.state.timing.erase_timeout_ms);
        let mut current = address;
        for expected in data.chunks(GRANULE) {
            let mut actual = [0u8; GRANULE];
            let actual = &mut actual[..expected.len()];
            self.read_granules(current, actual, clock_hz, &mut budget)?;
            if let Some(i) = expected.iter().zip(actual.iter()).position(|(e, a)| e != a) {
                let address = current + i as u32;
                warn!("verify mismatch at {=u32:#x}", address);
                return Err(Error::VerifyMismatch { address });
            }
            current += expected.len() as u32;
        }
        Ok(())
    }

    /// Checks that `len` bytes from `address` all hold `pattern`.
    pub fn blank_check(&mut self, address: u32, len: u32, pattern: u8) -> Result<(), Error> {
        let clock_hz = self.state.clock_hz()?;
        self.state.check_range(address, len as usize)?;
        let mut budget = Budget::from_ms(self.state.timing.erase_timeout_ms);
        let end = address + len;
        let mut current = address;
        while current < end {
            let step = (end - current).min(GRANULE as u32);
            let mut actual = [0u8; GRANULE];
            let actual = &mut actual[..step as usize];
            self.read_granules(current, actual, clock_hz, &mut budget)?;
            if let Some(i) = actual.iter().position(|b| *b != pattern) {
                return Err(Error::NotBlank {
                    address: current + i as u32,
                });
            }
            current += step;
        }
        Ok(())
    }

    fn read_granules(
        &mut self,
        address: u32,
        buf: &mut [u8],
        clock_hz: u32,
        budget: &mut Budget,
    ) -> Result<(), Error> {
        let mut offset = 0;
        while offset < buf.len() {
            let current = address + offset as u32;
            let granule_address = current & !(GRANULE as u32 - 1);
            let skip = (current - granule_address) as usize;
            self.regs.write_addr(granule_address);
            self.issue(
                Command::Read,
                self.state.timing.command_settle_cycles,
                clock_hz,
                budget,
            )?;
            let mut words = [0u32; DATA_WORDS];
            for (index, word) in words.iter_mut().enumerate() {
                *word = self.regs.read_data(index);
            }
            let bytes = unpack_granule(words);
            let take = (GRANULE - skip).min(buf.len() - offset);
            buf[offset..offset + take].copy_from_slice(&bytes[skip..skip + take]);
            offset += take;
        }
        Ok(())
    }

    /// Writes CMD, lets the command latch, then polls STAT until the
    /// controller is idle again, charging the wait to `budget`.
    fn issue(
        &mut self,
        command: Command,
        settle_cycles: u32,
        clock_hz: u32,
        budget: &mut Budget,
    ) -> Result<(), Error> {
        trace!("{}", command);
        self.regs.write_cmd(command);
        self.delay.delay_ns(cycles_to_ns(settle_cycles, clock_hz));
        let regs = &mut self.regs;
        wait_ready(
            &mut self.delay,
            self.state.timing.poll_interval_us,
            budget,
            || regs.read_stat().is_set(STAT::BUSY),
        )
    }
}

impl<R, D> HardwareFlashDevice for BootFlash<R, D>
where
    R: ControllerRegisters,
    D: DelayNs,
{
    type Error = Error;

    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Error> {
        BootFlash::read(self, addr, data)
    }

    fn sector_erase(&mut self, addr: u32) -> Result<(), Error> {
        self.erase_sector(addr)
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        self.program_page(addr, data)
    }

    fn chip_erase(&mut self) -> Result<(), Error> {
        self.erase_chip()
    }
}
