//! `Init`/`UnInit` bookkeeping and request validation shared by the blocking
//! and async drivers.

use crate::descriptor::DeviceDescriptor;
use crate::error::Error;
use crate::poll::{Timing, NOMINAL_CLOCK_HZ};
use crate::regs::GRANULE;

/// What the host is about to do, as passed to `Init`/`UnInit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Function {
    Erase = 1,
    Program = 2,
    Verify = 3,
}

impl TryFrom<u32> for Function {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Error> {
        match code {
            1 => Ok(Function::Erase),
            2 => Ok(Function::Program),
            3 => Ok(Function::Verify),
            _ => Err(Error::InvalidFunction),
        }
    }
}

/// An open `Init` .. `UnInit` bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Session {
    pub function: Function,
    pub base_address: u32,
    pub clock_hz: u32,
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) descriptor: &'static DeviceDescriptor,
    pub(crate) timing: Timing,
    pub(crate) session: Option<Session>,
}

impl State {
    pub(crate) const fn new(descriptor: &'static DeviceDescriptor) -> Self {
        Self {
            descriptor,
            timing: Timing::from_descriptor(descriptor),
            session: None,
        }
    }

    pub(crate) fn open(
        &mut self,
        base_address: u32,
        clock_hz: u32,
        function: Function,
    ) -> Result<(), Error> {
        if let Some(open) = self.session {
            warn!("Init({}) while {} session is open", function, open.function);
            return Err(Error::AlreadyInitialized);
        }
        let clock_hz = if clock_hz == 0 {
            NOMINAL_CLOCK_HZ
        } else {
            clock_hz
        };
        debug!(
            "Init({}): base {=u32:#x}, clock {=u32} Hz",
            function,
            base_address,
            clock_hz
        );
        self.session = Some(Session {
            function,
            base_address,
            clock_hz,
        });
        Ok(())
    }

    pub(crate) fn close(&mut self, function: Function) -> Result<(), Error> {
        match self.session {
            None => {
                warn!("UnInit({}) without Init", function);
                Err(Error::NotInitialized)
            }
            Some(open) if open.function != function => {
                warn!("UnInit({}) does not match Init({})", function, open.function);
                Err(Error::InvalidFunction)
            }
            Some(_) => {
                debug!("UnInit({})", function);
                self.session = None;
                Ok(())
            }
        }
    }

    /// Clock of the open session.
    pub(crate) fn clock_hz(&self) -> Result<u32, Error> {
        match self.session {
            Some(session) => Ok(session.clock_hz),
            None => {
                warn!("flash operation outside Init/UnInit");
                Err(Error::NotInitialized)
            }
        }
    }

    /// `[address, address + len)` must lie inside the device.
    pub(crate) fn check_range(&self, address: u32, len: usize) -> Result<(), Error> {
        let len = u32::try_from(len).map_err(|_| Error::InvalidAddress)?;
        if self.descriptor.contains(address, len) {
            Ok(())
        } else {
            warn!("{=u32:#x} + {=u32} is outside the device", address, len);
            Err(Error::InvalidAddress)
        }
    }

    /// A program request must start on a granule and, once its tail granule
    /// is padded, still fit in the device.
    pub(crate) fn check_program(&self, address: u32, len: usize) -> Result<(), Error> {
        if address % GRANULE as u32 != 0 {
            warn!("program address {=u32:#x} is not granule aligned", address);
            return Err(Error::InvalidAddress);
        }
        self.check_range(address, len.div_ceil(GRANULE) * GRANULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::K1921VK028_BFLASH;

    #[test]
    fn function_codes() {
        assert_eq!(Function::try_from(1), Ok(Function::Erase));
        assert_eq!(Function::try_from(2), Ok(Function::Program));
        assert_eq!(Function::try_from(3), Ok(Function::Verify));
        assert_eq!(Function::try_from(0), Err(Error::InvalidFunction));
        assert_eq!(Function::try_from(4), Err(Error::InvalidFunction));
    }

    #[test]
    fn zero_clock_means_nominal() {
        let mut state = State::new(&K1921VK028_BFLASH);
        state.open(0, 0, Function::Erase).unwrap();
        assert_eq!(state.clock_hz(), Ok(NOMINAL_CLOCK_HZ));
    }

    #[test]
    fn close_requires_matching_function() {
        let mut state = State::new(&K1921VK028_BFLASH);
        assert_eq!(state.close(Function::Erase), Err(Error::NotInitialized));
        state.open(0, 48_000_000, Function::Program).unwrap();
        assert_eq!(
            state.open(0, 48_000_000, Function::Program),
            Err(Error::AlreadyInitialized)
        );
        assert_eq!(state.close(Function::Erase), Err(Error::InvalidFunction));
        assert_eq!(state.close(Function::Program), Ok(()));
        assert_eq!(state.clock_hz(), Err(Error::NotInitialized));
    }

    #[test]
    fn program_range_counts_padding() {
        let state = State::new(&K1921VK028_BFLASH);
        assert_eq!(state.check_program(0x7_FFF0, 16), Ok(()));
        assert_eq!(state.check_program(0x7_FFF0, 17), Err(Error::InvalidAddress));
        assert_eq!(state.check_program(0x7_FFF8, 8), Err(Error::InvalidAddress));
        assert_eq!(state.check_program(0x8_0000, 0), Ok(()));
    }
}
