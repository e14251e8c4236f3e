use crate::regs::{Command, Status};

/// Typed access to the BFLASH register block and the service-mode register.
///
/// Implemented by the MMIO block of the real chip and by the simulated
/// controller the tests run against.
pub trait ControllerRegisters {
    /// ADDR: target address of the next command.
    fn write_addr(&mut self, address: u32);

    /// DATA[`index`], `index < 4`.
    fn write_data(&mut self, index: usize, word: u32);

    /// DATA[`index`], filled by a `Read` command.
    fn read_data(&mut self, index: usize) -> u32;

    /// CMD: starts `command` on the staged ADDR/DATA.
    fn write_cmd(&mut self, command: Command);

    fn read_stat(&mut self) -> Status;

    /// Bit 31 of the service register.
    fn service_mode(&mut self) -> bool;

    /// Writes `1` to the service register, starting the out-of-band full erase.
    fn trigger_service_erase(&mut self);
}

pub trait HardwareFlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Sets all memory of the sector holding `addr` to the erased value.
    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Programs `data` at `addr`. Bits can only be cleared, so the target
    /// is expected to be erased.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets the whole device to the erased value.
    fn chip_erase(&mut self) -> Result<(), Self::Error>;
}
