//! Simulated BFLASH controller for host-side tests.
//!
//! Commands take effect when CMD is written, using whatever ADDR and DATA
//! hold at that moment, after which STAT reports busy for a configurable
//! number of reads. Every register access is recorded so tests can check the
//! order in which the driver touched the hardware.

use crate::descriptor::DeviceDescriptor;
use crate::regs::{Command, Status, DATA_WORDS, GRANULE};
use crate::traits::ControllerRegisters;

/// One register access, as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Addr(u32),
    DataWrite(usize, u32),
    DataRead(usize),
    Cmd(Command),
    Stat { busy: bool },
    ServiceRead,
    ServiceTrigger,
}

pub struct SimController {
    descriptor: &'static DeviceDescriptor,
    memory: Vec<u8>,
    addr: u32,
    data: [u32; DATA_WORDS],
    busy_reads: u32,
    remaining: u32,
    stuck: bool,
    service_mode: bool,
    service_erases: usize,
    violations: usize,
    trace: Vec<Access>,
}

impl SimController {
    /// A blank (erased) device.
    pub fn new(descriptor: &'static DeviceDescriptor) -> Self {
        Self {
            descriptor,
            memory: vec![descriptor.empty; descriptor.size as usize],
            addr: 0,
            data: [0; DATA_WORDS],
            busy_reads: 2,
            remaining: 0,
            stuck: false,
            service_mode: false,
            service_erases: 0,
            violations: 0,
            trace: Vec::new(),
        }
    }

    /// Number of STAT reads reporting busy after each command.
    pub fn with_busy_reads(mut self, reads: u32) -> Self {
        self.busy_reads = reads;
        self
    }

    /// Keeps STAT.BUSY set forever, as a hung controller would.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn set_service_mode(&mut self, active: bool) {
        self.service_mode = active;
    }

    /// Writes `bytes` straight into the array, bypassing the controller.
    pub fn preload(&mut self, address: u32, bytes: &[u8]) {
        let start = self.offset(address);
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Array contents at `[address, address + len)`.
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let start = self.offset(address);
        &self.memory[start..start + len]
    }

    pub fn trace(&self) -> &[Access] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Commands written to CMD, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.trace
            .iter()
            .filter_map(|a| match a {
                Access::Cmd(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Times the service-mode full erase was triggered.
    pub fn service_erases(&self) -> usize {
        self.service_erases
    }

    /// ADDR, DATA or CMD writes that arrived while a command was in progress,
    /// and commands aimed outside the array.
    pub fn violations(&self) -> usize {
        self.violations
    }

    fn offset(&self, address: u32) -> usize {
        (address - self.descriptor.start) as usize
    }

    fn busy(&self) -> bool {
        self.stuck || self.remaining > 0
    }

    fn check_idle(&mut self) {
        if self.busy() {
            self.violations += 1;
        }
    }

    fn erase_all(&mut self) {
        self.memory.fill(self.descriptor.empty);
    }

    fn execute(&mut self, command: Command) {
        let granule = self.addr & !(GRANULE as u32 - 1);
        match command {
            Command::FullErase => self.erase_all(),
            Command::SectorErase => match self.descriptor.sector_containing(self.addr) {
                Some(sector) => {
                    let start = self.offset(sector.start);
                    let end = self.offset(sector.end);
                    self.memory[start..end].fill(self.descriptor.empty);
                }
                None => self.violations += 1,
            },
            Command::Write => {
                if !self.descriptor.contains(granule, GRANULE as u32) || granule != self.addr {
                    self.violations += 1;
                    return;
                }
                let start = self.offset(granule);
                for (i, word) in self.data.iter().enumerate() {
                    for (j, b) in word.to_le_bytes().into_iter().enumerate() {
                        self.memory[start + i * 4 + j] &= b;
                    }
                }
            }
            Command::Read => {
                if !self.descriptor.contains(granule, GRANULE as u32) {
                    self.violations += 1;
                    return;
                }
                let start = self.offset(granule);
                for (i, word) in self.data.iter_mut().enumerate() {
                    let b = &self.memory[start + i * 4..start + i * 4 + 4];
                    *word = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                }
            }
        }
        self.remaining = self.busy_reads;
    }
}

impl ControllerRegisters for SimController {
    fn write_addr(&mut self, address: u32) {
        self.check_idle();
        self.trace.push(Access::Addr(address));
        self.addr = address;
    }

    fn write_data(&mut self, index: usize, word: u32) {
        self.check_idle();
        self.trace.push(Access::DataWrite(index, word));
        self.data[index] = word;
    }

    fn read_data(&mut self, index: usize) -> u32 {
        self.trace.push(Access::DataRead(index));
        self.data[index]
    }

    fn write_cmd(&mut self, command: Command) {
        self.check_idle();
        self.trace.push(Access::Cmd(command));
        self.execute(command);
    }

    fn read_stat(&mut self) -> Status {
        let busy = self.busy();
        self.trace.push(Access::Stat { busy });
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        Status::new(u32::from(busy))
    }

    fn service_mode(&mut self) -> bool {
        self.trace.push(Access::ServiceRead);
        self.service_mode
    }

    fn trigger_service_erase(&mut self) {
        self.trace.push(Access::ServiceTrigger);
        self.service_erases += 1;
        self.erase_all();
    }
}

/// A delay provider that only counts the time it was asked to wait.
#[derive(Debug, Default)]
pub struct SimDelay {
    elapsed_ns: u64,
}

impl SimDelay {
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
