//! BFLASH controller register map.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

use crate::traits::ControllerRegisters;

pub const BFLASH_BASE: usize = 0x4006_1000;

/// Service-mode flag (bit 31 on read) and full-erase trigger (write `1`).
pub const SERVICE_BASE: usize = 0x4008_0014;

/// Data staging registers: one 16-byte granule.
pub const DATA_WORDS: usize = 4;

/// Bytes committed by one `Write` command.
pub const GRANULE: usize = DATA_WORDS * 4;

const MAGIC_KEY: u32 = 0xC0DE_0000;

register_structs! {
    /// BFLASH
    pub BflashRegisters {
        /// Target address of the next command
        (0x000 => addr: ReadWrite<u32>),
        /// Data staging buffer
        (0x004 => data: [ReadWrite<u32>; DATA_WORDS]),
        (0x014 => _reserved0),
        /// Command trigger
        (0x044 => cmd: WriteOnly<u32, CMD::Register>),
        /// Status
        (0x048 => stat: ReadOnly<u32, STAT::Register>),
        /// Control, left at its reset value
        (0x04C => _ctrl: ReadWrite<u32>),
        (0x050 => @END),
    }
}

register_bitfields![u32,
    pub CMD [
        /// Operation to start
        OP OFFSET(0) NUMBITS(8) [
            Read = 0x01,
            Write = 0x02,
            SectorErase = 0x04,
            FullErase = 0x0C
        ],
        /// Selects the NVR information block instead of the main array
        NVR OFFSET(8) NUMBITS(1) [],
        /// Must hold 0xC0DE for the command to be accepted
        KEY OFFSET(16) NUMBITS(16) []
    ],
    pub STAT [
        /// Command in progress
        BUSY OFFSET(0) NUMBITS(1) []
    ],
    pub SERVICE [
        /// Full-erase trigger
        TRIGGER OFFSET(0) NUMBITS(1) [],
        /// Chip is strapped into service mode
        MODE OFFSET(31) NUMBITS(1) []
    ]
];

/// A snapshot of the STAT register.
pub type Status = LocalRegisterCopy<u32, STAT::Register>;

/// Controller commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Command {
    /// Load DATA with the granule at ADDR.
    Read = MAGIC_KEY | 0x01,
    /// Program DATA into the granule at ADDR.
    Write = MAGIC_KEY | 0x02,
    /// Erase the sector holding ADDR.
    SectorErase = MAGIC_KEY | 0x04,
    /// Erase the whole array.
    FullErase = MAGIC_KEY | 0x0C,
}

impl Command {
    /// Value written to CMD.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Decodes a CMD write; `None` when the key or opcode is not recognised.
    pub fn from_code(code: u32) -> Option<Self> {
        let value = LocalRegisterCopy::<u32, CMD::Register>::new(code);
        if value.read(CMD::KEY) != MAGIC_KEY >> 16 || value.is_set(CMD::NVR) {
            return None;
        }
        match value.read_as_enum(CMD::OP) {
            Some(CMD::OP::Value::Read) => Some(Command::Read),
            Some(CMD::OP::Value::Write) => Some(Command::Write),
            Some(CMD::OP::Value::SectorErase) => Some(Command::SectorErase),
            Some(CMD::OP::Value::FullErase) => Some(Command::FullErase),
            None => None,
        }
    }
}

/// DATA words for one granule. A short `chunk` is padded with `fill`.
pub fn pack_granule(chunk: &[u8], fill: u8) -> [u32; DATA_WORDS] {
    let mut bytes = [fill; GRANULE];
    let len = chunk.len().min(GRANULE);
    bytes[..len].copy_from_slice(&chunk[..len]);
    let mut words = [0u32; DATA_WORDS];
    for (word, b) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    }
    words
}

/// Bytes of a granule read back through DATA.
pub fn unpack_granule(words: [u32; DATA_WORDS]) -> [u8; GRANULE] {
    let mut bytes = [0u8; GRANULE];
    for (b, word) in bytes.chunks_exact_mut(4).zip(words) {
        b.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// The memory-mapped controller of the real chip.
pub struct Bflash {
    regs: &'static BflashRegisters,
    service: &'static ReadWrite<u32, SERVICE::Register>,
}

impl Bflash {
    /// # Safety
    ///
    /// Must run on the K1921VK028 with the controller at [`BFLASH_BASE`], and
    /// only one `Bflash` may be alive at a time.
    pub unsafe fn steal() -> Self {
        Self {
            regs: &*(BFLASH_BASE as *const BflashRegisters),
            service: &*(SERVICE_BASE as *const ReadWrite<u32, SERVICE::Register>),
        }
    }
}

impl ControllerRegisters for Bflash {
    fn write_addr(&mut self, address: u32) {
        self.regs.addr.set(address);
    }

    fn write_data(&mut self, index: usize, word: u32) {
        self.regs.data[index].set(word);
    }

    fn read_data(&mut self, index: usize) -> u32 {
        self.regs.data[index].get()
    }

    fn write_cmd(&mut self, command: Command) {
        self.regs.cmd.set(command.code());
    }

    fn read_stat(&mut self) -> Status {
        Status::new(self.regs.stat.get())
    }

    fn service_mode(&mut self) -> bool {
        self.service.is_set(SERVICE::MODE)
    }

    fn trigger_service_erase(&mut self) {
        self.service.write(SERVICE::TRIGGER::SET);
    }
}
