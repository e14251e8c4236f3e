//! Static device description, in the layout the FlashOS host tools read from
//! the `DevDscr` section of a flash algorithm image.

use core::ops::Range;

/// Format tag of the descriptor (`0x0100 + 1`).
pub const FLASH_DRV_VERS: u16 = 0x0101;

/// Class of memory the algorithm programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum DeviceType {
    Unknown = 0,
    Onchip = 1,
    Ext8Bit = 2,
    Ext16Bit = 3,
    Ext32Bit = 4,
    ExtSpi = 5,
}

/// One `(size, offset)` entry of the sector table.
///
/// Sectors of `size` bytes repeat from `address` (an offset from the device
/// start) up to the next entry, or the end of the device for the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SectorInfo {
    pub size: u32,
    pub address: u32,
}

/// Terminates the sector table.
pub const SECTOR_END: SectorInfo = SectorInfo {
    size: 0xFFFF_FFFF,
    address: 0xFFFF_FFFF,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub version: u16,
    pub name: &'static str,
    pub device_type: DeviceType,
    pub start: u32,
    pub size: u32,
    /// Programming page size: the largest block handed to one `ProgramPage`.
    pub page_size: u32,
    /// Content of erased memory.
    pub empty: u8,
    /// Advisory, in milliseconds.
    pub program_timeout_ms: u32,
    /// Advisory, in milliseconds.
    pub erase_timeout_ms: u32,
    /// Sector table, terminated by [`SECTOR_END`].
    pub sectors: &'static [SectorInfo],
}

/// The 512 KiB boot flash of the K1921VK028: a single 512 KiB erase sector.
pub const K1921VK028_BFLASH: DeviceDescriptor = DeviceDescriptor {
    version: FLASH_DRV_VERS,
    name: "K1921VK028 512KB Flash",
    device_type: DeviceType::Onchip,
    start: 0x0000_0000,
    size: 0x0008_0000,
    page_size: 4096,
    empty: 0xFF,
    program_timeout_ms: 100,
    erase_timeout_ms: 3000,
    sectors: &[
        SectorInfo {
            size: 0x0008_0000,
            address: 0x0000_0000,
        },
        SECTOR_END,
    ],
};

/// Why a sector table does not describe its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorError {
    /// No entry before the sentinel.
    Empty,
    /// The first entry does not start at offset 0.
    Gap { offset: u32 },
    /// Entry offsets are not strictly increasing.
    Overlap { offset: u32 },
    /// A sector size of zero, or a region that is not a whole number of sectors.
    Misaligned { offset: u32 },
    /// An entry lies beyond the end of the device.
    OutOfRange { offset: u32 },
}

impl DeviceDescriptor {
    /// End of the device, exclusive.
    pub const fn end(&self) -> u32 {
        self.start + self.size
    }

    /// The declared table entries, up to (not including) the sentinel.
    pub fn sectors(&self) -> impl Iterator<Item = SectorInfo> + '_ {
        self.sectors
            .iter()
            .copied()
            .take_while(|s| *s != SECTOR_END)
    }

    /// Whether `[address, address + len)` lies within the device.
    pub fn contains(&self, address: u32, len: u32) -> bool {
        address >= self.start
            && address
                .checked_add(len)
                .is_some_and(|end| end <= self.end())
    }

    /// Every erase sector of the device as an absolute address range.
    pub fn sector_ranges(&self) -> SectorRanges<'_> {
        SectorRanges {
            descriptor: self,
            entry: 0,
            offset: self.sectors.first().map_or(0, |s| s.address),
        }
    }

    /// The erase sector holding `address`.
    pub fn sector_containing(&self, address: u32) -> Option<Range<u32>> {
        if !self.contains(address, 1) {
            return None;
        }
        let offset = address - self.start;
        let mut found = None;
        for (i, entry) in self.sectors().enumerate() {
            if entry.address > offset {
                break;
            }
            let region_end = self
                .sectors()
                .nth(i + 1)
                .map_or(self.size, |next| next.address);
            if offset < region_end && entry.size != 0 {
                let index = (offset - entry.address) / entry.size;
                let base = self.start + entry.address + index * entry.size;
                found = Some(base..base + entry.size);
            }
        }
        found
    }

    /// Checks that the sector table covers `[start, start + size)` exactly,
    /// with no gaps or overlaps.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut entries = self.sectors().peekable();
        let first = entries.peek().copied().ok_or(DescriptorError::Empty)?;
        if first.address != 0 {
            return Err(DescriptorError::Gap {
                offset: first.address,
            });
        }
        while let Some(entry) = entries.next() {
            if entry.address >= self.size {
                return Err(DescriptorError::OutOfRange {
                    offset: entry.address,
                });
            }
            let region_end = match entries.peek() {
                Some(next) if next.address <= entry.address => {
                    return Err(DescriptorError::Overlap {
                        offset: next.address,
                    })
                }
                Some(next) => next.address,
                None => self.size,
            };
            if entry.size == 0 || (region_end - entry.address) % entry.size != 0 {
                return Err(DescriptorError::Misaligned {
                    offset: entry.address,
                });
            }
        }
        Ok(())
    }
}

/// Iterator over the concrete erase sectors of a [`DeviceDescriptor`].
pub struct SectorRanges<'a> {
    descriptor: &'a DeviceDescriptor,
    entry: usize,
    offset: u32,
}

impl Iterator for SectorRanges<'_> {
    type Item = Range<u32>;

    fn next(&mut self) -> Option<Range<u32>> {
        let d = self.descriptor;
        loop {
            let current = d.sectors().nth(self.entry)?;
            if current.size == 0 {
                return None;
            }
            let region_end = d.sectors().nth(self.entry + 1).map_or(d.size, |n| n.address);
            if self.offset >= region_end {
                self.entry += 1;
                continue;
            }
            let base = d.start + self.offset;
            self.offset += current.size;
            return Some(base..base + current.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLIT: DeviceDescriptor = DeviceDescriptor {
        version: FLASH_DRV_VERS,
        name: "split",
        device_type: DeviceType::Onchip,
        start: 0x1000_0000,
        size: 0x6000,
        page_size: 256,
        empty: 0xFF,
        program_timeout_ms: 100,
        erase_timeout_ms: 3000,
        sectors: &[
            SectorInfo {
                size: 0x1000,
                address: 0x0,
            },
            SectorInfo {
                size: 0x2000,
                address: 0x2000,
            },
            SECTOR_END,
        ],
    };

    #[test]
    fn boot_flash_is_one_sector() {
        let d = K1921VK028_BFLASH;
        assert_eq!(d.validate(), Ok(()));
        assert_eq!(d.sectors().count(), 1);
        assert_eq!(d.sector_ranges().collect::<Vec<_>>(), vec![0..0x8_0000]);
        assert_eq!(d.sector_containing(0x7_FFFF), Some(0..0x8_0000));
        assert_eq!(d.sector_containing(0x8_0000), None);
    }

    #[test]
    fn sector_ranges_follow_table() {
        let ranges: Vec<_> = SPLIT.sector_ranges().collect();
        assert_eq!(
            ranges,
            vec![
                0x1000_0000..0x1000_1000,
                0x1000_1000..0x1000_2000,
                0x1000_2000..0x1000_4000,
                0x1000_4000..0x1000_6000,
            ]
        );
        assert_eq!(SPLIT.validate(), Ok(()));
    }

    #[test]
    fn sector_containing_picks_region() {
        assert_eq!(
            SPLIT.sector_containing(0x1000_1FFF),
            Some(0x1000_1000..0x1000_2000)
        );
        assert_eq!(
            SPLIT.sector_containing(0x1000_4800),
            Some(0x1000_4000..0x1000_6000)
        );
        assert_eq!(SPLIT.sector_containing(0x0FFF_FFFF), None);
    }

    #[test]
    fn contains_rejects_overflow() {
        assert!(SPLIT.contains(0x1000_5FF0, 0x10));
        assert!(!SPLIT.contains(0x1000_5FF0, 0x11));
        assert!(!SPLIT.contains(0xFFFF_FFF0, 0x20));
    }

    #[test]
    fn validate_reports_bad_tables() {
        let gap = DeviceDescriptor {
            sectors: &[
                SectorInfo {
                    size: 0x1000,
                    address: 0x1000,
                },
                SECTOR_END,
            ],
            ..SPLIT
        };
        assert_eq!(gap.validate(), Err(DescriptorError::Gap { offset: 0x1000 }));

        let ragged = DeviceDescriptor {
            sectors: &[
                SectorInfo {
                    size: 0x4000,
                    address: 0x0,
                },
                SECTOR_END,
            ],
            ..SPLIT
        };
        assert_eq!(
            ragged.validate(),
            Err(DescriptorError::Misaligned { offset: 0 })
        );

        let empty = DeviceDescriptor {
            sectors: &[SECTOR_END],
            ..SPLIT
        };
        assert_eq!(empty.validate(), Err(DescriptorError::Empty));
    }
}
