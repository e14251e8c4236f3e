//! FlashOS entry points for the K1921VK028 boot flash.
//!
//! Build with `cargo build --release --features algorithm --target
//! thumbv7em-none-eabihf`; the host tools load the resulting ELF.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod algorithm {
    use embedded_hal::delay::DelayNs;
    use flash_algorithm::{ErrorCode, FlashAlgorithm};
    use k1921vk028_bflash::poll::NOMINAL_CLOCK_HZ;
    use k1921vk028_bflash::regs::Bflash;
    use k1921vk028_bflash::{BootFlash, Error, Function, K1921VK028_BFLASH};

    /// Busy-waits on the core cycle count, like the `__nop()` runs it replaces.
    struct CycleDelay {
        clock_hz: u32,
    }

    impl DelayNs for CycleDelay {
        fn delay_ns(&mut self, ns: u32) {
            let cycles = (u64::from(ns) * u64::from(self.clock_hz)).div_ceil(1_000_000_000);
            cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX).max(1));
        }
    }

    struct Algorithm {
        flash: BootFlash<Bflash, CycleDelay>,
        function: Function,
    }

    flash_algorithm::algorithm!(Algorithm, {
        device_name: "K1921VK028 512KB Flash",
        device_type: DeviceType::Onchip,
        flash_address: 0x0000_0000,
        flash_size: 0x0008_0000,
        page_size: 4096,
        empty_value: 0xFF,
        program_time_out: 100,
        erase_time_out: 3000,
        sectors: [{
            size: 0x0008_0000,
            address: 0x0,
        }]
    });

    impl FlashAlgorithm for Algorithm {
        fn new(
            address: u32,
            clock: u32,
            function: flash_algorithm::Function,
        ) -> Result<Self, ErrorCode> {
            let function = match function {
                flash_algorithm::Function::Erase => Function::Erase,
                flash_algorithm::Function::Program => Function::Program,
                flash_algorithm::Function::Verify => Function::Verify,
            };
            let clock_hz = if clock == 0 { NOMINAL_CLOCK_HZ } else { clock };
            // SAFETY: the host runs exactly one algorithm instance on the target.
            let regs = unsafe { Bflash::steal() };
            let mut flash = BootFlash::new(regs, CycleDelay { clock_hz }, &K1921VK028_BFLASH);
            flash.init(address, clock, function).map_err(Error::code)?;
            Ok(Self { flash, function })
        }

        fn erase_all(&mut self) -> Result<(), ErrorCode> {
            self.flash.erase_chip().map_err(Error::code)
        }

        fn erase_sector(&mut self, address: u32) -> Result<(), ErrorCode> {
            self.flash.erase_sector(address).map_err(Error::code)
        }

        fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), ErrorCode> {
            self.flash.program_page(address, data).map_err(Error::code)
        }

        fn read_flash(&mut self, address: u32, data: &mut [u8]) -> Result<(), ErrorCode> {
            self.flash.read(address, data).map_err(Error::code)
        }

        fn blank_check(&mut self, address: u32, size: u32, pattern: u8) -> Result<(), ErrorCode> {
            self.flash.blank_check(address, size, pattern).map_err(Error::code)
        }

        fn verify(&mut self, address: u32, size: u32, data: Option<&[u8]>) -> Result<(), ErrorCode> {
            let expected = data
                .and_then(|data| data.get(..size as usize))
                .ok_or(Error::InvalidAddress)
                .map_err(Error::code)?;
            self.flash.verify(address, expected).map_err(Error::code)
        }
    }

    impl Drop for Algorithm {
        fn drop(&mut self) {
            // UnInit has no way to report a failure back through Drop.
            let _ = self.flash.uninit(self.function);
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
