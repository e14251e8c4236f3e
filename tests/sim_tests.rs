#![cfg(feature = "sim")]
use k1921vk028_bflash::sim::*;
use k1921vk028_bflash::*;

fn flash() -> BootFlash<SimController, SimDelay> {
    BootFlash::new(
        SimController::new(&K1921VK028_BFLASH),
        SimDelay::default(),
        &K1921VK028_BFLASH,
    )
}

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i ^ (i >> 8)) as u8).collect()
}

#[test]
fn host_download_sequence() {
    let mut drv = flash();
    drv.registers_mut().preload(0x1234, &[0x00; 64]);

    assert_eq!(status(&drv.init(0, 100_000_000, Function::Erase)), 0);
    assert_eq!(status(&drv.erase_chip()), 0);
    assert_eq!(status(&drv.uninit(Function::Erase)), 0);

    let fw = image(3 * 4096 + 100);
    let page = K1921VK028_BFLASH.page_size as usize;
    assert_eq!(status(&drv.init(0, 100_000_000, Function::Program)), 0);
    for (i, chunk) in fw.chunks(page).enumerate() {
        assert_eq!(status(&drv.program_page((i * page) as u32, chunk)), 0);
    }
    assert_eq!(status(&drv.uninit(Function::Program)), 0);

    drv.init(0, 100_000_000, Function::Verify).unwrap();
    drv.verify(0, &fw).unwrap();
    drv.blank_check(fw.len() as u32, 0x1000, 0xFF).unwrap();
    drv.uninit(Function::Verify).unwrap();

    assert_eq!(drv.registers().contents(0, fw.len()), &fw[..]);
    assert_eq!(drv.registers().violations(), 0);
}

#[test]
fn misuse_reports_failure_status() {
    let mut drv = flash();
    assert_eq!(status(&drv.program_page(0, &[0; 16])), 1);
    assert_eq!(status(&drv.uninit(Function::Program)), 1);
    assert_eq!(Function::try_from(7).map(|_| ()), Err(Error::InvalidFunction));

    drv.init(0, 0, Function::Program).unwrap();
    assert_eq!(status(&drv.init(0, 0, Function::Program)), 1);
    assert_eq!(status(&drv.program_page(0x8_0000, &[0; 16])), 1);
    assert_eq!(status(&drv.erase_sector(0xFFFF_FFF0)), 1);
}

#[test]
fn trait_object_style_use() {
    fn wipe_and_write<F: HardwareFlashDevice>(dev: &mut F, addr: u32, data: &[u8]) -> Result<(), F::Error> {
        dev.chip_erase()?;
        dev.page_program(addr, data)?;
        let mut back = vec![0; data.len()];
        dev.read(addr, &mut back)?;
        assert_eq!(back, data);
        Ok(())
    }

    let mut drv = flash();
    drv.init(0, 48_000_000, Function::Program).unwrap();
    wipe_and_write(&mut drv, 0x7_F000, &image(4096)).unwrap();
    drv.sector_erase(0x7_F000).unwrap();
    assert!(drv.registers().contents(0, 0x8_0000).iter().all(|b| *b == 0xFF));
}

#[test]
fn service_mode_chip_erase_skips_command_register() {
    let mut drv = flash();
    drv.registers_mut().set_service_mode(true);
    drv.registers_mut().preload(0, &[0; 16]);
    drv.init(0, 0, Function::Erase).unwrap();
    drv.erase_chip().unwrap();
    let sim = drv.registers();
    assert_eq!(sim.service_erases(), 1);
    assert!(sim.commands().is_empty());
    assert!(!sim.trace().iter().any(|a| matches!(a, Access::Stat { .. })));
    assert!(sim.contents(0, 16).iter().all(|b| *b == 0xFF));
}

#[test]
fn hung_controller_does_not_hang_the_caller() {
    let mut drv = flash();
    drv.registers_mut().set_stuck(true);
    drv.init(0, 0, Function::Erase).unwrap();
    assert_eq!(drv.erase_sector(0), Err(Error::Timeout));
    assert_eq!(status(&drv.uninit(Function::Erase)), 0);
}
