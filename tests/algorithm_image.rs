//! The firmware image only builds for the target, so these tests read its
//! source and check it against the library's descriptor.
use k1921vk028_bflash::{DeviceType, K1921VK028_BFLASH};

const ALGORITHM: &str = include_str!("../src/bin/algorithm.rs");
const MANIFEST: &str = include_str!("../Cargo.toml");

/// The `algorithm!` invocation, up to its closing `});`.
fn image_table() -> &'static str {
    let start = ALGORITHM
        .find("algorithm!(")
        .expect("algorithm! invocation");
    let len = ALGORITHM[start..].find("});").expect("end of algorithm!");
    &ALGORITHM[start..start + len]
}

/// Values of `key:` in the table, in order of appearance.
fn values<'a>(table: &'a str, key: &str) -> Vec<&'a str> {
    let pattern = format!("{key}:");
    table
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(pattern.as_str()))
        .map(|v| v.trim().trim_end_matches(',').trim())
        .collect()
}

fn number(table: &str, key: &str) -> u32 {
    let v = values(table, key);
    assert_eq!(v.len(), 1, "{key}");
    parse(v[0])
}

fn parse(text: &str) -> u32 {
    let text = text.replace('_', "");
    match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).unwrap(),
        None => text.parse().unwrap(),
    }
}

#[test]
fn image_table_matches_descriptor() {
    let table = image_table();
    let d = &K1921VK028_BFLASH;
    assert_eq!(values(table, "device_name"), vec![format!("\"{}\"", d.name)]);
    assert_eq!(d.device_type, DeviceType::Onchip);
    assert_eq!(values(table, "device_type"), vec!["DeviceType::Onchip"]);
    assert_eq!(number(table, "flash_address"), d.start);
    assert_eq!(number(table, "flash_size"), d.size);
    assert_eq!(number(table, "page_size"), d.page_size);
    assert_eq!(number(table, "empty_value"), u32::from(d.empty));
    assert_eq!(number(table, "program_time_out"), d.program_timeout_ms);
    assert_eq!(number(table, "erase_time_out"), d.erase_timeout_ms);

    let sizes: Vec<u32> = values(table, "size").into_iter().map(parse).collect();
    let addresses: Vec<u32> = values(table, "address").into_iter().map(parse).collect();
    let expected: Vec<(u32, u32)> = d.sectors().map(|s| (s.size, s.address)).collect();
    assert_eq!(sizes.into_iter().zip(addresses).collect::<Vec<_>>(), expected);
}

#[test]
fn optional_entry_points_are_exported() {
    for (feature, entry) in [
        ("erase-chip", "fn erase_all"),
        ("read-flash", "fn read_flash"),
        ("blank-check", "fn blank_check"),
        ("verify", "fn verify"),
    ] {
        assert!(MANIFEST.contains(&format!("\"{feature}\"")), "{feature}");
        assert!(ALGORITHM.contains(entry), "{entry}");
    }
}
