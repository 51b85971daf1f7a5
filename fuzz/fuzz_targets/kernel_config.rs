#![no_main]

use bootlogger_kconfig::{ConfigValue, KernelConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 비 UTF-8 입력도 손실 변환으로 받아들여야 한다
    let table = KernelConfig::from_reader(data).expect("in-memory reads do not fail");
    assert_eq!(
        table.is_builtin("CONFIG_AUDIT"),
        table.get("CONFIG_AUDIT") == Some(ConfigValue::BuiltIn)
    );

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = KernelConfig::parse(text);
    }
});
