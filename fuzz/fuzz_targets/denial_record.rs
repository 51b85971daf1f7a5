#![no_main]

use bootlogger_avc::{AllowRule, DenialRecord};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    if let Ok(record) = DenialRecord::parse(&line) {
        let rule = AllowRule::from(&record).to_string();
        assert!(rule.starts_with("allow "));
        assert!(rule.ends_with(';'));
    }
});
