#![no_main]

use arbitrary::Arbitrary;
use bootlogger_avc::{DenialRecord, RuleSynthesizer, merge_records};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Denial {
    granted: bool,
    source: u8,
    target: u8,
    class: u8,
    ops: Vec<u8>,
}

const NAMES: [&str; 4] = ["init", "vold", "hal", "system_server"];
const CLASSES: [&str; 3] = ["file", "dir", "chr_file"];
const OPS: [&str; 6] = ["read", "write", "open", "ioctl", "getattr", "sys_admin"];

impl Denial {
    fn line(&self) -> String {
        let ops: Vec<&str> = self
            .ops
            .iter()
            .take(8)
            .map(|i| OPS[*i as usize % OPS.len()])
            .collect();
        format!(
            "avc: {} {{ {} }} for scontext=u:r:{}:s0 tcontext=u:object_r:{}:s0 tclass={} permissive=0",
            if self.granted { "granted" } else { "denied" },
            ops.join(" "),
            NAMES[self.source as usize % NAMES.len()],
            NAMES[self.target as usize % NAMES.len()],
            CLASSES[self.class as usize % CLASSES.len()],
        )
    }
}

fuzz_target!(|denials: Vec<Denial>| {
    let mut records: Vec<DenialRecord> = denials
        .iter()
        .filter_map(|d| DenialRecord::parse(&d.line()).ok())
        .collect();

    let summary = merge_records(&mut records);
    assert_eq!(summary.absorbed + summary.survivors, records.len());

    // 두 번째 병합은 아무것도 흡수하지 않는다
    let again = merge_records(&mut records);
    assert_eq!(again.absorbed, 0);

    let rules = RuleSynthesizer::default().synthesize(&records);
    assert!(rules.len() <= summary.survivors);
});
