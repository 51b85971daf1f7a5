#![no_main]

use std::sync::Arc;

use bootlogger_core::LineFilter;
use bootlogger_log_pipeline::{AvcFilter, DenialCollection, PropertyFilter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    let collection = Arc::new(DenialCollection::new());
    let avc = AvcFilter::new("untrusted_app", Arc::clone(&collection)).expect("valid pattern");
    let props = PropertyFilter::new().expect("valid pattern");

    // 매칭되지 않은 라인은 레코드를 남기지 않는다
    if !avc.matches(&line) {
        assert!(collection.is_empty());
    }
    let _ = props.matches(&line);
});
