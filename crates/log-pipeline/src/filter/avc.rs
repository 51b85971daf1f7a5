//! AVC 거부 필터와 공유 레코드 컬렉션

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use regex::Regex;

use bootlogger_avc::DenialRecord;
use bootlogger_core::LineFilter;
use bootlogger_core::metrics as m;

use crate::error::LogPipelineError;

/// `avc: denied { op ... } for ` 형태 (권한 목록이 비어 있지 않아야 함)
const DENIAL_PATTERN: &str = r"avc:\s+denied\s+\{(\s\w+)+\s\}\sfor\s";

/// 여러 테일러가 함께 채우는 거부 레코드 목록
///
/// 삽입 순서는 테일러 간 경쟁에 따라 달라집니다. 병합 결과는 순서와 무관합니다.
#[derive(Debug, Default)]
pub struct DenialCollection {
    records: Mutex<Vec<DenialRecord>>,
}

impl DenialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    // 목록은 추가만 하므로 poison 상태여도 그대로 사용
    fn lock(&self) -> MutexGuard<'_, Vec<DenialRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: DenialRecord) {
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 수집된 레코드를 모두 꺼냅니다. 테일러가 모두 끝난 뒤 한 번 호출합니다.
    pub fn take(&self) -> Vec<DenialRecord> {
        std::mem::take(&mut *self.lock())
    }
}

/// AVC 거부 라인 필터
///
/// 제외 주체(기본 `untrusted_app`)가 포함된 라인은 매칭하지 않습니다.
/// 매칭된 라인은 파싱을 시도하고, 성공하면 컬렉션에 추가합니다.
/// 파싱에 실패해도 매칭 결과는 `true`입니다.
pub struct AvcFilter {
    pattern: Regex,
    excluded_actor: String,
    collection: Arc<DenialCollection>,
}

impl AvcFilter {
    /// 필터 이름이자 출력 파일 접두어
    pub const NAME: &'static str = "avc";

    pub fn new(
        excluded_actor: impl Into<String>,
        collection: Arc<DenialCollection>,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(DENIAL_PATTERN)?,
            excluded_actor: excluded_actor.into(),
            collection,
        })
    }

    fn is_excluded(&self, line: &str) -> bool {
        !self.excluded_actor.is_empty() && line.contains(&self.excluded_actor)
    }
}

impl LineFilter for AvcFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, line: &str) -> bool {
        if !self.pattern.is_match(line) || self.is_excluded(line) {
            return false;
        }

        match DenialRecord::parse(line) {
            Ok(record) => {
                self.collection.push(record);
                metrics::counter!(m::AVC_RECORDS_COLLECTED_TOTAL).increment(1);
            }
            Err(e) => {
                tracing::warn!(line, error = %e, "failed to parse denial record");
                metrics::counter!(m::AVC_PARSE_FAILURES_TOTAL).increment(1);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MYDOMAIN_LINE: &str = "avc: denied { ioctl } for comm=\"bar\" scontext=u:r:mydomain:s0 tcontext=u:object_r:vendor_device:s0 tclass=chr_file permissive=0";
    const UNTRUSTED_LINE: &str = "avc: denied { read write } for comm=\"foo\" scontext=u:r:untrusted_app:s0 tcontext=u:object_r:sdcard_type:s0 tclass=dir permissive=1";

    fn filter() -> (AvcFilter, Arc<DenialCollection>) {
        let collection = Arc::new(DenialCollection::new());
        let filter = AvcFilter::new("untrusted_app", Arc::clone(&collection)).unwrap();
        (filter, collection)
    }

    #[test]
    fn matches_and_collects_denial() {
        let (filter, collection) = filter();

        assert!(filter.matches(MYDOMAIN_LINE));

        let records = collection.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_context.as_str(), "mydomain");
        assert!(collection.is_empty());
    }

    #[test]
    fn excluded_actor_is_not_matched_or_collected() {
        let (filter, collection) = filter();

        assert!(!filter.matches(UNTRUSTED_LINE));
        assert!(collection.is_empty());
    }

    #[test]
    fn empty_excluded_actor_disables_exclusion() {
        let collection = Arc::new(DenialCollection::new());
        let filter = AvcFilter::new("", Arc::clone(&collection)).unwrap();

        assert!(filter.matches(UNTRUSTED_LINE));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn parse_failure_still_matches() {
        let (filter, collection) = filter();
        // permissive 누락
        let line = "avc: denied { read } for scontext=u:r:a:s0 tcontext=u:r:b:s0 tclass=file";

        assert!(filter.matches(line));
        assert!(collection.is_empty());
    }

    #[test]
    fn ignores_non_denial_lines() {
        let (filter, collection) = filter();

        assert!(!filter.matches("init: starting service 'vold'..."));
        assert!(!filter.matches("avc: granted { find } for scontext=u:r:a:s0"));
        assert!(!filter.matches("avc: denied { } for scontext=u:r:a:s0"));
        assert!(collection.is_empty());
    }

    #[test]
    fn matches_kernel_spacing() {
        let (filter, collection) = filter();
        let line = "[    5.1] audit: type=1400 audit(0.0:2): avc:  denied  { open getattr } for  pid=1 comm=\"init\" scontext=u:r:init:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0";

        assert!(filter.matches(line));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn name_is_avc() {
        let (filter, _) = filter();
        assert_eq!(filter.name(), "avc");
    }

    #[test]
    fn concurrent_matches_collect_every_record() {
        let (filter, collection) = filter();
        let filter = Arc::new(filter);

        std::thread::scope(|s| {
            for _ in 0..4 {
                let filter = Arc::clone(&filter);
                s.spawn(move || {
                    for _ in 0..100 {
                        assert!(filter.matches(MYDOMAIN_LINE));
                    }
                });
            }
        });

        assert_eq!(collection.len(), 400);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_text_does_not_panic(line in ".{0,300}") {
                let (filter, _) = filter();
                let _ = filter.matches(&line);
            }

            #[test]
            fn lines_without_marker_are_never_collected(line in "[^a]{0,200}") {
                let (filter, collection) = filter();
                prop_assert!(!filter.matches(&line));
                prop_assert!(collection.is_empty());
            }
        }
    }
}
