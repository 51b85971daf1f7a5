//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 익스포터는 설치하지 않으므로 레코더가 없으면 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `bootlogger_`
//! - 모듈명: `tailer_`, `filter_`, `avc_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(bootlogger_core::metrics::TAILER_LINES_TOTAL, "source" => "logcat").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로그 소스 레이블 키 (dmesg, logcat)
pub const LABEL_SOURCE: &str = "source";

/// 필터 이름 레이블 키 (avc, libc_props)
pub const LABEL_FILTER: &str = "filter";

// ─── Tailer 메트릭 ─────────────────────────────────────────────────

/// Tailer: 소스별로 읽은 라인 수 (counter, label: source)
pub const TAILER_LINES_TOTAL: &str = "bootlogger_tailer_lines_total";

/// Tailer: 필터별 매칭 수 (counter, label: source, filter)
pub const FILTER_MATCHES_TOTAL: &str = "bootlogger_filter_matches_total";

// ─── AVC 메트릭 ───────────────────────────────────────────────────

/// AVC: 수집된 거부 레코드 수 (counter)
pub const AVC_RECORDS_COLLECTED_TOTAL: &str = "bootlogger_avc_records_collected_total";

/// AVC: 파싱 실패로 버려진 라인 수 (counter)
pub const AVC_PARSE_FAILURES_TOTAL: &str = "bootlogger_avc_parse_failures_total";

/// AVC: 생성된 allow 규칙 수 (counter)
pub const AVC_RULES_EMITTED_TOTAL: &str = "bootlogger_avc_rules_emitted_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 데몬 시작 시점에 한 번 호출합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        TAILER_LINES_TOTAL,
        "Total number of lines read from each log source"
    );
    describe_counter!(
        FILTER_MATCHES_TOTAL,
        "Total number of lines matched per filter and source"
    );
    describe_counter!(
        AVC_RECORDS_COLLECTED_TOTAL,
        "Total number of well-formed denial records collected"
    );
    describe_counter!(
        AVC_PARSE_FAILURES_TOTAL,
        "Total number of denial lines discarded by the record parser"
    );
    describe_counter!(
        AVC_RULES_EMITTED_TOTAL,
        "Total number of distinct allow rules written"
    );
}
