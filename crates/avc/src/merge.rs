//! 동등한 거부 레코드 병합
//!
//! `granted`, 주체/대상 컨텍스트, 대상 클래스가 같은 레코드는 하나의 규칙으로
//! 표현할 수 있습니다. 처음 등장한 레코드가 살아남아 권한 집합을 모으고,
//! 나머지는 inert로 표시됩니다.
//!
//! 입력 순서가 달라도 살아남는 레코드의 (키, 권한 집합)은 동일합니다.

use std::collections::HashMap;

use crate::context::SecurityContext;
use crate::record::DenialRecord;

/// 병합 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// 이번 병합에서 흡수된(inert로 바뀐) 레코드 수
    pub absorbed: usize,
    /// 병합 후 남은 레코드 수
    pub survivors: usize,
}

type MergeKey = (bool, SecurityContext, SecurityContext, String);

fn merge_key(record: &DenialRecord) -> MergeKey {
    (
        record.granted,
        record.source_context.clone(),
        record.target_context.clone(),
        record.target_class.clone(),
    )
}

/// 수집된 레코드를 제자리에서 병합합니다.
///
/// 이미 inert인 레코드는 병합의 주체도 대상도 되지 않습니다.
/// 레코드는 자기 자신과 병합되지 않습니다.
pub fn merge_records(records: &mut [DenialRecord]) -> MergeSummary {
    // 키 -> 살아남은 레코드 인덱스
    let mut survivors: HashMap<MergeKey, usize> = HashMap::new();
    let mut summary = MergeSummary::default();

    for i in 0..records.len() {
        if records[i].inert {
            continue;
        }

        let key = merge_key(&records[i]);

        let Some(&first) = survivors.get(&key) else {
            survivors.insert(key, i);
            summary.survivors += 1;
            continue;
        };

        // first < i 이므로 분할 후 양쪽을 동시에 빌릴 수 있음
        let (head, tail) = records.split_at_mut(i);
        let survivor = &mut head[first];
        let absorbed = &mut tail[0];
        debug_assert!(survivor.is_mergeable_with(absorbed));

        survivor
            .operations
            .extend(std::mem::take(&mut absorbed.operations));
        absorbed.inert = true;
        summary.absorbed += 1;
    }

    if summary.absorbed > 0 {
        tracing::debug!(
            absorbed = summary.absorbed,
            survivors = summary.survivors,
            "merged equivalent denial records"
        );
    }

    summary
}
