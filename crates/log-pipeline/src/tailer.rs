//! 소스별 라인 테일러
//!
//! 테일러 하나가 소스 하나를 담당합니다. 라인마다 설치된 필터를 순서대로 평가하고,
//! 매칭된 필터의 싱크와 소스 원본 싱크에 라인을 기록합니다.
//!
//! 한 번에 읽는 양은 `max_line_length` 바이트로 제한됩니다. 더 긴 입력은
//! 같은 크기의 조각으로 나뉘어 각각 한 라인으로 처리되며, 버려지는 바이트는 없습니다.
//!
//! # 종료 조건
//! - 취소 토큰: 다음 라인을 기다리는 중이어도 즉시 빠져나옵니다.
//! - 소스 끝(EOF)
//! - 읽기 에러
//!
//! 종료 시 모든 싱크를 닫고, 비어 있는 출력 파일은 삭제합니다.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::Counter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use bootlogger_core::LineFilter;
use bootlogger_core::metrics as m;

use crate::error::LogPipelineError;
use crate::sink::{DEFAULT_FLUSH_THRESHOLD, OutputSink};

/// 기본 라인 길이 상한 (바이트)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// 테일러 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailerConfig {
    /// 한 번에 읽는 최대 바이트 수. 더 긴 라인은 조각으로 나뉩니다.
    pub max_line_length: usize,
    /// 싱크 flush 임계값 (바이트)
    pub flush_threshold: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

/// 테일러가 멈춘 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 취소 토큰
    Cancelled,
    /// 소스 끝
    Exhausted,
    /// 읽기 에러
    ReadError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cancelled => "cancelled",
            Self::Exhausted => "exhausted",
            Self::ReadError => "read_error",
        })
    }
}

/// 테일러 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerStats {
    /// 소스 이름
    pub source: String,
    /// 읽은 라인 수
    pub lines: u64,
    /// (필터 이름, 매칭 수), 설치 순서
    pub filter_matches: Vec<(String, u64)>,
    pub stop: StopReason,
}

struct InstalledFilter {
    filter: Arc<dyn LineFilter>,
    /// 쓰기 실패 후에는 `None` (필터 평가는 계속)
    sink: Option<OutputSink>,
    matches: u64,
    counter: Counter,
}

/// 소스 하나를 읽는 테일러
pub struct Tailer {
    name: String,
    dir: PathBuf,
    config: TailerConfig,
    raw: Option<OutputSink>,
    filters: Vec<InstalledFilter>,
    lines: u64,
    lines_counter: Counter,
}

impl Tailer {
    /// `dir/<name>.txt` 원본 싱크를 열고 테일러를 만듭니다.
    ///
    /// 원본 싱크를 열지 못하면 에러입니다 (세션 시작 불가).
    pub async fn create(
        name: impl Into<String>,
        dir: impl AsRef<Path>,
        config: TailerConfig,
    ) -> Result<Self, LogPipelineError> {
        let name = name.into();
        let dir = dir.as_ref().to_path_buf();
        let raw = OutputSink::create(&dir, &name, None, config.flush_threshold).await?;
        let lines_counter = metrics::counter!(m::TAILER_LINES_TOTAL, m::LABEL_SOURCE => name.clone());

        Ok(Self {
            name,
            dir,
            config,
            raw: Some(raw),
            filters: Vec::new(),
            lines: 0,
            lines_counter,
        })
    }

    /// 필터를 설치하고 `dir/<filter>.<name>.txt` 싱크를 엽니다.
    ///
    /// 싱크를 열지 못하면 경고를 남기고 필터를 설치하지 않습니다 (`false`).
    pub async fn install_filter(&mut self, filter: Arc<dyn LineFilter>) -> bool {
        let sink = match OutputSink::create(
            &self.dir,
            &self.name,
            Some(filter.name()),
            self.config.flush_threshold,
        )
        .await
        {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!(
                    source = %self.name,
                    filter = filter.name(),
                    error = %e,
                    "filter sink failed to open, filter dropped"
                );
                return false;
            }
        };

        let counter = metrics::counter!(
            m::FILTER_MATCHES_TOTAL,
            m::LABEL_SOURCE => self.name.clone(),
            m::LABEL_FILTER => filter.name().to_owned()
        );
        self.filters.push(InstalledFilter {
            filter,
            sink: Some(sink),
            matches: 0,
            counter,
        });
        true
    }

    /// 소스 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 설치된 필터 이름 (평가 순서)
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.filter.name())
    }

    /// 취소되거나 소스가 끝날 때까지 라인을 처리합니다.
    ///
    /// 라인 단위 에러는 밖으로 전파하지 않습니다.
    pub async fn run<R>(mut self, mut reader: R, cancel: CancellationToken) -> TailerStats
    where
        R: AsyncBufRead + Unpin,
    {
        tracing::info!(
            source = %self.name,
            filters = ?self.filter_names().collect::<Vec<_>>(),
            "tailer started"
        );

        let limit = self.config.max_line_length.max(1) as u64;
        let mut buf = Vec::with_capacity(self.config.max_line_length);
        // 앞 조각 끝에서 잘린 UTF-8 시퀀스
        let mut carry = Vec::new();
        // 앞 조각이 줄바꿈 없이 상한에서 끊겼는지
        let mut continued = false;
        let stop = loop {
            buf.clear();
            buf.append(&mut carry);
            let mut limited = (&mut reader).take(limit);
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                read = limited.read_until(b'\n', &mut buf) => Some(read),
            };
            let Some(read) = read else {
                break StopReason::Cancelled;
            };

            match read {
                Ok(0) if buf.is_empty() => break StopReason::Exhausted,
                Ok(read) => {
                    let terminated = buf.last() == Some(&b'\n');
                    // EOF에서는 남은 바이트를 그대로 처리
                    if !terminated && read > 0 {
                        carry = split_incomplete_utf8(&mut buf);
                    }
                    let line = decode_line(&buf);
                    // 상한에 딱 맞게 끝난 라인의 줄바꿈만 남은 조각
                    let boundary_only = continued && terminated && line.is_empty();
                    let carried_only = buf.is_empty() && !carry.is_empty();
                    if !boundary_only && !carried_only {
                        self.process_line(&line).await;
                    }
                    continued = !terminated;
                }
                Err(e) => {
                    tracing::warn!(source = %self.name, error = %e, "read failed, stopping tailer");
                    break StopReason::ReadError;
                }
            }
        };

        self.finish(stop).await
    }

    /// 실행하지 않은 테일러를 닫습니다. 비어 있는 출력 파일은 삭제됩니다.
    pub async fn close(self) {
        let Self {
            name, raw, filters, ..
        } = self;
        for installed in filters {
            if let Some(sink) = installed.sink {
                close_sink(&name, sink).await;
            }
        }
        if let Some(raw) = raw {
            close_sink(&name, raw).await;
        }
    }

    async fn process_line(&mut self, line: &str) {
        self.lines += 1;
        self.lines_counter.increment(1);

        for installed in &mut self.filters {
            if !installed.filter.matches(line) {
                continue;
            }
            installed.matches += 1;
            installed.counter.increment(1);

            let Some(sink) = installed.sink.as_mut() else {
                continue;
            };
            if let Err(e) = sink.write_line(line).await {
                tracing::warn!(
                    source = %self.name,
                    filter = installed.filter.name(),
                    error = %e,
                    "filter sink write failed, disabling sink"
                );
                installed.sink = None;
            }
        }

        if let Some(raw) = self.raw.as_mut() {
            if let Err(e) = raw.write_line(line).await {
                tracing::warn!(source = %self.name, error = %e, "raw sink write failed, disabling sink");
                self.raw = None;
            }
        }
    }

    async fn finish(self, stop: StopReason) -> TailerStats {
        let Self {
            name,
            raw,
            filters,
            lines,
            ..
        } = self;

        let mut filter_matches = Vec::with_capacity(filters.len());
        for installed in filters {
            filter_matches.push((installed.filter.name().to_owned(), installed.matches));
            if let Some(sink) = installed.sink {
                close_sink(&name, sink).await;
            }
        }
        if let Some(raw) = raw {
            close_sink(&name, raw).await;
        }

        tracing::info!(source = %name, lines, stop = %stop, "tailer stopped");
        TailerStats {
            source: name,
            lines,
            filter_matches,
            stop,
        }
    }
}

async fn close_sink(source: &str, sink: OutputSink) {
    let path = sink.path().to_path_buf();
    if let Err(e) = sink.close().await {
        tracing::warn!(source, path = %path.display(), error = %e, "failed to close sink");
    }
}

/// 줄바꿈을 떼고, UTF-8이 아닌 바이트는 대체 문자로 바꿉니다.
fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end])
}

/// 조각 끝에 걸친 불완전한 UTF-8 시퀀스를 떼어 반환합니다. 다음 조각 앞에 붙입니다.
fn split_incomplete_utf8(buf: &mut Vec<u8>) -> Vec<u8> {
    match std::str::from_utf8(buf) {
        Err(e) if e.error_len().is_none() => buf.split_off(e.valid_up_to()),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 특정 부분 문자열을 포함하는 라인에 매칭
    struct ContainsFilter {
        name: &'static str,
        needle: &'static str,
        calls: AtomicUsize,
    }

    impl ContainsFilter {
        fn new(name: &'static str, needle: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                needle,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl LineFilter for ContainsFilter {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(&self, line: &str) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            line.contains(self.needle)
        }
    }

    fn read(dir: &Path, file: &str) -> String {
        std::fs::read_to_string(dir.join(file)).unwrap()
    }

    #[test]
    fn decode_line_strips_terminators() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"hello"), "hello");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"a\xffb\n"), "a\u{fffd}b");
    }

    #[test]
    fn split_incomplete_utf8_keeps_only_trailing_partial_sequence() {
        let mut buf = "ab가".as_bytes()[..4].to_vec();
        assert_eq!(split_incomplete_utf8(&mut buf), "가".as_bytes()[..2].to_vec());
        assert_eq!(buf, b"ab");

        let mut buf = b"a\xffb".to_vec();
        assert!(split_incomplete_utf8(&mut buf).is_empty());
        assert_eq!(buf, b"a\xffb");
    }

    #[tokio::test]
    async fn routes_lines_to_raw_and_matching_filters() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("logcat", dir.path(), TailerConfig::default())
            .await
            .unwrap();
        let errors = ContainsFilter::new("errors", "E/");
        let audit = ContainsFilter::new("audit", "avc");
        assert!(tailer.install_filter(errors.clone()).await);
        assert!(tailer.install_filter(audit.clone()).await);

        let input: &[u8] = b"I/boot start\nE/vold avc denied\nE/init failure\nD/misc\n";
        let stats = tailer.run(input, CancellationToken::new()).await;

        assert_eq!(stats.source, "logcat");
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.stop, StopReason::Exhausted);
        assert_eq!(
            stats.filter_matches,
            vec![("errors".to_owned(), 2), ("audit".to_owned(), 1)]
        );
        assert_eq!(errors.calls.load(Ordering::Relaxed), 4);
        assert_eq!(audit.calls.load(Ordering::Relaxed), 4);

        assert_eq!(
            read(dir.path(), "logcat.txt"),
            "I/boot start\nE/vold avc denied\nE/init failure\nD/misc\n"
        );
        assert_eq!(
            read(dir.path(), "errors.logcat.txt"),
            "E/vold avc denied\nE/init failure\n"
        );
        assert_eq!(read(dir.path(), "audit.logcat.txt"), "E/vold avc denied\n");
    }

    #[tokio::test]
    async fn filter_without_matches_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("dmesg", dir.path(), TailerConfig::default())
            .await
            .unwrap();
        tailer
            .install_filter(ContainsFilter::new("never", "zzz"))
            .await;
        assert!(dir.path().join("never.dmesg.txt").exists());

        let input: &[u8] = b"line one\nline two\n";
        tailer.run(input, CancellationToken::new()).await;

        assert!(!dir.path().join("never.dmesg.txt").exists());
        assert!(dir.path().join("dmesg.txt").exists());
    }

    #[tokio::test]
    async fn empty_source_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("dmesg", dir.path(), TailerConfig::default())
            .await
            .unwrap();

        let stats = tailer.run(&b""[..], CancellationToken::new()).await;

        assert_eq!(stats.lines, 0);
        assert!(!dir.path().join("dmesg.txt").exists());
    }

    #[tokio::test]
    async fn filter_with_unopenable_sink_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("logcat", dir.path(), TailerConfig::default())
            .await
            .unwrap();

        // 파일 이름에 디렉토리 구분자가 들어가 생성 실패
        let bad = ContainsFilter::new("missing/dir", "x");
        assert!(!tailer.install_filter(bad.clone()).await);
        assert_eq!(tailer.filter_names().count(), 0);

        let input: &[u8] = b"x\n";
        let stats = tailer.run(input, CancellationToken::new()).await;
        assert!(stats.filter_matches.is_empty());
        assert_eq!(bad.calls.load(Ordering::Relaxed), 0);
        assert_eq!(read(dir.path(), "logcat.txt"), "x\n");
    }

    #[tokio::test]
    async fn closing_unused_tailer_removes_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("dmesg", dir.path(), TailerConfig::default())
            .await
            .unwrap();
        tailer.install_filter(ContainsFilter::new("avc", "avc")).await;
        assert!(dir.path().join("dmesg.txt").exists());
        assert!(dir.path().join("avc.dmesg.txt").exists());

        tailer.close().await;

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn raw_sink_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Tailer::create("logcat", dir.path().join("gone"), TailerConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LogPipelineError::Sink { .. }));
    }

    fn small_limit(limit: usize) -> TailerConfig {
        TailerConfig {
            max_line_length: limit,
            ..TailerConfig::default()
        }
    }

    #[tokio::test]
    async fn long_input_is_split_into_chunks_without_loss() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("logcat", dir.path(), small_limit(5))
            .await
            .unwrap();

        let input: &[u8] = b"0123456789ab\nabc\n";
        let stats = tailer.run(input, CancellationToken::new()).await;

        assert_eq!(stats.lines, 4);
        assert_eq!(read(dir.path(), "logcat.txt"), "01234\n56789\nab\nabc\n");
    }

    #[tokio::test]
    async fn line_ending_at_limit_adds_no_empty_line() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("logcat", dir.path(), small_limit(5))
            .await
            .unwrap();

        let input: &[u8] = b"01234\n\nab\r\n";
        let stats = tailer.run(input, CancellationToken::new()).await;

        // 두 번째 줄바꿈은 실제 빈 라인
        assert_eq!(stats.lines, 3);
        assert_eq!(read(dir.path(), "logcat.txt"), "01234\n\nab\n");
    }

    #[tokio::test]
    async fn chunk_boundary_does_not_split_multibyte_characters() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("logcat", dir.path(), small_limit(4))
            .await
            .unwrap();

        let input = "ab가c\n".as_bytes();
        tailer.run(input, CancellationToken::new()).await;

        assert_eq!(read(dir.path(), "logcat.txt"), "ab\n가c\n");
    }

    #[tokio::test]
    async fn long_denial_line_is_collected_and_captured_whole() {
        use crate::filter::{AvcFilter, DenialCollection};

        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("logcat", dir.path(), TailerConfig::default())
            .await
            .unwrap();
        let collection = Arc::new(DenialCollection::new());
        let avc = AvcFilter::new("untrusted_app", Arc::clone(&collection)).unwrap();
        assert!(tailer.install_filter(Arc::new(avc)).await);

        // 예전 4096 바이트 상한을 넘는 name 속성
        let line = format!(
            "avc: denied {{ read }} for name=\"{}\" scontext=u:r:mydomain:s0 tcontext=u:object_r:vendor_data_file:s0 tclass=file permissive=0",
            "x".repeat(4100)
        );
        assert!(line.len() > 4096);
        let input = format!("{line}\n");

        let stats = tailer
            .run(input.as_bytes(), CancellationToken::new())
            .await;

        assert_eq!(stats.lines, 1);
        assert_eq!(stats.filter_matches, vec![("avc".to_owned(), 1)]);
        assert_eq!(read(dir.path(), "logcat.txt"), input);
        assert_eq!(read(dir.path(), "avc.logcat.txt"), input);

        let records = collection.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_class, "file");
    }

    #[tokio::test]
    async fn trailing_partial_character_at_eof_is_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("dmesg", dir.path(), small_limit(4))
            .await
            .unwrap();

        // 줄바꿈 없이 끝나는 잘린 문자
        let input: &[u8] = b"abc\xea\xb0";
        let stats = tailer.run(input, CancellationToken::new()).await;

        assert_eq!(stats.stop, StopReason::Exhausted);
        assert_eq!(stats.lines, 2);
        assert_eq!(read(dir.path(), "dmesg.txt"), "abc\n\u{fffd}\n");
    }

    #[tokio::test]
    async fn cancellation_interrupts_blocked_read() {
        let dir = tempfile::tempdir().unwrap();
        let tailer = Tailer::create("dmesg", dir.path(), TailerConfig::default())
            .await
            .unwrap();

        // 쓰기 쪽을 열어둔 채로 두면 리더는 영원히 대기
        let (writer, reader) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(reader);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(tailer.run(reader, cancel.clone()));
        tokio::task::yield_now().await;
        cancel.cancel();

        let stats = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.stop, StopReason::Cancelled);
        assert_eq!(stats.lines, 0);
        drop(writer);
    }

    #[tokio::test]
    async fn lines_before_cancel_are_kept() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let mut tailer = Tailer::create("logcat", dir.path(), TailerConfig::default())
            .await
            .unwrap();
        let early = ContainsFilter::new("early", "early");
        tailer.install_filter(early.clone()).await;

        let (mut writer, reader) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tailer.run(tokio::io::BufReader::new(reader), cancel.clone()));

        writer.write_all(b"early line\n").await.unwrap();
        // 필터가 라인을 볼 때까지 대기
        while early.calls.load(Ordering::Relaxed) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.stop, StopReason::Cancelled);
        assert_eq!(stats.lines, 1);
        assert_eq!(read(dir.path(), "logcat.txt"), "early line\n");
        assert_eq!(read(dir.path(), "early.logcat.txt"), "early line\n");
        drop(writer);
    }
}
