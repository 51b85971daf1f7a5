//! 라인 단위 출력 싱크
//!
//! 소스 원본(`<name>.txt`)과 필터 결과(`<filter>.<name>.txt`)를 파일로 기록합니다.
//! 쓰기는 버퍼링되며, 마지막 flush 이후 누적 바이트가 임계값을 넘으면 flush합니다.
//! [`OutputSink::close`] 시점에 파일이 비어 있으면 삭제합니다.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::LogPipelineError;

/// 싱크 기본 flush 임계값 (바이트)
pub const DEFAULT_FLUSH_THRESHOLD: usize = 4096;

/// 파일 하나에 라인을 추가하는 싱크
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    writer: BufWriter<File>,
    /// 마지막 flush 이후 기록한 바이트
    pending: usize,
    flush_threshold: usize,
    lines: u64,
}

impl OutputSink {
    /// 출력 파일 이름을 만듭니다.
    ///
    /// 필터가 있으면 `<filter>.<name>.txt`, 없으면 `<name>.txt`.
    pub fn file_name(name: &str, filter: Option<&str>) -> String {
        match filter {
            Some(filter) => format!("{filter}.{name}.txt"),
            None => format!("{name}.txt"),
        }
    }

    /// `dir` 아래에 싱크 파일을 생성합니다. 기존 파일은 덮어씁니다.
    pub async fn create(
        dir: &Path,
        name: &str,
        filter: Option<&str>,
        flush_threshold: usize,
    ) -> Result<Self, LogPipelineError> {
        let path = dir.join(Self::file_name(name, filter));
        let file = File::create(&path)
            .await
            .map_err(|source| LogPipelineError::Sink {
                path: path.clone(),
                source,
            })?;

        tracing::info!(
            path = %path.display(),
            filter = filter.unwrap_or("-"),
            "opened output sink"
        );

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            pending: 0,
            flush_threshold,
            lines: 0,
        })
    }

    /// 라인 하나를 기록합니다. 줄바꿈은 싱크가 붙입니다.
    pub async fn write_line(&mut self, line: &str) -> Result<(), LogPipelineError> {
        self.write_all(line.as_bytes()).await?;
        self.write_all(b"\n").await?;
        self.lines += 1;

        self.pending += line.len() + 1;
        if self.pending > self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// 여러 줄로 된 본문을 그대로 기록합니다.
    pub async fn write_text(&mut self, text: &str) -> Result<(), LogPipelineError> {
        self.write_all(text.as_bytes()).await?;
        self.lines += text.lines().count() as u64;
        self.flush().await
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), LogPipelineError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|source| LogPipelineError::Sink {
                path: self.path.clone(),
                source,
            })
    }

    async fn flush(&mut self) -> Result<(), LogPipelineError> {
        self.pending = 0;
        self.writer
            .flush()
            .await
            .map_err(|source| LogPipelineError::Sink {
                path: self.path.clone(),
                source,
            })
    }

    /// 싱크 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 지금까지 기록한 라인 수
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// 버퍼를 비우고 파일을 닫습니다.
    ///
    /// 파일이 비어 있으면 삭제하고 `false`를, 남겨두면 `true`를 반환합니다.
    pub async fn close(mut self) -> Result<bool, LogPipelineError> {
        self.flush().await?;
        let Self { path, writer, .. } = self;
        let mut file = writer.into_inner();
        file.shutdown()
            .await
            .map_err(|source| LogPipelineError::Sink {
                path: path.clone(),
                source,
            })?;
        drop(file);

        let len = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(1);
        if len == 0 {
            tracing::debug!(path = %path.display(), "deleting empty output file");
            fs::remove_file(&path)
                .await
                .map_err(|source| LogPipelineError::Sink {
                    path: path.clone(),
                    source,
                })?;
            return Ok(false);
        }
        Ok(true)
    }
}
