//! 테일러 그룹 실행
//!
//! 소스마다 테일러 태스크를 하나씩 띄우고, 공유 취소 토큰으로 함께 멈춥니다.
//! [`CapturePipeline::join`]은 모든 태스크가 끝난 뒤에만 반환합니다.

use tokio::io::AsyncBufRead;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::LogPipelineError;
use crate::source::SourceStream;
use crate::tailer::{StopReason, Tailer, TailerStats};

/// 동시에 실행되는 테일러 묶음
pub struct CapturePipeline {
    cancel: CancellationToken,
    tasks: JoinSet<TailerStats>,
}

impl CapturePipeline {
    /// `cancel`이 취소되면 모든 테일러가 멈춥니다.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tasks: JoinSet::new(),
        }
    }

    /// 열린 소스에 테일러를 붙여 실행합니다. 테일러가 끝나면 소스를 정리합니다.
    pub fn spawn_source(&mut self, tailer: Tailer, mut stream: SourceStream) {
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let stats = tailer.run(stream.reader(), cancel).await;
            stream.shutdown().await;
            stats
        });
    }

    /// 임의의 라인 리더에 테일러를 붙여 실행합니다.
    pub fn spawn_reader<R>(&mut self, tailer: Tailer, reader: R)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.tasks.spawn(tailer.run(reader, cancel));
    }

    /// 실행 중인 테일러 수
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 모든 테일러가 소스 끝에 도달하거나 취소될 때까지 기다립니다.
    ///
    /// 결과는 소스 이름 순으로 정렬됩니다. 실패한 태스크가 있으면 나머지를
    /// 모두 기다린 뒤 에러를 반환합니다.
    pub async fn join(mut self) -> Result<Vec<TailerStats>, LogPipelineError> {
        let mut stats = Vec::with_capacity(self.tasks.len());
        let mut failure = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(s) => stats.push(s),
                Err(e) => {
                    tracing::error!(error = %e, "tailer task failed");
                    failure.get_or_insert(LogPipelineError::Join(e.to_string()));
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        stats.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(stats)
    }

    /// 모든 테일러가 소스 끝으로 멈췄는지 여부
    pub fn all_exhausted(stats: &[TailerStats]) -> bool {
        stats.iter().all(|s| s.stop == StopReason::Exhausted)
    }
}
