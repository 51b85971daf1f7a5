//! Capture session orchestration.
//!
//! A [`Session`] runs one capture from start to finish:
//!
//! 1. Audit gate: read the kernel build configuration and decide whether
//!    denial collection is possible.
//! 2. Reset `<LOG_DIR>/<boot|system>`.
//! 3. Build filters and one tailer per source (`dmesg` unless the kernel log
//!    is forwarded into logcat, then `logcat`).
//! 4. Wait for the stop condition: the boot-completed property (plus the
//!    boot-time record and settle delay) in boot mode, the enabled property
//!    flipping to `false` in system mode, SIGINT/SIGTERM, or every source
//!    reaching end of stream.
//! 5. Join every tailer, then merge collected denials and write the rule file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use bootlogger_avc::{MergeSummary, RuleSynthesizer, merge_records};
use bootlogger_core::config::{BootloggerConfig, WaitConfig};
use bootlogger_core::metrics as m;
use bootlogger_core::{BootloggerError, LineFilter, SessionMode};
use bootlogger_log_pipeline::{
    AvcFilter, CapturePipeline, DenialCollection, LogPipelineError, LogSource, OutputSink,
    PropertyFilter, Tailer, TailerConfig, TailerStats,
};

use crate::boot_time::{UPTIME_PATH, record_boot_time};
use crate::outdir::reset_output_dir;
use crate::property::{PropertyReader, wait_for_property};

/// Value of the boot-completed property once boot has finished.
const BOOT_COMPLETED_VALUE: &str = "1";
/// Value of the enabled property that ends a system session.
const SYSTEM_DISABLED_VALUE: &str = "false";

/// What ended the capture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    /// The mode's property condition resolved.
    Property,
    /// SIGINT or SIGTERM.
    Signal(&'static str),
    /// Every source reached end of stream first.
    SourcesExhausted,
}

impl std::fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Property => f.write_str("property"),
            Self::Signal(name) => f.write_str(name),
            Self::SourcesExhausted => f.write_str("sources_exhausted"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub mode: SessionMode,
    pub output_dir: PathBuf,
    /// Whether the audit gate was open (denial filter installed).
    pub audit_available: bool,
    /// Per-source results, sorted by source name.
    pub tailers: Vec<TailerStats>,
    pub stop: StopTrigger,
    /// Denial records collected before merging.
    pub records_collected: usize,
    pub merge: MergeSummary,
    /// Distinct rules written. Zero when the gate was closed.
    pub rules_emitted: usize,
    /// Rule file path, when one was kept.
    pub rules_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// One capture session.
pub struct Session<P: PropertyReader> {
    config: BootloggerConfig,
    mode: SessionMode,
    output_dir: PathBuf,
    properties: Arc<P>,
    uptime_path: PathBuf,
    cancel: CancellationToken,
}

impl<P: PropertyReader> Session<P> {
    /// Prepares a session writing under `<log_root>/<mode subdir>`.
    pub fn new(
        config: BootloggerConfig,
        mode: SessionMode,
        log_root: impl AsRef<Path>,
        properties: Arc<P>,
    ) -> Self {
        let output_dir = log_root.as_ref().join(mode.subdir());
        Self {
            config,
            mode,
            output_dir,
            properties,
            uptime_path: PathBuf::from(UPTIME_PATH),
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the uptime source used for the boot-time record.
    pub fn with_uptime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.uptime_path = path.into();
        self
    }

    /// Token that stops the capture phase when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs the session to completion.
    ///
    /// # Errors
    ///
    /// Fails if the output directory cannot be reset, a mandatory raw sink
    /// cannot be opened, or the rule file cannot be written.
    pub async fn run(self) -> Result<SessionReport> {
        let started = Instant::now();
        tracing::info!(
            mode = self.mode.subdir(),
            output_dir = %self.output_dir.display(),
            "bootlogger session starting"
        );

        let audit_available = self.probe_audit_gate().await;

        reset_output_dir(&self.output_dir)
            .await
            .map_err(BootloggerError::from)
            .context("failed to prepare output directory")?;

        let collection = audit_available.then(|| Arc::new(DenialCollection::new()));
        let avc_filter: Option<Arc<dyn LineFilter>> = match &collection {
            Some(collection) => Some(Arc::new(
                AvcFilter::new(&self.config.audit.excluded_actor, Arc::clone(collection))
                    .map_err(BootloggerError::from)?,
            )),
            None => None,
        };
        let props_filter: Arc<dyn LineFilter> =
            Arc::new(PropertyFilter::new().map_err(BootloggerError::from)?);

        let pipeline = self
            .start_tailers(avc_filter, props_filter)
            .await
            .context("failed to start tailers")?;

        let stopper = tokio::spawn(wait_for_stop(
            Arc::clone(&self.properties),
            self.mode,
            self.config.wait.clone(),
            self.uptime_path.clone(),
            self.cancel.clone(),
        ));

        let joined = pipeline.join().await;
        // Stops the stopper when sources ran out before the condition.
        self.cancel.cancel();
        let stop = stopper.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "stop condition task failed");
            StopTrigger::SourcesExhausted
        });
        let tailers = joined.map_err(BootloggerError::from)?;
        tracing::info!(trigger = %stop, "capture stopped, all tailers joined");

        let mut report = SessionReport {
            mode: self.mode,
            output_dir: self.output_dir.clone(),
            audit_available,
            tailers,
            stop,
            records_collected: 0,
            merge: MergeSummary::default(),
            rules_emitted: 0,
            rules_path: None,
            elapsed: Duration::ZERO,
        };

        if let Some(collection) = collection {
            self.write_rules(&collection, &mut report)
                .await
                .context("failed to write policy rules")?;
        }

        report.elapsed = started.elapsed();
        log_report(&report);
        Ok(report)
    }

    async fn probe_audit_gate(&self) -> bool {
        let path = self.config.audit.kernel_config_path.clone();
        let symbol = self.config.audit.required_symbol.clone();
        let available = tokio::task::spawn_blocking(move || {
            bootlogger_kconfig::audit_available(&path, &symbol)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "kernel config probe task failed");
            false
        });

        if available {
            tracing::debug!(
                symbol = %self.config.audit.required_symbol,
                "audit support detected in kernel configuration"
            );
        } else {
            tracing::info!(
                symbol = %self.config.audit.required_symbol,
                "kernel configuration lacks audit support, denial filter disabled"
            );
        }
        available
    }

    async fn start_tailers(
        &self,
        avc_filter: Option<Arc<dyn LineFilter>>,
        props_filter: Arc<dyn LineFilter>,
    ) -> Result<CapturePipeline, BootloggerError> {
        let tailer_config = TailerConfig {
            max_line_length: self.config.sources.max_line_length,
            flush_threshold: self.config.output.flush_threshold_bytes,
        };
        let mut pipeline = CapturePipeline::new(self.cancel.clone());

        let kernel_forwarded = self
            .properties
            .get_bool(&self.config.sources.kernel_forwarded_property, false)
            .await;

        let mut plan: Vec<(LogSource, Vec<Arc<dyn LineFilter>>)> = Vec::with_capacity(2);
        if kernel_forwarded {
            tracing::info!(
                property = %self.config.sources.kernel_forwarded_property,
                "kernel log forwarded to logcat, skipping kmsg tailer"
            );
        } else {
            plan.push((
                LogSource::kmsg(&self.config.sources.kmsg_path),
                avc_filter.iter().cloned().collect(),
            ));
        }
        let logcat = LogSource::logcat(&self.config.sources.logcat_command)?;
        plan.push((
            logcat,
            avc_filter.into_iter().chain([props_filter]).collect(),
        ));

        let mut streams = Vec::with_capacity(plan.len());
        let mut specs = Vec::with_capacity(plan.len());
        for (source, filters) in plan {
            match source.open().await {
                Ok(stream) => {
                    streams.push(stream);
                    specs.push((source.name().to_owned(), filters));
                }
                Err(e) => {
                    tracing::error!(source = %source, error = %e, "failed to open log source");
                }
            }
        }

        let tailers = create_tailers(&self.output_dir, tailer_config, specs).await?;
        for (tailer, stream) in tailers.into_iter().zip(streams) {
            pipeline.spawn_source(tailer, stream);
        }

        if pipeline.is_empty() {
            tracing::warn!("no log source could be opened");
        }
        Ok(pipeline)
    }

    async fn write_rules(
        &self,
        collection: &DenialCollection,
        report: &mut SessionReport,
    ) -> Result<(), LogPipelineError> {
        let mut records = collection.take();
        report.records_collected = records.len();
        report.merge = merge_records(&mut records);

        let rules = RuleSynthesizer::new(self.config.audit.excluded_permissions.iter().cloned())
            .synthesize(&records);
        report.rules_emitted = rules.len();
        metrics::counter!(m::AVC_RULES_EMITTED_TOTAL).increment(rules.len() as u64);

        let mut sink = OutputSink::create(
            &self.output_dir,
            &self.config.audit.rules_file,
            None,
            self.config.output.flush_threshold_bytes,
        )
        .await?;
        sink.write_text(&rules.to_string()).await?;
        let path = sink.path().to_path_buf();
        if sink.close().await? {
            report.rules_path = Some(path);
        }
        Ok(())
    }
}

/// Creates a tailer with its filters for every `(source, filters)` pair.
///
/// Nothing is spawned here. If any raw sink fails, the tailers created so far
/// are closed so the session leaves no output files behind.
async fn create_tailers(
    dir: &Path,
    config: TailerConfig,
    specs: Vec<(String, Vec<Arc<dyn LineFilter>>)>,
) -> Result<Vec<Tailer>, LogPipelineError> {
    let mut tailers: Vec<Tailer> = Vec::with_capacity(specs.len());
    for (name, filters) in specs {
        let mut tailer = match Tailer::create(name, dir, config).await {
            Ok(tailer) => tailer,
            Err(e) => {
                for created in tailers {
                    created.close().await;
                }
                return Err(e);
            }
        };
        for filter in filters {
            tailer.install_filter(filter).await;
        }
        tailers.push(tailer);
    }
    Ok(tailers)
}

/// Waits for the session's stop condition and raises the stop token.
///
/// Returns [`StopTrigger::SourcesExhausted`] when the token was cancelled
/// by someone else first.
async fn wait_for_stop<P: PropertyReader>(
    properties: Arc<P>,
    mode: SessionMode,
    wait: WaitConfig,
    uptime_path: PathBuf,
    cancel: CancellationToken,
) -> StopTrigger {
    let (property, expected) = match mode {
        SessionMode::Boot => (wait.boot_completed_property.as_str(), BOOT_COMPLETED_VALUE),
        SessionMode::System => (wait.system_enabled_property.as_str(), SYSTEM_DISABLED_VALUE),
    };

    let trigger = tokio::select! {
        met = wait_for_property(properties.as_ref(), property, expected, wait.poll_interval(), &cancel) => {
            if !met {
                return StopTrigger::SourcesExhausted;
            }
            tracing::info!(property, value = expected, "stop condition reached");
            StopTrigger::Property
        }
        signal = shutdown_signal() => {
            tracing::info!(signal, "shutdown signal received");
            cancel.cancel();
            return StopTrigger::Signal(signal);
        }
    };

    if mode == SessionMode::Boot {
        let settle = async {
            record_boot_time(&uptime_path, &wait.kmsg_device).await;
            tokio::time::sleep(wait.boot_settle()).await;
        };
        tokio::select! {
            () = cancel.cancelled() => {}
            () = settle => {}
            signal = shutdown_signal() => {
                tracing::info!(signal, "shutdown signal received during boot settle");
                cancel.cancel();
                return StopTrigger::Signal(signal);
            }
        }
    }

    cancel.cancel();
    trigger
}

/// Resolves on SIGTERM or SIGINT. Pends forever if handlers cannot be installed.
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = signal(SignalKind::terminate())
        .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));
    let (mut sigterm, mut sigint) = match handlers {
        Ok(handlers) => handlers,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

fn log_report(report: &SessionReport) {
    for tailer in &report.tailers {
        tracing::info!(
            source = %tailer.source,
            lines = tailer.lines,
            stop = %tailer.stop,
            filter_matches = ?tailer.filter_matches,
            "tailer summary"
        );
    }
    tracing::info!(
        mode = report.mode.subdir(),
        trigger = %report.stop,
        audit_available = report.audit_available,
        records = report.records_collected,
        merged = report.merge.absorbed,
        survivors = report.merge.survivors,
        rules = report.rules_emitted,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "bootlogger session finished"
    );
}
