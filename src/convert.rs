//! Conversion entry points: the pipeline orchestrator.
//!
//! Stages run strictly one after another: extract → prompt → generate →
//! parse. There is no partial recovery and no caching; every call extracts
//! again and pays for a fresh model request. Any stage failure is logged
//! once here and returned as [`Cf2LcError::ConversionFailed`], whose message
//! reads `Failed to convert problem: {cause}`.

use crate::config::ConversionConfig;
use crate::error::{Cf2LcError, StageError};
use crate::output::{ExportFormat, ProblemRecord, RawProblemText};
use crate::pipeline::llm::{generate_with_retry, GeminiClient, GenerationBackend};
use crate::pipeline::page::{is_url, FilePage, HostPage, RemotePage, StaticPage};
use crate::pipeline::{extract, parse};
use crate::progress::PipelineStage;
use crate::prompts::build_prompt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

/// Convert the problem shown on `page` into a [`ProblemRecord`].
///
/// # Errors
/// - [`Cf2LcError::MissingCredential`] — no API key and no backend configured
/// - [`Cf2LcError::EmptyInput`] — the page has no problem statement
/// - [`Cf2LcError::ConversionFailed`] — any stage failed, or the deadline expired
pub async fn convert(
    page: &dyn HostPage,
    config: &ConversionConfig,
) -> Result<ProblemRecord, Cf2LcError> {
    with_deadline(config, async {
        let total_start = Instant::now();
        let backend = resolve_backend(config)?;

        let text = run_extract(page, config).await?;
        let record = run_transform(backend.as_ref(), &text, config).await?;

        info!(
            "Conversion complete in {}ms",
            total_start.elapsed().as_millis()
        );
        Ok::<_, Cf2LcError>(record)
    })
    .await
}

/// Convert already-extracted problem text.
pub async fn convert_text(
    text: &RawProblemText,
    config: &ConversionConfig,
) -> Result<ProblemRecord, Cf2LcError> {
    with_deadline(config, async {
        let backend = resolve_backend(config)?;
        run_transform(backend.as_ref(), text, config).await
    })
    .await
}

/// Convert a problem page whose HTML is already in memory.
pub async fn convert_html(
    html: impl Into<String>,
    config: &ConversionConfig,
) -> Result<ProblemRecord, Cf2LcError> {
    convert(&StaticPage::new(html), config).await
}

/// Run only the extraction stage.
///
/// Does not require an API key. An empty result means the page had no
/// problem statement; checking for it is left to the caller.
pub async fn extract_text(
    page: &dyn HostPage,
    config: &ConversionConfig,
) -> Result<RawProblemText, Cf2LcError> {
    run_extract(page, config).await
}

/// Convert and write the record to `output_path`.
///
/// If `output_path` is an existing directory the record's
/// [`ProblemRecord::export_file_name`] is used inside it. The format follows
/// the extension (see [`ExportFormat::from_path`]). Uses atomic write
/// (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    page: &dyn HostPage,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<(ProblemRecord, PathBuf), Cf2LcError> {
    let record = convert(page, config).await?;
    let path = write_record(&record, output_path.as_ref(), None).await?;
    Ok((record, path))
}

/// Write a record to disk atomically, returning the final path.
///
/// `format` overrides the extension-based choice. When `output_path` is a
/// directory the export file name is used, with a `.md` extension for
/// Markdown.
pub async fn write_record(
    record: &ProblemRecord,
    output_path: &Path,
    format: Option<ExportFormat>,
) -> Result<PathBuf, Cf2LcError> {
    let is_dir = tokio::fs::metadata(output_path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let (path, format) = if is_dir {
        let format = format.unwrap_or_default();
        let mut path = output_path.join(record.export_file_name());
        if format == ExportFormat::Markdown {
            path.set_extension("md");
        }
        (path, format)
    } else {
        let path = output_path.to_path_buf();
        let format = format.unwrap_or_else(|| ExportFormat::from_path(&path));
        (path, format)
    };

    let contents = format
        .render(record)
        .map_err(|e| Cf2LcError::Internal(format!("Failed to serialise record: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Cf2LcError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
    }

    let tmp_path = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.tmp")),
        None => path.with_extension("tmp"),
    };
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Cf2LcError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| Cf2LcError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    debug!("Wrote {:?} record to {}", format, path.display());
    Ok(path)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    page: &dyn HostPage,
    config: &ConversionConfig,
) -> Result<ProblemRecord, Cf2LcError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Cf2LcError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(page, config))
}

/// Pick the host-page adapter for a user-supplied input: URL or saved HTML file.
pub fn page_for_input(input: &str, config: &ConversionConfig) -> Box<dyn HostPage> {
    if is_url(input) {
        Box::new(RemotePage::new(input, config.page_timeout_secs))
    } else {
        Box::new(FilePage::new(input))
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Log a stage failure once and wrap it for the caller.
fn fail(cause: StageError) -> Cf2LcError {
    error!("Error converting problem: {}", cause);
    Cf2LcError::ConversionFailed { cause }
}

/// Resolve the generation backend: a pre-built one wins, otherwise a
/// [`GeminiClient`] built from the configured credential.
fn resolve_backend(config: &ConversionConfig) -> Result<Arc<dyn GenerationBackend>, Cf2LcError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    Ok(Arc::new(GeminiClient::new(config)?))
}

/// Apply the optional whole-run deadline and fire the completion callback.
async fn with_deadline<F>(config: &ConversionConfig, fut: F) -> Result<ProblemRecord, Cf2LcError>
where
    F: Future<Output = Result<ProblemRecord, Cf2LcError>>,
{
    let result = match config.deadline_secs {
        Some(secs) => match timeout(Duration::from_secs(secs), fut).await {
            Ok(r) => r,
            Err(_) => Err(fail(StageError::UpstreamTimeout { secs })),
        },
        None => fut.await,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(result.is_ok());
    }
    result
}

fn stage_start(config: &ConversionConfig, stage: PipelineStage) -> Instant {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    Instant::now()
}

fn stage_complete(config: &ConversionConfig, stage: PipelineStage, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    debug!("Stage {} finished in {}ms", stage, elapsed_ms);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, elapsed_ms);
    }
}

async fn run_extract(
    page: &dyn HostPage,
    config: &ConversionConfig,
) -> Result<RawProblemText, Cf2LcError> {
    let started = stage_start(config, PipelineStage::Extract);
    let text = extract::extract(page).await.map_err(fail)?;
    stage_complete(config, PipelineStage::Extract, started);
    Ok(text)
}

async fn run_transform(
    backend: &dyn GenerationBackend,
    text: &RawProblemText,
    config: &ConversionConfig,
) -> Result<ProblemRecord, Cf2LcError> {
    if text.is_empty() {
        return Err(Cf2LcError::EmptyInput);
    }

    // ── Step 1: Build prompt ─────────────────────────────────────────────
    let started = stage_start(config, PipelineStage::Prompt);
    let prompt = build_prompt(text, config.prompt_template.as_deref());
    debug!("Prompt is {} chars", prompt.len());
    stage_complete(config, PipelineStage::Prompt, started);

    // ── Step 2: Call the model ───────────────────────────────────────────
    let started = stage_start(config, PipelineStage::Generate);
    let raw = generate_with_retry(backend, &prompt, config)
        .await
        .map_err(fail)?;
    stage_complete(config, PipelineStage::Generate, started);

    // ── Step 3: Parse and validate ───────────────────────────────────────
    let started = stage_start(config, PipelineStage::Parse);
    let record = parse::parse_response(&raw).map_err(fail)?;
    stage_complete(config, PipelineStage::Parse, started);

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const RECORD_JSON: &str = r#"{"title":"T","difficulty":"Hard","description":"D","functionSignature":"class Solution {};","constraints":[],"examples":[],"testCaseFormat":""}"#;

    struct FixedBackend(String);

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, StageError> {
            Ok(self.0.clone())
        }
    }

    struct PromptCapture(Mutex<Option<String>>);

    #[async_trait]
    impl GenerationBackend for PromptCapture {
        async fn generate(&self, prompt: &str) -> Result<String, StageError> {
            *self.0.lock().unwrap() = Some(prompt.to_string());
            Ok(RECORD_JSON.to_string())
        }
    }

    #[derive(Default)]
    struct StageLog(Mutex<Vec<String>>);

    impl ConversionProgressCallback for StageLog {
        fn on_stage_start(&self, stage: PipelineStage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }
        fn on_stage_complete(&self, stage: PipelineStage, _elapsed_ms: u64) {
            self.0.lock().unwrap().push(format!("done:{stage}"));
        }
        fn on_conversion_complete(&self, success: bool) {
            self.0.lock().unwrap().push(format!("complete:{success}"));
        }
    }

    fn config_with(backend: Arc<dyn GenerationBackend>) -> ConversionConfig {
        ConversionConfig::builder().backend(backend).build().unwrap()
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_call() {
        let capture = Arc::new(PromptCapture(Mutex::new(None)));
        let config = config_with(capture.clone());
        let err = convert_text(&RawProblemText::default(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Cf2LcError::EmptyInput));
        assert!(capture.0.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn page_without_statement_is_empty_input() {
        let config = config_with(Arc::new(FixedBackend(RECORD_JSON.into())));
        let err = convert_html("<p>nothing</p>", &config).await.unwrap_err();
        assert!(matches!(err, Cf2LcError::EmptyInput));
    }

    #[tokio::test]
    async fn prompt_embeds_extracted_text() {
        let capture = Arc::new(PromptCapture(Mutex::new(None)));
        let config = config_with(capture.clone());
        let html = r#"<div class="problem-statement"><div class="title">A. Unique Title 42</div></div>"#;
        let rec = convert_html(html, &config).await.unwrap();
        assert_eq!(rec.title, "T");
        let prompt = capture.0.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("A. Unique Title 42"));
    }

    #[tokio::test]
    async fn stage_failure_is_wrapped() {
        let config = config_with(Arc::new(FixedBackend("no json here".into())));
        let err = convert_text(&RawProblemText::from("A+B"), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to convert problem: "));
        assert!(matches!(
            err.stage_error(),
            Some(StageError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn missing_credential_fails_fast() {
        let config = ConversionConfig::default();
        let err = convert_text(&RawProblemText::from("A+B"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Cf2LcError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let log = Arc::new(StageLog::default());
        let config = ConversionConfig::builder()
            .backend(Arc::new(FixedBackend(RECORD_JSON.into())))
            .progress_callback(log.clone())
            .build()
            .unwrap();
        convert_html(
            r#"<div class="problem-statement"><div class="title">X</div></div>"#,
            &config,
        )
        .await
        .unwrap();

        let events = log.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:extract",
                "done:extract",
                "start:prompt",
                "done:prompt",
                "start:generate",
                "done:generate",
                "start:parse",
                "done:parse",
                "complete:true",
            ]
        );
    }

    #[tokio::test]
    async fn write_record_into_directory_uses_export_name() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse::parse_response(RECORD_JSON).unwrap();
        let path = write_record(&record, dir.path(), None).await.unwrap();
        assert_eq!(path, dir.path().join("T_LC_Format.json"));
        let written: ProblemRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, record);
        assert!(!dir.path().join("T_LC_Format.json.tmp").exists());
    }

    #[tokio::test]
    async fn write_record_markdown_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse::parse_response(RECORD_JSON).unwrap();
        let path = write_record(&record, &dir.path().join("out/problem.md"), None)
            .await
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("# T\n"));
    }

    #[tokio::test]
    async fn explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse::parse_response(RECORD_JSON).unwrap();

        let path = write_record(&record, &dir.path().join("x.txt"), Some(ExportFormat::Markdown))
            .await
            .unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("# T"));

        let path = write_record(&record, dir.path(), Some(ExportFormat::Markdown))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("T_LC_Format.md"));
    }

    #[tokio::test]
    async fn temp_file_keeps_the_output_extension() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse::parse_response(RECORD_JSON).unwrap();

        let path = write_record(&record, &dir.path().join("out.tmp"), None)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("out.tmp"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"title\": \"T\""));
        assert!(!dir.path().join("out.tmp.tmp").exists());

        write_record(&record, &dir.path().join("x.json"), None).await.unwrap();
        write_record(&record, &dir.path().join("x.md"), None).await.unwrap();
        assert!(std::fs::read_to_string(dir.path().join("x.json")).unwrap().starts_with('{'));
        assert!(std::fs::read_to_string(dir.path().join("x.md")).unwrap().starts_with("# T"));
    }

    #[test]
    fn convert_sync_runs_outside_a_runtime() {
        let config = config_with(Arc::new(FixedBackend(format!("```json\n{RECORD_JSON}\n```"))));
        let page = StaticPage::new(r#"<div class="problem-statement"><div class="title">X</div></div>"#);
        let rec = convert_sync(&page, &config).unwrap();
        assert_eq!(rec.difficulty.as_str(), "Hard");
    }

    #[test]
    fn write_record_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let record = parse::parse_response(RECORD_JSON).unwrap();

        let err = tokio_test::block_on(write_record(&record, &blocker.join("out.json"), None))
            .unwrap_err();
        assert!(matches!(err, Cf2LcError::OutputWriteFailed { .. }));
    }

    #[test]
    fn page_for_input_picks_adapter() {
        let config = ConversionConfig::default();
        assert!(page_for_input("https://codeforces.com/problemset/problem/4/A", &config)
            .origin()
            .starts_with("https://"));
        assert_eq!(page_for_input("saved.html", &config).origin(), "saved.html");
    }
}
