//! Transcription transport: one streaming request per run
//!
//! Submits the media payload as a multipart upload and consumes the NDJSON
//! response body chunk by chunk, feeding a fresh [`StreamDecoder`] and
//! applying every outcome to the engine under the run's identity. The
//! response body is exclusively owned here and dropped, closing the
//! connection, on completion, failure, and supersession alike.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};

use crate::config::EngineConfig;
use crate::decoder::StreamDecoder;
use crate::engine::{CaptionEngine, RunId};
use crate::error::{CaptionError, Result};

/// Media payload submitted for transcription
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl MediaUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Content type inferred from the file extension. The service accepts
    /// mp3, mp4 and wav uploads.
    pub fn content_type(&self) -> &'static str {
        match Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some("mp3") => "audio/mpeg",
            Some("mp4") => "video/mp4",
            Some("wav") => "audio/wav",
            _ => "application/octet-stream",
        }
    }
}

/// Outcome of a transcription run that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Clean end of stream
    Completed { segments: usize, warnings: u32 },
    /// A newer run took over before this one finished
    Superseded,
}

/// HTTP client for the transcription service
#[derive(Clone)]
pub struct TranscribeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TranscribeClient {
    /// Build a client from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Run one full transcription: upload the media, stream the response
    /// into the engine, and settle the run's final phase.
    ///
    /// Transport failures mark the run `Failed` and propagate. Per-line
    /// parse failures are counted on the engine and never abort the stream.
    /// No retries: a new attempt requires a new call.
    pub async fn transcribe(
        &self,
        engine: &CaptionEngine,
        upload: MediaUpload,
        target_lang: Option<&str>,
    ) -> Result<RunOutcome> {
        let run = engine.begin_run();
        match self.stream_into(engine, run, upload, target_lang).await {
            Ok(()) => {
                if engine.complete_run(run) {
                    Ok(RunOutcome::Completed {
                        segments: engine.segment_count(),
                        warnings: engine.warnings(),
                    })
                } else {
                    Ok(RunOutcome::Superseded)
                }
            }
            Err(err) => {
                if engine.fail_run(run, &err) {
                    Err(err)
                } else {
                    // A newer run took over; this run's failure is moot
                    tracing::debug!("ignoring error from superseded run {run}: {err}");
                    Ok(RunOutcome::Superseded)
                }
            }
        }
    }

    async fn stream_into(
        &self,
        engine: &CaptionEngine,
        run: RunId,
        upload: MediaUpload,
        target_lang: Option<&str>,
    ) -> Result<()> {
        tracing::info!(
            "submitting {} ({} bytes) to {}",
            upload.file_name,
            upload.bytes.len(),
            self.endpoint
        );

        let content_type = upload.content_type();
        let mut form = Form::new().part(
            "file",
            Part::stream(reqwest::Body::from(upload.bytes))
                .file_name(upload.file_name)
                .mime_str(content_type)?,
        );
        // An absent or empty code means no translation was requested
        if let Some(lang) = target_lang.filter(|lang| !lang.is_empty()) {
            form = form.text("target_lang", lang.to_string());
        }

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptionError::Status(status));
        }

        let mut decoder = StreamDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            tracing::trace!("received {}-byte chunk", chunk.len());
            for outcome in decoder.feed(&chunk) {
                engine.apply(run, outcome);
            }
            if !engine.is_current(run) {
                // Dropping the body closes the connection; a superseded run
                // must not keep reading.
                tracing::info!("run {run} superseded mid-stream, closing");
                return Ok(());
            }
        }
        if let Some(outcome) = decoder.finish() {
            engine.apply(run, outcome);
        }
        Ok(())
    }
}
