//! HTTP transport built on reqwest, with Range-based resume tokens

use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::transport::{ResumeToken, SignalSender, TaskHandle, Transport, TransportSignal};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Everything needed to continue an interrupted transfer. Serialized into
/// the byte blob handed back as a resume token; the engine never looks
/// inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResumeState {
    url: String,
    temp_path: PathBuf,
    offset: u64,
}

struct ActiveTask {
    cancel: CancellationToken,
    // Set by `cancel` before triggering the token, read by the worker on
    // its way out.
    want_resume_token: Arc<AtomicBool>,
}

/// HTTP transport streaming payloads into per-task temp files.
///
/// Interrupted transfers continue with a `Range` request from the recorded
/// offset. No retry loop: a dead transfer surfaces as a recoverable failure
/// and the consumer decides whether to resume.
pub struct HttpTransport {
    client: reqwest::Client,
    temp_root: PathBuf,
    progress_step: u64,
    tasks: Arc<RwLock<HashMap<TaskHandle, ActiveTask>>>,
}

impl HttpTransport {
    pub fn new(config: &TransferConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            temp_root: config.download_root.join(".partial"),
            progress_step: config.progress_step_bytes.max(1),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn spawn_worker(&self, handle: TaskHandle, resume: ResumeState, signals: SignalSender) {
        let cancel = CancellationToken::new();
        let want = Arc::new(AtomicBool::new(false));
        self.tasks.write().insert(
            handle,
            ActiveTask {
                cancel: cancel.clone(),
                want_resume_token: want.clone(),
            },
        );

        let client = self.client.clone();
        let tasks = self.tasks.clone();
        let step = self.progress_step;
        tokio::spawn(async move {
            let outcome = run_download(&client, handle, &resume, step, &cancel, &signals).await;
            tasks.write().remove(&handle);

            let signal = match outcome {
                Ok(DownloadOutcome::Finished) => TransportSignal::Finished {
                    handle,
                    temp_path: resume.temp_path.clone(),
                },
                Ok(DownloadOutcome::Halted { offset }) => {
                    let token = if want.load(Ordering::SeqCst) && offset > 0 {
                        serde_json::to_vec(&ResumeState {
                            url: resume.url.clone(),
                            temp_path: resume.temp_path.clone(),
                            offset,
                        })
                        .ok()
                        .map(ResumeToken::new)
                    } else {
                        None
                    };
                    if token.is_none() {
                        let _ = tokio::fs::remove_file(&resume.temp_path).await;
                    }
                    TransportSignal::Aborted {
                        handle,
                        resume_token: token,
                    }
                }
                Err(err) => {
                    let _ = tokio::fs::remove_file(&resume.temp_path).await;
                    TransportSignal::Failed {
                        handle,
                        detail: err.to_string(),
                        recoverable: err.is_recoverable(),
                    }
                }
            };
            let _ = signals.send(signal);
        });
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, handle: TaskHandle, url: &str, signals: SignalSender) {
        let temp_path = self.temp_root.join(format!("{handle}.part"));
        self.spawn_worker(
            handle,
            ResumeState {
                url: url.to_owned(),
                temp_path,
                offset: 0,
            },
            signals,
        );
    }

    async fn issue_resumable(&self, handle: TaskHandle, token: ResumeToken, signals: SignalSender) {
        match serde_json::from_slice::<ResumeState>(token.as_bytes()) {
            Ok(resume) => self.spawn_worker(handle, resume, signals),
            Err(_) => {
                let _ = signals.send(TransportSignal::Failed {
                    handle,
                    detail: TransferError::BadResumeToken.to_string(),
                    recoverable: false,
                });
            }
        }
    }

    async fn cancel(&self, handle: TaskHandle, want_resume_token: bool) {
        let entry = {
            let tasks = self.tasks.read();
            tasks
                .get(&handle)
                .map(|t| (t.cancel.clone(), t.want_resume_token.clone()))
        };
        if let Some((cancel, want)) = entry {
            want.store(want_resume_token, Ordering::SeqCst);
            cancel.cancel();
        }
    }
}

enum DownloadOutcome {
    Finished,
    Halted { offset: u64 },
}

fn classify(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        TransferError::Timeout(err.to_string())
    } else {
        TransferError::Network(err.to_string())
    }
}

async fn run_download(
    client: &reqwest::Client,
    handle: TaskHandle,
    resume: &ResumeState,
    step: u64,
    cancel: &CancellationToken,
    signals: &SignalSender,
) -> Result<DownloadOutcome> {
    let mut offset = resume.offset;

    if let Some(parent) = resume.temp_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut request = client.get(&resume.url);
    if offset > 0 {
        request = request.header("Range", format!("bytes={offset}-"));
    }

    let response = tokio::select! {
        _ = cancel.cancelled() => return Ok(DownloadOutcome::Halted { offset }),
        result = request.send() => result.map_err(classify)?,
    };

    let status = response.status();
    if offset > 0 && status != reqwest::StatusCode::PARTIAL_CONTENT {
        // Server ignored the range request; start over from zero.
        offset = 0;
    }
    if !status.is_success() {
        return Err(TransferError::network(format!(
            "HTTP {} from {}",
            status, resume.url
        )));
    }

    let bytes_expected = response.content_length().map(|len| len + offset);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&resume.temp_path)
        .await?;
    file.set_len(offset).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut received = offset;
    let mut last_reported = received;
    let mut stream = response.bytes_stream();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                file.flush().await?;
                return Ok(DownloadOutcome::Halted { offset: received });
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    file.write_all(&bytes).await?;
                    received += bytes.len() as u64;
                    if received - last_reported >= step {
                        last_reported = received;
                        let _ = signals.send(TransportSignal::Progress {
                            handle,
                            bytes_received: received,
                            bytes_expected,
                        });
                    }
                }
                Some(Err(err)) => return Err(classify(err)),
                None => break,
            }
        }
    }

    file.flush().await?;
    // The last byte count always reaches observers, step or no step.
    let _ = signals.send(TransportSignal::Progress {
        handle,
        bytes_received: received,
        bytes_expected,
    });
    Ok(DownloadOutcome::Finished)
}
