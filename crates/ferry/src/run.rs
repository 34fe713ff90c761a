use std::path::Path;

use anyhow::{Context, Result, bail};
use ferry_transfer::{
    DownloadRequest, HttpClient, ReqwestClient, TransferCallbacks, TransferFailure,
    TransferOutcome, TransferService, UploadRequest,
};
use indicatif::{HumanBytes, MultiProgress};
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::cli::{GetArg, PutArg};
use crate::config::AppConfig;
use crate::tracker::TransferTracker;

type Report = std::result::Result<TransferOutcome, TransferFailure>;

#[derive(Debug, Default)]
struct Summary {
    succeeded: Vec<TransferOutcome>,
    failed:    Vec<TransferFailure>,
    rejected:  usize,
}

impl Summary {
    fn ensure_success(&self) -> Result<()> {
        let failed = self.failed.len() + self.rejected;
        if failed > 0 {
            bail!(
                "{failed} of {} transfers failed",
                failed + self.succeeded.len()
            );
        }
        Ok(())
    }
}

fn service(config: &AppConfig) -> Result<TransferService<ReqwestClient>> {
    let client = ReqwestClient::with_config(&config.http).context("failed to build HTTP client")?;
    Ok(TransferService::with_config(client, config.transfer.clone()))
}

pub async fn get(config: &AppConfig, arg: GetArg) -> Result<()> {
    let service = service(config)?;
    let multi = MultiProgress::new();
    let (reports, receiver) = mpsc::unbounded_channel();

    let mut submitted = 0;
    let mut summary = Summary::default();
    for url in arg.urls {
        let name = file_name_for(&url);
        let tracker = TransferTracker::new(&multi, name.as_str());
        let request = DownloadRequest::new(url.as_str(), arg.dir.join(&name))
            .headers(arg.headers.iter().cloned())
            .immediate(arg.immediate)
            .callbacks(callbacks(&tracker, &reports));
        match service.submit_download(request) {
            Ok(id) => {
                info!(%id, %url, "download submitted");
                submitted += 1;
            }
            Err(err) => {
                warn!(%url, error = %err, "download rejected");
                tracker.fail(err.to_string());
                summary.rejected += 1;
            }
        }
    }
    drop(reports);

    wait_for(&service, receiver, submitted, &mut summary).await;
    summary.ensure_success()
}

pub async fn put(config: &AppConfig, arg: PutArg) -> Result<()> {
    let service = service(config)?;
    let multi = MultiProgress::new();
    let (reports, receiver) = mpsc::unbounded_channel();

    let label = label_for(&arg.file);
    let tracker = TransferTracker::new(&multi, label);
    let mut request = UploadRequest::new(&arg.file, arg.url)
        .field_name(arg.field)
        .mime_type(arg.mime)
        .callbacks(callbacks(&tracker, &reports));
    if let Some(name) = arg.name {
        request = request.file_name(name);
    }
    for (key, value) in arg.headers {
        request = request.header(key, value);
    }
    service.submit_upload(request)?;
    drop(reports);

    let mut summary = Summary::default();
    wait_for(&service, receiver, 1, &mut summary).await;
    for outcome in &summary.succeeded {
        if let Some(body) = outcome.response.as_deref().filter(|b| !b.is_empty()) {
            println!("{body}");
        }
    }
    summary.ensure_success()
}

fn callbacks(tracker: &TransferTracker, reports: &mpsc::UnboundedSender<Report>) -> TransferCallbacks {
    let progress = tracker.clone();
    let finished = tracker.clone();
    let failed = tracker.clone();
    let on_success = reports.clone();
    let on_error = reports.clone();
    TransferCallbacks::new()
        .on_progress(move |bytes, total| progress.update(bytes, total))
        .on_success(move |outcome| {
            finished.finish(format!(
                "done, {}/s",
                HumanBytes((outcome.average_speed * 1_000.0) as u64)
            ));
            let _ = on_success.send(Ok(outcome));
        })
        .on_error(move |failure| {
            failed.fail(format!("failed: {}", failure.message));
            let _ = on_error.send(Err(failure));
        })
}

/// Collect `expected` terminal reports. The first Ctrl-C aborts everything in
/// flight; the aborted transfers still report back.
async fn wait_for<C: HttpClient>(
    service: &TransferService<C>,
    mut receiver: mpsc::UnboundedReceiver<Report>,
    expected: usize,
    summary: &mut Summary,
) {
    let mut received = 0;
    let mut interrupted = false;
    while received < expected {
        tokio::select! {
            report = receiver.recv() => match report {
                Some(Ok(outcome)) => {
                    received += 1;
                    summary.succeeded.push(outcome);
                }
                Some(Err(failure)) => {
                    received += 1;
                    summary.failed.push(failure);
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        let count = service.abort_all();
                        warn!(count, "interrupted, aborting transfers");
                    }
                    Err(err) => warn!(error = %err, "failed to listen for Ctrl-C"),
                }
            }
        }
    }
}

/// Last path segment of `url`, or `index.html` for directory-like URLs.
fn file_name_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| url.path_segments().and_then(|s| s.last()).map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "index.html".to_string())
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
