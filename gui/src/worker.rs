use std::thread;

use crossbeam_channel::Sender;
use engine::{run_pipeline, PipelineRequest, PipelineResult};
use tracing::{error, info};

use crate::progress::{GuiProgressCallback, ProgressUpdate};
use crate::RunSummary;

/// Spawn a background worker thread to execute a pipeline run.
///
/// Progress and the final summary arrive on `sender`; the UI drains the
/// matching receiver on every tick.
pub fn spawn_run(request: PipelineRequest, sender: Sender<ProgressUpdate>) {
    thread::spawn(move || {
        let outcome = execute_run(&request, sender.clone());
        match &outcome {
            Ok(summary) => info!(
                destination = %summary.destination_dir,
                processed = summary.processed_count,
                failed = summary.failed_items.len(),
                "run finished"
            ),
            Err(e) => error!(error = %e, "run failed"),
        }
        let _ = sender.send(ProgressUpdate::RunFinished(outcome));
    });
}

fn execute_run(
    request: &PipelineRequest,
    sender: Sender<ProgressUpdate>,
) -> Result<RunSummary, String> {
    let callback = GuiProgressCallback::new(sender);

    let result = run_pipeline(request, Some(&callback))
        .map_err(|e| format!("Run failed: {}", e))?;

    Ok(summarize(&result))
}

/// Collect what the summary view shows from a finished run.
fn summarize(result: &PipelineResult) -> RunSummary {
    let failed_items = result
        .failed()
        .filter_map(|report| {
            report
                .outcome
                .reason()
                .map(|reason| (report.name.clone(), reason))
        })
        .collect();

    RunSummary {
        message: result.summary(),
        destination_dir: result.destination_dir.display().to_string(),
        total_files: result.reports.len(),
        processed_count: result.succeeded().count(),
        failed_items,
    }
}
