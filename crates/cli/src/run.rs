//! `qti run`: drive one session through a file of submissions.

use std::collections::BTreeMap;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use qti_core::{FileData, VariableKind};
use qti_eval::{AttemptResult, DeliverySettings, ItemSession, ResponseData, SessionState};
use serde::Deserialize;

use crate::{load_item, report_error, OutputFormat};

pub(crate) struct RunOptions<'a> {
    pub item: &'a Path,
    pub responses: &'a Path,
    pub delivery: Option<&'a Path>,
    pub seed: u64,
    pub max_attempts: Option<u32>,
    pub output: OutputFormat,
    pub quiet: bool,
}

// ── Submission file ──────────────────────────────────────────────

/// One response as written in a submission file: a bare string for a
/// single value, a list for containers, or file metadata.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmittedValue {
    One(String),
    Many(Vec<String>),
    File(FileData),
}

impl From<SubmittedValue> for ResponseData {
    fn from(v: SubmittedValue) -> Self {
        match v {
            SubmittedValue::One(s) => ResponseData::string(s),
            SubmittedValue::Many(list) => ResponseData::Strings(list),
            SubmittedValue::File(f) => ResponseData::File(f),
        }
    }
}

/// `{"responses": {...}, "elapsedSeconds": 12.5}` or just the map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Submission {
    Timed(TimedSubmission),
    Plain(BTreeMap<String, SubmittedValue>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TimedSubmission {
    responses: BTreeMap<String, SubmittedValue>,
    #[serde(default)]
    elapsed_seconds: f64,
}

impl Submission {
    fn into_parts(self) -> (BTreeMap<String, ResponseData>, f64) {
        let (map, elapsed) = match self {
            Submission::Timed(t) => (t.responses, t.elapsed_seconds),
            Submission::Plain(map) => (map, 0.0),
        };
        let map = map.into_iter().map(|(k, v)| (k, v.into())).collect();
        (map, elapsed)
    }
}

fn parse_submissions(text: &str) -> Result<Vec<Submission>, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid submissions: {}", e))
}

fn load_delivery(path: Option<&Path>) -> Result<DeliverySettings, String> {
    let Some(path) = path else {
        return Ok(DeliverySettings::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|_| format!("delivery settings not found: {}", path.display()))?;
    toml::from_str(&text).map_err(|e| format!("invalid delivery settings {}: {}", path.display(), e))
}

// ── Command ──────────────────────────────────────────────

fn die(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(&format!("error: {}", msg), output, quiet);
    process::exit(1);
}

pub(crate) fn cmd_run(opts: RunOptions<'_>) {
    let (output, quiet) = (opts.output, opts.quiet);

    let item = Arc::new(load_item(opts.item, output, quiet));

    let submissions = match std::fs::read_to_string(opts.responses) {
        Ok(text) => parse_submissions(&text).unwrap_or_else(|e| die(&e, output, quiet)),
        Err(_) => die(
            &format!("responses file not found: {}", opts.responses.display()),
            output,
            quiet,
        ),
    };

    let mut settings = load_delivery(opts.delivery).unwrap_or_else(|e| die(&e, output, quiet));
    if let Some(max) = opts.max_attempts {
        settings.max_attempts = max;
    }

    let mut session = qti_eval::initialize_session(Arc::clone(&item), settings, opts.seed)
        .unwrap_or_else(|e| die(&e.to_string(), output, quiet));

    let total = submissions.len();
    let mut attempts = Vec::new();
    for (index, submission) in submissions.into_iter().enumerate() {
        if session.state() == SessionState::Closed {
            tracing::warn!(
                ignored = total - index,
                "session closed; remaining submissions ignored"
            );
            break;
        }
        let (responses, elapsed) = submission.into_parts();
        if elapsed > 0.0 {
            let elapsed = Duration::try_from_secs_f64(elapsed).unwrap_or_else(|e| {
                die(
                    &format!("submission {}: invalid elapsedSeconds: {}", index + 1, e),
                    output,
                    quiet,
                )
            });
            session
                .record_elapsed(elapsed)
                .unwrap_or_else(|e| die(&e.to_string(), output, quiet));
        }
        let result = qti_eval::submit(&mut session, &responses)
            .unwrap_or_else(|e| {
                die(&format!("submission {}: {}", index + 1, e), output, quiet)
            });
        attempts.push(result);
    }

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "item": item.identifier,
                "seed": opts.seed,
                "attempts": attempts.iter().map(AttemptResult::to_json).collect::<Vec<_>>(),
                "session": session.snapshot().to_json(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string())
            );
        }
        OutputFormat::Text => print_text(&session, &attempts),
    }
}

fn print_text(session: &ItemSession, attempts: &[AttemptResult]) {
    for (i, attempt) in attempts.iter().enumerate() {
        let n = i + 1;
        if !attempt.bad_identifiers.is_empty() {
            println!(
                "submission {}: bad responses: {}",
                n,
                attempt.bad_identifiers.join(", ")
            );
        } else if !attempt.invalid_identifiers.is_empty() {
            println!(
                "submission {}: invalid responses: {}",
                n,
                attempt.invalid_identifiers.join(", ")
            );
        } else if let Some(report) = &attempt.report {
            println!("submission {}: {}", n, report.outcome.as_str());
        }
    }

    for decl in session.item().declarations_of(VariableKind::Outcome) {
        if let Some(value) = session.value(&decl.identifier) {
            println!("  {} = {}", decl.identifier, value);
        }
    }
    println!(
        "session {} after {} completed attempt(s)",
        session.state(),
        session.completed_attempts()
    );
}
