//! sampler.rs
//!
//! Resilient sampling: bounded retry with exponential backoff and jitter
//! around a provider call, plus cleanup of the raw response into bare
//! source text. Transient conditions are recognized by a fixed vocabulary
//! in the error message; anything else fails fast.

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::RetrySettings;
use crate::error::FlowError;
use crate::state::{CancelToken, LogLevel, Reporter};

/// Hard ceiling on a single backoff wait.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Cancellation poll interval while waiting out a backoff delay.
const WAIT_SLICE: Duration = Duration::from_millis(100);

const RETRIABLE_FRAGMENTS: [&str; 5] = [
    "rate limit",
    "overloaded",
    "timeout",
    "temporarily unavailable",
    "429",
];

pub fn is_retriable(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRIABLE_FRAGMENTS.iter().any(|f| message.contains(f))
}

/// Backoff delay before retry `attempt`, without jitter.
pub fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_DELAY)
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.7..=1.3);
    delay.mul_f64(factor)
}

/// Strip response formatting down to the code itself: prefer the longest
/// fenced block, then drop a leading interpreter directive.
pub fn clean_response(text: &str) -> String {
    strip_shebang(&strip_code_fences(text))
}

pub fn strip_code_fences(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut inside = false;

    for line in text.trim().lines() {
        if line.trim_start().starts_with("```") {
            if inside {
                blocks.push(current.join("\n").trim().to_string());
                current.clear();
                inside = false;
            } else {
                inside = true;
            }
        } else if inside {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n").trim().to_string());
    }

    // first-wins on equal lengths
    blocks
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.len() > best.len() {
                candidate
            } else {
                best
            }
        })
        .unwrap_or_else(|| text.trim().to_string())
}

pub fn strip_shebang(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("#!") {
        return trimmed.to_string();
    }
    match trimmed.split_once('\n') {
        Some((_, rest)) => rest.trim().to_string(),
        None => String::new(),
    }
}

/// Call the provider until usable content appears, retrying transient
/// failures with jittered exponential backoff. Makes at most
/// `max_retries + 1` provider calls. Cancellation during a backoff wait
/// abandons the loop.
pub fn sample_with_retry(
    reporter: &Reporter,
    cancel: &CancelToken,
    mut sample: impl FnMut(&str) -> Result<String, String>,
    prompt: &str,
    settings: RetrySettings,
) -> Result<String, FlowError> {
    let mut attempt: u32 = 0;
    let last_err;

    loop {
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        if attempt > 0 {
            reporter.info(format!(
                "Retrying generation (attempt {attempt}/{})...",
                settings.max_retries
            ));
        }

        let error = match sample(prompt) {
            Ok(raw) => {
                let content = clean_response(&raw);
                if !content.is_empty() {
                    return Ok(content);
                }
                "empty content returned from provider".to_string()
            }
            Err(e) => e,
        };

        if !is_retriable(&error) || attempt >= settings.max_retries {
            last_err = error;
            break;
        }

        let wait = jittered(backoff_delay(settings.base_delay, attempt));
        reporter.log(
            LogLevel::Warn,
            format!(
                "Transient provider error: {error}. Waiting {:.1}s before retry.",
                wait.as_secs_f64()
            ),
        );
        wait_cancellable(cancel, wait)?;
        attempt += 1;
    }

    Err(FlowError::GenerationFailed(last_err))
}

/// Sleep in short slices so an external cancel aborts the wait promptly.
fn wait_cancellable(cancel: &CancelToken, total: Duration) -> Result<(), FlowError> {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        let slice = remaining.min(WAIT_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    Ok(())
}
