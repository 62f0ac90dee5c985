use std::io::Write;
use std::process::{Command, Stdio};

use crate::llm::client::LlmClient;

/// Where generated text comes from.
#[derive(Clone)]
pub enum LlmBackend {
    /// Hosted HTTP provider.
    Remote { client: LlmClient },
    /// Local model runner; the prompt is piped over stdin and the reply
    /// read from stdout.
    Command { program: String },
}

impl LlmBackend {
    pub fn remote(client: LlmClient) -> Self {
        LlmBackend::Remote { client }
    }

    pub fn command(program: String) -> Self {
        LlmBackend::Command { program }
    }

    pub fn sample(&self, prompt: &str) -> Result<String, String> {
        match self {
            LlmBackend::Remote { client } => client.sample(prompt),
            LlmBackend::Command { program } => run_local(program, prompt),
        }
    }
}

fn run_local(program: &str, prompt: &str) -> Result<String, String> {
    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| e.to_string())?;

    child
        .stdin
        .as_mut()
        .ok_or_else(|| "failed to open stdin for local model runner".to_string())?
        .write_all(prompt.as_bytes())
        .map_err(|e| e.to_string())?;

    let output = child.wait_with_output().map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
