//! Captcha solver that asks on the terminal.

use async_trait::async_trait;
use nfce_scraper::{CaptchaChallenge, CaptchaSolution, CaptchaSolver, SolverError};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Writes each challenge image to a file and reads the answer from stdin.
#[derive(Debug, Clone)]
pub struct PromptSolver {
    image_path: PathBuf,
}

impl PromptSolver {
    pub fn new(image_path: PathBuf) -> Self {
        Self { image_path }
    }
}

#[async_trait]
impl CaptchaSolver for PromptSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<CaptchaSolution, SolverError> {
        tokio::fs::write(&self.image_path, &challenge.image)
            .await
            .map_err(|e| {
                SolverError::Failed(format!("cannot write {}: {e}", self.image_path.display()))
            })?;

        let prompt = format!(
            "Captcha saved to {} ({}). Type the code: ",
            self.image_path.display(),
            challenge.content_type
        );
        let answer = tokio::task::spawn_blocking(move || read_answer(&prompt))
            .await
            .map_err(|e| SolverError::Failed(e.to_string()))??;

        Ok(CaptchaSolution::new(answer, challenge.id.clone()))
    }
}

fn read_answer(prompt: &str) -> Result<String, SolverError> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}")
        .and_then(|()| stderr.flush())
        .map_err(|e| SolverError::Failed(e.to_string()))?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| SolverError::Failed(e.to_string()))?;
    if read == 0 {
        return Err(SolverError::Cancelled);
    }

    let answer = line.trim();
    if answer.is_empty() {
        return Err(SolverError::Failed("empty captcha answer".to_string()));
    }
    Ok(answer.to_string())
}
