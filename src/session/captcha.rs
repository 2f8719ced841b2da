//! External signal awaited while a human solves a CAPTCHA

use crate::session::LoginError;
use async_trait::async_trait;

/// Resolves once a human reports the challenge solved
///
/// The wait has no timeout.
#[async_trait]
pub trait CaptchaSignal: Send + Sync {
    async fn wait_for_solution(&self) -> Result<(), LoginError>;
}

/// Prompts on the terminal and waits for Enter
pub struct ConsoleCaptchaSignal;

#[async_trait]
impl CaptchaSignal for ConsoleCaptchaSignal {
    async fn wait_for_solution(&self) -> Result<(), LoginError> {
        let answered = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Solve the CAPTCHA in the browser window, then press Enter")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .map_err(|e| LoginError::CaptchaSignalLost(e.to_string()))?;

        answered
            .map(|_| ())
            .map_err(|e| LoginError::CaptchaSignalLost(e.to_string()))
    }
}

/// Resolves immediately and counts how often it was asked
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ImmediateCaptchaSignal {
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
#[async_trait]
impl CaptchaSignal for ImmediateCaptchaSignal {
    async fn wait_for_solution(&self) -> Result<(), LoginError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
