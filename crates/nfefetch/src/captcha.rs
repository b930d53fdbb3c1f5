//! Manual CAPTCHA resolution seam.
//!
//! Solving the CAPTCHA is a human action. The pipeline only blocks until
//! the operator confirms — indefinitely, by design: the only way out is
//! external process termination.

use std::io::{BufRead, Write};

use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptchaError {
    #[error("captcha confirmation input closed: {0}")]
    InputClosed(String),

    #[error("captcha reported as unsolvable: {0}")]
    Unsolved(String),
}

/// Blocks until a human confirms the CAPTCHA was solved in the browser.
pub trait CaptchaResolver {
    fn wait_for_solution(&self, entity_label: &str) -> Result<(), CaptchaError>;
}

/// Prompts on stdout and blocks on a line from stdin. No timeout.
pub struct StdinCaptchaResolver;

impl CaptchaResolver for StdinCaptchaResolver {
    fn wait_for_solution(&self, entity_label: &str) -> Result<(), CaptchaError> {
        info!("Waiting for manual CAPTCHA resolution ({})", entity_label);

        let banner = "=".repeat(70);
        println!("\n{}", banner);
        println!("CAPTCHA REQUIRED - MANUAL RESOLUTION ({})", entity_label);
        println!("{}", banner);
        println!("1. Solve the CAPTCHA in the browser window NOW");
        println!("2. Do NOT click the search button yet");
        println!("3. Wait for the page to finish reloading");
        println!("4. Only then press ENTER here");
        println!("{}", banner);
        print!("Press ENTER after solving the CAPTCHA: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => Err(CaptchaError::InputClosed("stdin reached EOF".to_string())),
            Ok(_) => {
                info!("CAPTCHA confirmed, resuming flow");
                Ok(())
            }
            Err(e) => Err(CaptchaError::InputClosed(e.to_string())),
        }
    }
}

/// Resolver that always reports success. For tests and unattended flows
/// where the portal session is already past the CAPTCHA.
pub struct NoopCaptchaResolver;

impl CaptchaResolver for NoopCaptchaResolver {
    fn wait_for_solution(&self, _entity_label: &str) -> Result<(), CaptchaError> {
        Ok(())
    }
}
