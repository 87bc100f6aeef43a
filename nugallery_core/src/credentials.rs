/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::credentials
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Obtain feed credentials from the external credential
    provider, falling back to an interactive login task when
    the silent query cannot answer.

  Security / Safety Notes:
    Provider output is parsed in memory and never logged. All
    failures collapse into one fixed user-facing message.

  Dependencies:
    tokio::process and tokio::time for bounded execution,
    serde_json for the provider's JSON answer, dirs for the
    home directory placeholder.

  Operational Scope:
    Invoked by the V2 feed client only after a 401 response.

  Revision History:
    2026-10-18 COD  Implemented silent/interactive acquisition.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit Silent → Interactive → Re-query state machine
    - Bounded waits on every non-interactive invocation
    - No raw process errors past the module boundary
============================================================*/

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{GalleryError, Result};
use crate::host::{map_spawn_error, TaskRunner};
use crate::logger::Logger;
use crate::model::Credentials;

/// Placeholder in the provider folder that stands for the user's home directory.
pub const USER_PROFILE_PLACEHOLDER: &str = "{user-profile}";

/// Default bound for the silent and re-query provider invocations.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

const WINDOWS_PROVIDER: &str = "CredentialProvider.Microsoft.exe";
const PORTABLE_PROVIDER: &str = "CredentialProvider.Microsoft.dll";

/// Supplies credentials for a package source.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn acquire(&self, source_url: &str) -> Result<Credentials>;
}

/// Program and leading arguments used to launch the credential provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCommand {
    pub program: String,
    pub base_args: Vec<String>,
}

impl ProviderCommand {
    /// Resolve the provider launch for the given folder and platform.
    ///
    /// Windows runs the native executable; elsewhere the portable assembly is
    /// loaded through the runtime host.
    pub fn resolve(folder: &str, runtime: &str, windows: bool) -> Self {
        let folder = expand_provider_folder(folder);
        if windows {
            Self {
                program: format!("{folder}\\{WINDOWS_PROVIDER}"),
                base_args: Vec::new(),
            }
        } else {
            Self {
                program: runtime.to_string(),
                base_args: vec![format!("{folder}/{PORTABLE_PROVIDER}")],
            }
        }
    }

    fn args(&self, extra: &[&str], source_url: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(extra.iter().map(|arg| arg.to_string()));
        args.push("-U".to_string());
        args.push(source_url.to_string());
        args
    }

    fn display(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }
}

/// Substitute the home placeholder and strip trailing path separators.
pub fn expand_provider_folder(folder: &str) -> String {
    let expanded = match dirs::home_dir() {
        Some(home) if folder.contains(USER_PROFILE_PLACEHOLDER) => {
            folder.replace(USER_PROFILE_PLACEHOLDER, &home.to_string_lossy())
        }
        _ => folder.to_string(),
    };
    expanded
        .trim_end_matches(|c: char| c == '/' || c == '\\')
        .to_string()
}

/// Credential source backed by the Microsoft credential provider executable.
pub struct CredentialProvider {
    command: ProviderCommand,
    task_runner: Arc<dyn TaskRunner>,
    logger: Arc<Logger>,
    timeout: Duration,
}

impl CredentialProvider {
    pub fn new(
        command: ProviderCommand,
        task_runner: Arc<dyn TaskRunner>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            command,
            task_runner,
            logger,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn acquire_inner(&self, source_url: &str) -> Result<Credentials> {
        let silent = self.command.args(&["-I", "-N", "-F", "Json"], source_url);
        let stdout = match self.query(&silent).await {
            Ok(stdout) => stdout,
            Err(err) => {
                self.logger.warn(
                    "CREDSILENT",
                    format!("Silent credential query for {source_url} failed: {err}"),
                );
                let interactive = self.command.args(&["-C", "False", "-R"], source_url);
                self.task_runner
                    .run(&self.command.program, &interactive)
                    .await?;
                let requery = self.command.args(&["-N", "-F", "Json"], source_url);
                self.query(&requery).await?
            }
        };

        serde_json::from_slice::<Credentials>(&stdout).map_err(|err| {
            GalleryError::Serialization(format!("Credential provider emitted invalid JSON: {err}"))
        })
    }

    /// Run the provider non-interactively, bounded by the configured timeout.
    async fn query(&self, args: &[String]) -> Result<Vec<u8>> {
        let child = Command::new(&self.command.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child)
            .await
            .map_err(|_| {
                GalleryError::Runtime(format!(
                    "`{}` timed out after {}s",
                    self.command.display(args),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|err| map_spawn_error(err, &self.command.program))?;

        if !output.status.success() {
            return Err(GalleryError::CommandFailure {
                command: self.command.display(args),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl CredentialSource for CredentialProvider {
    async fn acquire(&self, source_url: &str) -> Result<Credentials> {
        self.logger.info(
            "CREDENTIALS",
            format!("Acquiring credentials for {source_url}"),
        );
        self.acquire_inner(source_url).await.map_err(|err| {
            self.logger.error(
                "CREDFAIL",
                format!("Credential provider failed for {source_url}: {err}"),
            );
            GalleryError::credential()
        })
    }
}
