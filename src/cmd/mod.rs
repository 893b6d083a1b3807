//! CLI command implementations.
//!
//! | Module    | Commands handled                 |
//! |-----------|----------------------------------|
//! | `board`   | `Board`                          |
//! | `task`    | `Take`, `Complete`, `Tasks`      |
//! | `metrics` | `Metrics`                        |
//! | `scan`    | `Scan`                           |
//! | `config`  | `Config`                         |

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use qstrack::config::QsConfig;
use qstrack::directory::{HttpPartDirectory, PartDirectory};
use qstrack::errors::TrackerError;
use qstrack::session::Session;

pub mod board;
pub mod config;
pub mod metrics;
pub mod scan;
pub mod task;

pub use board::cmd_board;
pub use config::cmd_config;
pub use metrics::cmd_metrics;
pub use scan::{ScanSource, cmd_list_cameras, cmd_scan};
pub use task::{CompleteTarget, cmd_complete, cmd_take, cmd_tasks};

/// Everything a networked command needs.
pub struct Context {
    pub config: QsConfig,
    pub directory: Arc<dyn PartDirectory>,
    pub session: Session,
}

impl Context {
    /// Build the client and resolve the operator session.
    ///
    /// The operator comes from `--operator` / `QSTRACK_OPERATOR_ID` when set,
    /// otherwise from `GET /auth/current-user`.
    pub async fn connect(config: QsConfig) -> Result<Self> {
        let token = config.token().ok_or(TrackerError::MissingToken).with_context(|| {
            format!(
                "Pass --token, set {} or add it to .env",
                qstrack::config::ENV_TOKEN
            )
        })?;
        let directory = Arc::new(
            HttpPartDirectory::from_config(&config).context("Failed to build HTTP client")?,
        );

        let session = Session::from_token(token, config.operator_id.unwrap_or_default())
            .context("Invalid session token")?;
        let session = match config.operator_id {
            Some(_) => session,
            None => {
                let user = directory
                    .current_user(&session)
                    .await
                    .map_err(failure)
                    .context("Failed to resolve the current operator")?;
                debug!(operator_id = user.user_id, "operator resolved from server");
                let session = session.with_operator(user.user_id);
                match user.role {
                    Some(role) => session.with_role(role),
                    None => session,
                }
            }
        };

        Ok(Self {
            config,
            directory,
            session,
        })
    }
}

/// Turn a library error into a CLI error carrying the operator-facing text.
pub fn failure(err: TrackerError) -> anyhow::Error {
    let message = err.user_message();
    if message == err.to_string() {
        anyhow::Error::new(err)
    } else {
        anyhow::Error::new(err).context(message)
    }
}
