//! Default Volley command line runtime
//!
//! Loads a run definition from disk (or a built-in default), applies command line and environment
//! overrides, cancels the run on Ctrl+C and prints the report.
use crate::error::RuntimeError;
use clap::Parser;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn, Instrument};
use volley::core::{RequestConfig, RunConfig, RunConfigFile, Sample};
use volley::pool::VirtualUser;
use volley::report::{EXIT_ABORTED, EXIT_INVALID_CONFIG};
use volley::{LoadTest, RunReport};

#[derive(Parser, Debug)]
#[command(version = "0.1")]
struct VolleyCli {
    /// Run definition (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the system under test [default: http://localhost:9090]
    #[arg(short, long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Print the report as JSON instead of the human readable summary
    #[arg(long)]
    json: bool,
}

/// Default Volley runtime.
///
/// # Example
///
/// ```no_run
/// use volley::prelude::*;
/// use volley_runtime::VolleyRuntime;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     VolleyRuntime::new()
///         .with_args()
///         .run(|config, _request| LoadTest::new("smoke", config, my_scenario))
///         .await
/// }
///
/// async fn my_scenario(_vu: VirtualUser) -> Vec<Sample> {
///     vec![]
/// }
/// ```
pub struct VolleyRuntime {
    config_path: Option<PathBuf>,
    default_config: Option<RunConfigFile>,
    base_url: Option<String>,
    json: bool,
    cancel: CancellationToken,
}

impl Default for VolleyRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl VolleyRuntime {
    pub fn new() -> Self {
        VolleyRuntime {
            config_path: None,
            default_config: None,
            base_url: None,
            json: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Use the default CLI arguments for Volley.
    ///
    /// `-c`, `--config` path to a JSON run definition
    ///
    /// `-b`, `--base-url` (or `BASE_URL`) to point the scenario at another host
    ///
    /// `--json` to print the report as JSON
    ///
    /// # Example
    /// ```ignore
    /// $ ./my_load_test -c readiness.json
    /// $ BASE_URL=https://staging.example.com ./my_load_test --json
    /// ```
    pub fn with_args(self) -> Self {
        let args = VolleyCli::parse();
        self.apply(args)
    }

    fn apply(mut self, args: VolleyCli) -> Self {
        if args.config.is_some() {
            self.config_path = args.config;
        }
        if args.base_url.is_some() {
            self.base_url = args.base_url;
        }
        self.json |= args.json;
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Run definition used when no `--config` is given.
    pub fn default_config(mut self, file: RunConfigFile) -> Self {
        self.default_config = Some(file);
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Token cancelled on Ctrl+C; cancelling it by hand aborts the run the same way.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve the run definition: `--config` first, then the default, then overrides.
    pub fn load(&self) -> Result<(RunConfig, RequestConfig), RuntimeError> {
        let mut file = match (&self.config_path, &self.default_config) {
            (Some(path), _) => {
                debug!("Loading run definition from {}", path.display());
                RunConfigFile::from_path(path)?
            }
            (None, Some(file)) => file.clone(),
            (None, None) => return Err(RuntimeError::NoConfig),
        };

        if let Some(base_url) = &self.base_url {
            file.request.base_url = Some(base_url.clone());
        }

        Ok((file.validate()?, file.request()?))
    }

    /// Run the load test built by `build` and map its report to a process exit code.
    pub async fn run<B, T, F>(self, build: B) -> ExitCode
    where
        B: FnOnce(RunConfig, RequestConfig) -> LoadTest<T>,
        T: Fn(VirtualUser) -> F + Send + Sync + 'static + Clone,
        F: Future<Output = Vec<Sample>> + Send + 'static,
    {
        match self.execute(build).await {
            Ok(report) => exit_code(report.exit_code()),
            Err(err @ RuntimeError::Report(_)) => {
                error!("{err}");
                exit_code(EXIT_ABORTED)
            }
            Err(err) => {
                error!("{err}");
                exit_code(EXIT_INVALID_CONFIG)
            }
        }
    }

    #[instrument(name = "volley", skip_all)]
    pub async fn execute<B, T, F>(self, build: B) -> Result<RunReport, RuntimeError>
    where
        B: FnOnce(RunConfig, RequestConfig) -> LoadTest<T>,
        T: Fn(VirtualUser) -> F + Send + Sync + 'static + Clone,
        F: Future<Output = Vec<Sample>> + Send + 'static,
    {
        let (config, request) = self.load()?;
        info!("Targeting {}", request.base_url);

        spawn_ctrl_c(self.cancel.clone());
        let report = build(config, request).cancel_on(self.cancel.clone()).await;

        println!("{}", self.render(&report)?);
        Ok(report)
    }

    pub fn render(&self, report: &RunReport) -> Result<String, RuntimeError> {
        if self.json {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(report.to_string())
        }
    }
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Received Ctrl+C, stopping the run.");
                    cancel.cancel();
                }
                Err(err) => error!("Unable to listen for Ctrl+C: {err}"),
            }
        }
        .in_current_span(),
    );
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
