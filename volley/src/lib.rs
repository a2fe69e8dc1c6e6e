#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod error;
pub mod evaluator;
pub mod pool;
pub mod recorder;
pub mod report;
pub mod scheduler;
#[doc(hidden)]
pub mod transaction;

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub mod http;

pub(crate) mod timer;

pub use load_test::LoadTest;
pub use report::{AbortReason, RunOutcome, RunReport, RunState, StopReason};
pub use transaction::transaction;
pub use volley_core as core;

pub mod prelude {
    pub use crate::load_test::LoadTest;
    pub use crate::pool::VirtualUser;
    pub use crate::report::{RunOutcome, RunReport};
    pub use crate::transaction::transaction;

    #[cfg(feature = "http")]
    pub use crate::http::{HttpClient, HttpResponse};

    pub use tokio_util::sync::CancellationToken;
    pub use volley_core::{
        AfterLastStage, RequestConfig, RunConfig, RunConfigFile, Sample, Stage, Thresholds,
    };
}
