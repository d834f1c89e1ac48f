mod config;
mod date;
mod paths;
mod util;
mod progress;
mod ndjson;

mod model;
mod classify;
mod manifest;
mod summary;
mod traverse;
mod metrics;

mod sampler;
mod processor;
mod report;

pub mod client;

pub use crate::config::{
    ClientOptions, Credentials, FileConfig, ProcessOptions, ReportOptions, SamplerOptions, TraversalLimits,
    ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_USER_AGENT,
};
pub use crate::date::{format_utc, ym_from_epoch, YearMonth};
pub use crate::paths::{report_index, report_page, DataLayout};
pub use crate::progress::ProgressScope;

pub use crate::model::{
    split_fullname, AuthorStatus, CommentRow, ForestNode, MoreStub, ParentKind, RawComment, Submission, SubmissionRole,
};
pub use crate::classify::{match_by_title, original_title_from_update, referenced_ids, Classifier, PostKind};
pub use crate::manifest::{CaseEntry, CaseStatus, Manifest, MergeOutcome};
pub use crate::summary::{Outcome, RunSummary};

// comment-forest flattening and per-case metrics
pub use crate::traverse::{Flattened, Traversal};
pub use crate::metrics::{compute as compute_metrics, DepthBucket, MetricRecord, SubmissionMetrics};

// the three stages
pub use crate::sampler::{run_sampler, SampleReport};
pub use crate::processor::{process_case, run_processor, CaseOutcome, ProcessReport};
pub use crate::report::{html_escape, run_report, Anonymiser, CommentTree, ReportRun, Thread};

// robust file ops and NDJSON helpers for binaries and tests
pub use crate::util::{init_tracing_once, sweep_stale_tmp, write_json_atomic, TMP_SUFFIX};
pub use crate::ndjson::{read_records, write_records_atomic, NdjsonReader, NdjsonWriter, Records};
