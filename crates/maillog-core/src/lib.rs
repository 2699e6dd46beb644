//! Rejected-recipient extraction from MTA logs.
//!
//! Postfix spreads one message over several log lines that only share the
//! queue id:
//! 1. a client-origin line (`smtpd`, `pickup`, `cleanup`, `opendkim` or
//!    `qmgr`) selects the queue ids of interest,
//! 2. every line carrying `<id>: ` is folded into a [`DeliveryRecord`]
//!    (sender, source domain, recipient attempts, removal),
//! 3. attempts whose `status=` equals the target status become rejected
//!    addresses, preferring `orig_to` over the rewritten `to`.
//!
//! Log retrieval is injected through [`LineSource`]; the engine never opens
//! files or spawns processes itself.

mod config;
mod engine;
mod error;
mod exim;
mod ids;
mod record;
mod reduce;
mod source;
mod template;
mod types;

pub use config::{
    CorrelateConfig, DEFAULT_SEARCH, DEFAULT_SERVER, Daemon, RecordPolicy,
    TargetStatus,
};
pub use engine::{Correlation, correlate};
#[cfg(feature = "tokio")]
pub use engine::correlate_concurrent;
pub use error::CorrelateError;
pub use exim::{
    EXIM_FAILURE_FLAG, EXIM_FAILURE_MARKER, EximRejection, EximReport,
    exim_prefilter, parse_exim_line, scan_exim,
};
pub use ids::{IdFilter, filter_ids};
pub use record::{
    RecordBuilder, RecordMatchers, RecordOutcome, build_record,
    correlate_record, has_status_token,
};
pub use reduce::{RejectedAddresses, Rejection, reduce};
pub use source::{LineFilter, LineSource, MemorySource};
pub use template::{
    DELIVERY_AGENTS, LineMatcher, Template, TemplateParams, build_matcher,
    render,
};
pub use types::{
    DeliveryRecord, QueueId, QueueIds, RecipientAttempt, RecordMap,
    STATUS_BOUNCED, STATUS_DEFERRED, STATUS_EXPIRED, STATUS_SENT,
};
