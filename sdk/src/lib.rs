//! Labellerr SDK
//!
//! Client library for the Labellerr annotation platform. Uploads pre-annotation
//! files, tracks the resulting server-side processing jobs and reports their
//! outcome, either inline or through a background-polled handle.

pub mod blocking;
pub mod core;

pub use crate::blocking::{BlockingAsyncHandle, BlockingClient};
pub use crate::core::client::{ClientBuilder, LabellerrClient};
pub use crate::core::config::{BackoffKind, ClientConfig, InstrumentationConfig};
pub use crate::core::instrument::{ArgList, ClientOperation, Interceptor};
pub use crate::core::jobs::{
    AsyncHandle, HandleState, JobController, JobHandle, JobResult, JobStatus, PollBackoff,
    PollOptions, RawStatus, StatusObservation, StatusPoller,
};
pub use crate::core::projects::{
    DataType, DatasetListing, DatasetQuery, DatasetScope, ExportConfig, ExportCreated,
    ExportDownload, ExportFormat, ExportProgress, ExportStatus, ExportStatusReport,
    ProjectCreated, ProjectSpec, RotationConfig,
};
pub use crate::core::transport::{MockTransport, Transport};
pub use crate::core::upload::{AnnotationSource, UploadRequest, UploadSubmitter};
pub use crate::core::{
    AnnotationFormat, ClientError, ClientResult, ConfidenceBucket, ErrorKind, TimeoutOrigin,
};

#[cfg(feature = "http-transport")]
pub use crate::core::transport::HttpTransport;
