//! Attachment transfer protocol.
//!
//! Moves file attachment bytes between this device and the remote backend
//! once the merged snapshot has been persisted.

mod backoff;
mod policy;
mod retry;
mod throttle;
mod transfer;

pub use backoff::{BackoffConfig, BackoffReason, BackoffTable};
pub use policy::{resolve_mime, AttachmentConfig, AttachmentPolicy};
pub use retry::{with_retry, RetryPolicy};
pub use throttle::{ThrottleConfig, WebDavThrottle};
pub use transfer::{
    cloud_key_for, sha256_hex, AttachmentReport, AttachmentSyncer, TransferOptions,
    ATTACHMENTS_DIR,
};
