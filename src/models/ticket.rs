//! Time-bounded URLs handed out to clients so payload bytes move directly
//! between the client and the object store.

use chrono::{DateTime, Utc};

/// Lets a client `PUT` one new object straight into the bucket.
///
/// Issuing a ticket does not create the object. The object becomes visible
/// in listings only after the client upload completes and the store's
/// consistency window has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUploadTicket {
    pub generated_key: String,
    pub upload_url: String,
    pub content_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Grants read access to one object until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTicket {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
