//! Fatal errors for a reconciliation pass.
//!
//! Per-item problems never show up here; they are collected as
//! [`crate::reconcile::ItemWarning`] and the pass carries on.

use thiserror::Error;

use crate::feed::FeedError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Network failure reaching the feed
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Feed host answered with a non-success status
    #[error("failed to fetch feed: {status} {body}")]
    FeedStatus { status: u16, body: String },

    /// Feed text is not a usable RSS document
    #[error("failed to parse feed: {0}")]
    Parse(#[from] FeedError),

    /// Key-value store read or write failed
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("failed to serialize episodes index: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Rejected episode update
    #[error("Validation failed: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

pub type Result<T> = std::result::Result<T, SyncError>;
