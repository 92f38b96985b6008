//! Authenticated client for the YouTube Data API v3 upload endpoint.
//!
//! Uploads use the resumable protocol: one session request carrying the video
//! resource, followed by `Content-Range` chunk PUTs. Byte-level progress is
//! published through [`UploadProgress`] so pollers never block the upload task.
//!
//! Credentials are never cached here; every upload asks its [`TokenSource`]
//! for a fresh [`AccessToken`].

pub mod client;
pub mod config;
pub mod error;
pub mod progress;
pub mod token;

pub use client::{watch_url, ChannelInfo, PlatformClient, UploadReceipt, YouTubeClient};
pub use config::YouTubeConfig;
pub use error::{PlatformError, PlatformResult};
pub use progress::UploadProgress;
pub use token::{AccessToken, CredentialsFileTokenSource, StaticTokenSource, TokenSource};
