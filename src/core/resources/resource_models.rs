// Media resource models - what the bot uploads to object storage and where it lives.
//
// URL generation is a pure function of the storage platform and its host,
// so the platform is a plain tagged value rather than a trait object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_MP4: &str = "video/mp4";

/// A stored media resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub guid: String,
    pub user_id: i64,
    pub catalog_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub description: String,
    pub content: String,
    /// Host the object was uploaded to
    pub host: String,
    /// Size in bytes
    pub size: i64,
    #[serde(rename = "create_time", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "update_time", with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Public URL of this resource's object `key` on its recorded host.
    ///
    /// Falls back to the platform's default host when none was recorded.
    pub fn url(&self, platform: StoragePlatformKind, key: &str) -> String {
        StoragePlatform::new(platform, self.host.clone()).resolve_url(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Photo,
    File,
    Video,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Photo => "photo",
            ResourceKind::File => "file",
            ResourceKind::Video => "video",
        }
    }

    /// Best-effort kind for an uploaded MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            ResourceKind::Photo
        } else if mime.starts_with("video/") {
            ResourceKind::Video
        } else {
            ResourceKind::File
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STORAGE PLATFORMS
// ============================================================================

/// CDN/object-storage provider serving resource URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePlatformKind {
    Cloudflare,
    Aws,
}

impl StoragePlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoragePlatformKind::Cloudflare => "cloudflare",
            StoragePlatformKind::Aws => "aws",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cloudflare" => Some(StoragePlatformKind::Cloudflare),
            "aws" => Some(StoragePlatformKind::Aws),
            _ => None,
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            StoragePlatformKind::Cloudflare => "https://cdn.cloudflare.com",
            StoragePlatformKind::Aws => "https://s3.amazonaws.com",
        }
    }
}

/// A platform plus an optional custom host. An empty host means the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePlatform {
    pub platform: StoragePlatformKind,
    #[serde(default)]
    pub host: String,
}

impl StoragePlatform {
    pub fn new(platform: StoragePlatformKind, host: impl Into<String>) -> Self {
        Self {
            platform,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        if self.host.is_empty() {
            self.platform.default_host()
        } else {
            &self.host
        }
    }

    /// Full URL for a bucket key.
    pub fn resolve_url(&self, key: &str) -> String {
        format!("{}/{}", self.host(), key)
    }
}

/// Backend the upload client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Alibaba Cloud OSS
    Oss,
    /// AWS S3
    S3,
}

/// Connection settings for the upload client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClientOptions {
    pub platform: StorageBackend,
    pub endpoint: String,
    #[serde(rename = "accessKeyID")]
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket_name: String,
    pub host: String,
}

// Keep the secret out of logs.
impl fmt::Debug for StorageClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClientOptions")
            .field("platform", &self.platform)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("bucket_name", &self.bucket_name)
            .field("host", &self.host)
            .finish()
    }
}
