use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{Duration, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::config::Config;
use crate::hash;
use crate::upload_log::{NewUpload, UploadLog, UploadRecord};

/// Where an artifact ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr, strum::EnumString)]
pub enum Backend {
  /// Cold storage (Glacier vault).
  #[strum(serialize = "glacier")]
  ArchivalStorage,
  /// Plain bucket (S3).
  #[strum(serialize = "s3")]
  ObjectStorage,
}

impl Backend {
  pub fn select(object_storage: bool) -> Backend {
    if object_storage { Backend::ObjectStorage } else { Backend::ArchivalStorage }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
  pub backend: Backend,
  /// Bucket or vault name.
  pub container: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
  pub backend: Backend,
  pub container: String,
  /// Object key for S3, archive id for Glacier.
  pub remote_id: String,
  pub size: u64,
}

#[async_trait]
pub trait Uploader: Send + Sync {
  async fn upload(&self, file: &Path, target: &UploadTarget) -> Result<UploadReceipt>;
}

pub struct AwsStorage {
  s3: aws_sdk_s3::Client,
  glacier: aws_sdk_glacier::Client,
  key_prefix: Option<String>,
  retention: Option<Duration>,
  log: UploadLog,
  multi_progress: MultiProgress,
}

impl AwsStorage {
  pub async fn new(config: &Config, log: UploadLog, multi_progress: MultiProgress) -> AwsStorage {
    let aws = &config.aws;
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let (Some(access_key), Some(secret_key)) = (&aws.aws_access_key, &aws.aws_secret_key) {
      loader = loader.credentials_provider(Credentials::new(access_key, secret_key, None, None, "boupy-config"));
    }
    if let Some(region) = &aws.aws_region {
      loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(endpoint) = &aws.aws_endpoint_url {
      loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    // S3-compatible endpoints generally need path-style addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
      .force_path_style(aws.aws_endpoint_url.is_some())
      .build();

    AwsStorage {
      s3: aws_sdk_s3::Client::from_conf(s3_config),
      glacier: aws_sdk_glacier::Client::new(&sdk_config),
      key_prefix: aws.aws_key_name.clone().filter(|k| !k.is_empty()),
      retention: config.delete_weeks.map(|w| Duration::weeks(i64::from(w))),
      log,
      multi_progress,
    }
  }

  pub fn log(&self) -> &UploadLog {
    &self.log
  }

  fn object_key(&self, name: &str) -> String {
    object_key(self.key_prefix.as_deref(), name)
  }

  async fn put(&self, file: &Path, name: &str, target: &UploadTarget) -> Result<String> {
    let body = ByteStream::from_path(file).await.with_context(|| format!("reading {:?}", file))?;
    match target.backend {
      Backend::ObjectStorage => {
        let key = self.object_key(name);
        self.s3
          .put_object()
          .bucket(&target.container)
          .key(&key)
          .body(body)
          .send()
          .await
          .with_context(|| format!("uploading {} to bucket {}", key, target.container))?;
        Ok(key)
      }
      Backend::ArchivalStorage => {
        let output = self.glacier
          .upload_archive()
          .account_id("-")
          .vault_name(&target.container)
          .archive_description(name)
          .body(body)
          .send()
          .await
          .with_context(|| format!("uploading {} to vault {}", name, target.container))?;
        output
          .archive_id()
          .map(str::to_string)
          .context("vault did not return an archive id")
      }
    }
  }

  async fn delete(&self, record: &UploadRecord, backend: Backend) -> Result<()> {
    match backend {
      Backend::ObjectStorage => {
        self.s3
          .delete_object()
          .bucket(&record.container)
          .key(&record.remote_id)
          .send()
          .await?;
      }
      Backend::ArchivalStorage => {
        self.glacier
          .delete_archive()
          .account_id("-")
          .vault_name(&record.container)
          .archive_id(&record.remote_id)
          .send()
          .await?;
      }
    }
    Ok(())
  }

  /// Removes uploads older than the retention period. Failures are logged
  /// and the record stays live so the next run retries it.
  async fn prune(&self, target: &UploadTarget, now: i64) {
    let Some(retention) = self.retention else { return };
    let cutoff = now - retention.num_seconds();
    let expired = match self.log.expired(target.backend, &target.container, cutoff).await {
      Ok(expired) => expired,
      Err(e) => {
        warn!("Skipping retention for {} {}: {:#}", target.backend, target.container, e);
        return;
      }
    };
    for record in expired {
      if let Err(e) = self.delete(&record, target.backend).await {
        warn!("Failed to delete expired backup {}: {:#}", record.name, e);
        continue;
      }
      match self.log.mark_deleted(record.id, now).await {
        Ok(()) => info!("Deleted expired backup {} from {} {}", record.name, target.backend, target.container),
        Err(e) => warn!("Deleted expired backup {} but could not mark it: {:#}", record.name, e),
      }
    }
  }
}

pub fn object_key(prefix: Option<&str>, name: &str) -> String {
  match prefix {
    Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), name),
    None => name.to_string(),
  }
}

#[async_trait]
impl Uploader for AwsStorage {
  async fn upload(&self, file: &Path, target: &UploadTarget) -> Result<UploadReceipt> {
    let name = file
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .with_context(|| format!("{:?} has no file name", file))?;
    let size = std::fs::metadata(file).with_context(|| format!("reading {:?}", file))?.len();
    let sha256 = hash::file_sha256(file)?;

    let pb = self.multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template("{prefix:.bold.dim} {spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_prefix("[Upload]");
    pb.set_message(format!("{} ({})", name, crate::utils::humanise_bytes(size)));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let uploaded = self.put(file, &name, target).await;
    pb.finish_and_clear();
    let remote_id = uploaded?;

    info!("Uploaded {} to {} {} as {}", name, target.backend, target.container, remote_id);

    // The artifact is already stored remotely, so bookkeeping errors only warn.
    let now = Utc::now().timestamp();
    let recorded = self.log.record(&NewUpload {
      name: &name,
      backend: target.backend,
      container: &target.container,
      remote_id: &remote_id,
      sha256: &sha256,
      size,
      uploaded_at: now,
    }).await;
    if let Err(e) = recorded {
      warn!("Could not record upload of {} ({}) in the upload log: {:#}", name, remote_id, e);
    }

    self.prune(target, now).await;

    Ok(UploadReceipt {
      backend: target.backend,
      container: target.container.clone(),
      remote_id,
      size,
    })
  }
}
