use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use log::{debug, info};

use crate::archive::{self, Stats};
use crate::config::Config;
use crate::encryption::Cipher;
use crate::error::{Argument, BoupyError};
use crate::naming;
use crate::storage::{Backend, UploadReceipt, UploadTarget, Uploader};
use crate::utils::{humanise_bytes, with_timeout};

/// What the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct BackupRequest {
  pub folder: String,
  pub encrypt: bool,
  pub backend: Backend,
}

impl BackupRequest {
  pub fn validate(&self) -> Result<(), BoupyError> {
    if self.folder.is_empty() {
      return Err(BoupyError::MissingArgument(Argument::Folder));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
  /// Always ends in a separator.
  pub source: PathBuf,
  pub base_name: String,
  /// `{base_name}-{timestamp}`, shared by the archive, its root entry and
  /// the encrypted artifact.
  pub name: String,
  pub encrypt: bool,
  pub backend: Backend,
}

impl BackupJob {
  pub fn new(request: &BackupRequest, now: NaiveDateTime) -> Result<BackupJob, BoupyError> {
    request.validate()?;
    let normalized = naming::normalize_path(&request.folder);
    let base_name = match naming::base_name(&normalized) {
      Some(base) if base != "." && base != ".." => base,
      _ => canonical_base_name(&normalized),
    };
    let name = naming::archive_name(&base_name, &now);
    Ok(BackupJob {
      source: PathBuf::from(normalized),
      base_name,
      name,
      encrypt: request.encrypt,
      backend: request.backend,
    })
  }
}

fn canonical_base_name(path: &str) -> String {
  fs::canonicalize(path)
    .ok()
    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    .unwrap_or_else(|| "root".to_string())
}

#[derive(Debug)]
pub struct BackupReport {
  pub name: String,
  pub stats: Stats,
  pub receipt: UploadReceipt,
}

/// Archive, maybe encrypt, upload, then remove the temporary files whatever
/// the outcome.
pub async fn run_backup(
  request: &BackupRequest,
  config: &Config,
  cipher: &dyn Cipher,
  uploader: &dyn Uploader,
) -> Result<BackupReport> {
  let job = BackupJob::new(request, Local::now().naive_local())?;
  let target = UploadTarget {
    backend: job.backend,
    container: config.container_for(job.backend)?.to_string(),
  };

  let temp_dir = config.temp_dir();
  let archive = archive::create_archive(&job.source, &temp_dir, &job.name)?;
  let encrypted = job.encrypt.then(|| temp_dir.join(&job.name));

  let uploaded = async {
    let artifact = match &encrypted {
      Some(encrypted) => {
        cipher.encrypt_file(&archive.path, encrypted)?;
        encrypted
      }
      None => &archive.path,
    };
    with_timeout(config.timeout(), "upload", uploader.upload(artifact, &target)).await
  }
  .await;

  let mut artifacts = vec![archive.path.as_path()];
  artifacts.extend(encrypted.as_deref());
  cleanup(&artifacts);

  let receipt = uploaded?;
  info!(
    "Backed up {} files ({}), {} directories and {} symlinks as {}",
    archive.stats.files,
    humanise_bytes(archive.stats.size),
    archive.stats.directories,
    archive.stats.links,
    job.name
  );
  Ok(BackupReport {
    name: job.name,
    stats: archive.stats,
    receipt,
  })
}

/// Best effort: files that are already gone, or cannot be removed, are
/// only logged.
pub fn cleanup(paths: &[&Path]) {
  for path in paths {
    match fs::remove_file(path) {
      Ok(()) => debug!("Removed {:?}", path),
      Err(e) => debug!("Could not remove {:?}: {}", path, e),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::config::AwsConfig;
  use async_trait::async_trait;
  use chrono::NaiveDate;
  use std::sync::Mutex;

  #[derive(Debug, Clone)]
  pub(crate) struct UploadCall {
    pub file: PathBuf,
    pub target: UploadTarget,
    pub contents: Vec<u8>,
  }

  #[derive(Default)]
  pub(crate) struct RecordingUploader {
    pub calls: Mutex<Vec<UploadCall>>,
    pub fail: bool,
  }

  #[async_trait]
  impl Uploader for RecordingUploader {
    async fn upload(&self, file: &Path, target: &UploadTarget) -> Result<UploadReceipt> {
      let contents = fs::read(file)?;
      let size = contents.len() as u64;
      self.calls.lock().unwrap().push(UploadCall {
        file: file.to_path_buf(),
        target: target.clone(),
        contents,
      });
      if self.fail {
        anyhow::bail!("upload refused");
      }
      Ok(UploadReceipt {
        backend: target.backend,
        container: target.container.clone(),
        remote_id: "remote-1".to_string(),
        size,
      })
    }
  }

  /// Prefixes the plaintext with a marker, strips it on decrypt.
  #[derive(Default)]
  pub(crate) struct MarkerCipher {
    pub encrypted: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub decrypted: Mutex<Vec<(PathBuf, PathBuf)>>,
  }

  pub(crate) const MARKER: &[u8] = b"ENCRYPTED:";

  impl Cipher for MarkerCipher {
    fn encrypt_file(&self, source: &Path, dest: &Path) -> Result<()> {
      let mut data = MARKER.to_vec();
      data.extend(fs::read(source)?);
      fs::write(dest, data)?;
      self.encrypted.lock().unwrap().push((source.to_path_buf(), dest.to_path_buf()));
      Ok(())
    }

    fn decrypt_file(&self, source: &Path, dest: &Path) -> Result<()> {
      let data = fs::read(source)?;
      let plain = data.strip_prefix(MARKER).ok_or_else(|| anyhow::anyhow!("not encrypted"))?;
      fs::write(dest, plain)?;
      self.decrypted.lock().unwrap().push((source.to_path_buf(), dest.to_path_buf()));
      Ok(())
    }
  }

  pub(crate) fn test_config(temp_dir: &Path) -> Config {
    Config {
      temp_dir: Some(temp_dir.to_path_buf()),
      aws: AwsConfig {
        aws_bucket_name: Some("my-bucket".to_string()),
        aws_vault_name: Some("my-vault".to_string()),
        ..Default::default()
      },
      ..Default::default()
    }
  }

  fn demo_folder(root: &Path) -> PathBuf {
    let demo = root.join("demo");
    fs::create_dir(&demo).unwrap();
    fs::write(demo.join("readme.txt"), "hello backup").unwrap();
    demo
  }

  fn request(folder: &Path, encrypt: bool, backend: Backend) -> BackupRequest {
    BackupRequest {
      folder: folder.to_string_lossy().into_owned(),
      encrypt,
      backend,
    }
  }

  fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
  }

  #[test]
  fn job_naming() {
    let at = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
    let req = BackupRequest { folder: "/home/user/data".to_string(), encrypt: false, backend: Backend::ArchivalStorage };
    let job = BackupJob::new(&req, at).unwrap();
    assert_eq!(job.source, PathBuf::from("/home/user/data/"));
    assert_eq!(job.base_name, "data");
    assert_eq!(job.name, "data-2024-01-02-03-04-05");

    let req = BackupRequest { folder: "/".to_string(), ..req };
    assert_eq!(BackupJob::new(&req, at).unwrap().name, "root-2024-01-02-03-04-05");
  }

  #[tokio::test]
  async fn empty_folder_fails_before_any_work() {
    let temp = tempfile::tempdir().unwrap();
    let config = test_config(temp.path());
    let uploader = RecordingUploader::default();
    let cipher = MarkerCipher::default();
    let req = BackupRequest { folder: String::new(), encrypt: true, backend: Backend::ObjectStorage };

    let err = run_backup(&req, &config, &cipher, &uploader).await.unwrap_err();
    assert!(matches!(
      err.downcast_ref::<BoupyError>(),
      Some(BoupyError::MissingArgument(Argument::Folder))
    ));
    assert_eq!(entries(temp.path()), 0);
    assert!(uploader.calls.lock().unwrap().is_empty());
    assert!(cipher.encrypted.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn plain_backup_to_archival_storage() {
    let temp = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let demo = demo_folder(source.path());
    let config = test_config(temp.path());
    let uploader = RecordingUploader::default();
    let cipher = MarkerCipher::default();

    let report = run_backup(&request(&demo, false, Backend::ArchivalStorage), &config, &cipher, &uploader)
      .await
      .unwrap();

    let calls = uploader.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].file, temp.path().join(format!("{}.tar.gz", report.name)));
    assert_eq!(calls[0].target, UploadTarget { backend: Backend::ArchivalStorage, container: "my-vault".to_string() });
    assert!(report.name.starts_with("demo-"));
    assert_eq!(report.stats.files, 1);
    assert_eq!(&calls[0].contents[..2], &[0x1f, 0x8b]);
    assert!(cipher.encrypted.lock().unwrap().is_empty());
    assert!(!calls[0].file.exists());
    assert_eq!(entries(temp.path()), 0);
  }

  #[tokio::test]
  async fn encrypted_backup_to_object_storage() {
    let temp = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let demo = demo_folder(source.path());
    let config = test_config(temp.path());
    let uploader = RecordingUploader::default();
    let cipher = MarkerCipher::default();

    let report = run_backup(&request(&demo, true, Backend::ObjectStorage), &config, &cipher, &uploader)
      .await
      .unwrap();

    let archive_path = temp.path().join(format!("{}.tar.gz", report.name));
    let encrypted_path = temp.path().join(&report.name);
    let calls = uploader.calls.lock().unwrap();
    assert_eq!(calls[0].file, encrypted_path);
    assert_eq!(calls[0].target.container, "my-bucket");
    assert!(calls[0].contents.starts_with(MARKER));
    assert_eq!(*cipher.encrypted.lock().unwrap(), vec![(archive_path.clone(), encrypted_path.clone())]);
    assert!(!archive_path.exists());
    assert!(!encrypted_path.exists());
  }

  #[tokio::test]
  async fn failed_upload_still_cleans_up() {
    let temp = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let demo = demo_folder(source.path());
    let config = test_config(temp.path());
    let uploader = RecordingUploader { fail: true, ..Default::default() };
    let cipher = MarkerCipher::default();

    let err = run_backup(&request(&demo, true, Backend::ArchivalStorage), &config, &cipher, &uploader)
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "upload refused");
    assert_eq!(uploader.calls.lock().unwrap().len(), 1);
    assert_eq!(entries(temp.path()), 0);
  }

  #[tokio::test]
  async fn missing_source_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let config = test_config(temp.path());
    let uploader = RecordingUploader::default();
    let missing = temp.path().join("nope");

    let err = run_backup(&request(&missing, false, Backend::ArchivalStorage), &config, &MarkerCipher::default(), &uploader)
      .await
      .unwrap_err();
    assert!(matches!(err.downcast_ref::<BoupyError>(), Some(BoupyError::SourceNotFound(_))));
    assert_eq!(entries(temp.path()), 0);
  }

  #[tokio::test]
  async fn missing_container_setting_stops_before_archiving() {
    let temp = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let demo = demo_folder(source.path());
    let config = Config { temp_dir: Some(temp.path().to_path_buf()), ..Default::default() };

    let err = run_backup(&request(&demo, false, Backend::ObjectStorage), &config, &MarkerCipher::default(), &RecordingUploader::default())
      .await
      .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<BoupyError>(),
      Some(BoupyError::MissingSetting("aws.aws_bucket_name"))
    ));
    assert_eq!(entries(temp.path()), 0);
  }

  #[test]
  fn cleanup_twice_is_harmless() {
    let temp = tempfile::tempdir().unwrap();
    let a = temp.path().join("a.tar.gz");
    let b = temp.path().join("a");
    fs::write(&a, "x").unwrap();
    fs::write(&b, "y").unwrap();

    cleanup(&[&a, &b]);
    cleanup(&[&a, &b]);
    assert!(!a.exists() && !b.exists());
  }
}
