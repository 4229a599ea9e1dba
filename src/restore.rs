use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::archive;
use crate::backup::cleanup;
use crate::config::Config;
use crate::download::Downloader;
use crate::encryption::Cipher;
use crate::error::{Argument, BoupyError};
use crate::naming;
use crate::utils::with_timeout;

#[derive(Debug, Clone)]
pub struct RestoreRequest {
  pub url: String,
  pub output_folder: String,
  pub encrypted: bool,
  /// Unpack into the output folder rather than just moving the tarball there.
  pub extract: bool,
}

impl RestoreRequest {
  pub fn validate(&self) -> Result<(), BoupyError> {
    if self.url.is_empty() {
      return Err(BoupyError::MissingArgument(Argument::Url));
    }
    if self.output_folder.is_empty() {
      return Err(BoupyError::MissingArgument(Argument::OutputFolder));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreJob {
  pub url: String,
  pub output_folder: PathBuf,
  /// Last segment of the URL.
  pub name: String,
  pub download_path: PathBuf,
  /// Set when the download has to be decrypted first.
  pub decrypted_path: Option<PathBuf>,
  pub extract: bool,
}

impl RestoreJob {
  pub fn new(request: &RestoreRequest, temp_dir: &Path) -> Result<RestoreJob, BoupyError> {
    request.validate()?;
    let name = naming::url_file_name(&request.url);
    let (download_path, decrypted_path) = if request.encrypted {
      (temp_dir.join(&name), Some(temp_dir.join(naming::decrypted_name(&name))))
    } else {
      (temp_dir.join(naming::with_archive_suffix(&name)), None)
    };
    Ok(RestoreJob {
      url: request.url.clone(),
      output_folder: PathBuf::from(&request.output_folder),
      name,
      download_path,
      decrypted_path,
      extract: request.extract,
    })
  }

  /// The plaintext tarball once download and decryption are done.
  pub fn archive_path(&self) -> &Path {
    self.decrypted_path.as_deref().unwrap_or(&self.download_path)
  }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Restored {
  Extracted(PathBuf),
  Moved(PathBuf),
}

/// Download, maybe decrypt, then place the result in the output folder.
pub async fn run_restore(
  request: &RestoreRequest,
  config: &Config,
  cipher: &dyn Cipher,
  downloader: &dyn Downloader,
) -> Result<Restored> {
  let job = RestoreJob::new(request, &config.temp_dir())?;

  let restored = async {
    with_timeout(config.timeout(), "download", downloader.download(&job.url, &job.download_path)).await?;
    if let Some(decrypted) = &job.decrypted_path {
      cipher.decrypt_file(&job.download_path, decrypted)?;
    }
    place(&job)
  }
  .await;

  let mut artifacts = vec![job.download_path.as_path()];
  artifacts.extend(job.decrypted_path.as_deref());
  cleanup(&artifacts);

  let restored = restored?;
  info!("Restored {} to {:?}", job.url, job.output_folder);
  Ok(restored)
}

fn place(job: &RestoreJob) -> Result<Restored> {
  let archive = job.archive_path();
  if job.extract {
    archive::extract_archive(archive, &job.output_folder)?;
    return Ok(Restored::Extracted(job.output_folder.clone()));
  }

  fs::create_dir_all(&job.output_folder).with_context(|| format!("creating {:?}", job.output_folder))?;
  let file_name = archive.file_name().context("archive has no file name")?;
  let destination = job.output_folder.join(file_name);
  move_file(archive, &destination)?;
  Ok(Restored::Moved(destination))
}

// rename does not cross filesystems, and the temp dir is often tmpfs.
fn move_file(from: &Path, to: &Path) -> Result<()> {
  if let Err(e) = fs::rename(from, to) {
    debug!("rename {:?} -> {:?} failed ({}), copying", from, to, e);
    fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))?;
    fs::remove_file(from)?;
  }
  Ok(())
}
