use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::MultiProgress;
use log::debug;

use crate::backup::{run_backup, BackupRequest};
use crate::config::Config;
use crate::download::HttpDownloader;
use crate::encryption::PasswordCipher;
use crate::list::list_backups;
use crate::restore::{run_restore, RestoreRequest, Restored};
use crate::storage::{AwsStorage, Backend};
use crate::upload_log::UploadLog;

#[derive(Debug, Parser)]
#[command(name = "boupy", version, about = "Back up folders to the cloud, and get them back")]
pub struct Cli {
    /// Read this config file instead of /etc/boupy/config.json or ~/.boupy/config.json
    #[arg(long, global = true, env = "BOUPY_CONFIG")]
    pub config: Option<PathBuf>,

    /// More output, repeat for even more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive a folder and upload it
    Up {
        /// Folder to back up (exits with 12 when missing)
        #[arg(default_value = "", hide_default_value = true)]
        folder: String,
        /// Encrypt the archive before uploading (Y or N)
        #[arg(long, value_name = "Y|N", default_value = "N", action = ArgAction::Set, value_parser = parse_yes)]
        encrypt: bool,
        /// Upload to S3 instead of Glacier (Y or N)
        #[arg(long = "upload_s3", value_name = "Y|N", default_value = "N", action = ArgAction::Set, value_parser = parse_yes)]
        upload_s3: bool,
    },
    /// Download a backup and restore it into a folder
    Down {
        /// Where to download the backup from (exits with 13 when missing)
        #[arg(default_value = "", hide_default_value = true)]
        url: String,
        /// Folder to restore into (exits with 14 when missing)
        #[arg(default_value = "", hide_default_value = true)]
        output_folder: String,
        /// The remote file is encrypted (Y or N)
        #[arg(long, value_name = "Y|N", default_value = "N", action = ArgAction::Set, value_parser = parse_yes)]
        isencrypt: bool,
        /// Unpack into the output folder; with N the tarball is moved there as is
        #[arg(long, value_name = "Y|N", default_value = "Y", action = ArgAction::Set, value_parser = parse_yes)]
        extract: bool,
    },
    /// List recorded uploads
    List {
        /// Include backups removed by retention
        #[arg(long)]
        all: bool,
    },
}

/// `Y`/`y` is yes, anything else is no.
pub fn parse_yes(value: &str) -> Result<bool, String> {
    Ok(matches!(value, "Y" | "y"))
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from(std::slice::from_ref(path))?,
            None => Config::load()?,
        };
        debug!("Temporary files go to {:?}", config.temp_dir());
        Ok(config)
    }
}

pub async fn dispatch(command: Command, config: &Config, multi_progress: &MultiProgress) -> Result<()> {
    match command {
        Command::Up { folder, encrypt, upload_s3 } => {
            let request = BackupRequest { folder, encrypt, backend: Backend::select(upload_s3) };
            request.validate()?;
            config.container_for(request.backend)?;
            let cipher = PasswordCipher::new(config.password_file.clone());
            let log = UploadLog::open(&config.database_path()?).await?;
            let storage = AwsStorage::new(config, log, multi_progress.clone()).await;
            let report = run_backup(&request, config, &cipher, &storage).await;
            storage.log().close().await;
            let report = report?;
            println!(
                "Uploaded {} to {} {} ({})",
                report.name, report.receipt.backend, report.receipt.container, report.receipt.remote_id
            );
        }
        Command::Down { url, output_folder, isencrypt, extract } => {
            let request = RestoreRequest { url, output_folder, encrypted: isencrypt, extract };
            request.validate()?;
            let cipher = PasswordCipher::new(config.password_file.clone());
            let downloader = HttpDownloader::new(config.timeout(), multi_progress.clone())?;
            match run_restore(&request, config, &cipher, &downloader).await? {
                Restored::Extracted(folder) => println!("Extracted into {}", folder.display()),
                Restored::Moved(file) => println!("Saved {}", file.display()),
            }
        }
        Command::List { all } => {
            let log = UploadLog::open(&config.database_path()?).await?;
            let listed = list_backups(&log, all).await;
            log.close().await;
            listed?;
        }
    }
    Ok(())
}
