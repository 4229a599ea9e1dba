use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressFinish, ProgressStyle};
use log::info;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stores the body at `url` verbatim in `dest`, returning its length.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub struct HttpDownloader {
    client: reqwest::Client,
    multi_progress: MultiProgress,
}

impl HttpDownloader {
    pub fn new(timeout: Option<Duration>, multi_progress: MultiProgress) -> Result<HttpDownloader> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpDownloader {
            client: builder.build()?,
            multi_progress,
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?
            .error_for_status()?;

        let style = ProgressStyle::with_template(
            "{prefix:.bold.dim} [{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes}",
        )?
        .progress_chars("#>-");
        let pb = self
            .multi_progress
            .add(ProgressBar::new(response.content_length().unwrap_or(0)))
            .with_finish(ProgressFinish::AndClear);
        pb.set_style(style);
        pb.set_prefix("[Download]");
        pb.set_message(url.to_string());

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("creating {:?}", dest))?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("reading body of {}", url))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            pb.inc(chunk.len() as u64);
        }
        file.flush().await?;
        pb.finish_and_clear();

        info!("Downloaded {} ({} bytes) to {:?}", url, written, dest);
        Ok(written)
    }
}
