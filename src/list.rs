use chrono::DateTime;

use crate::upload_log::{UploadLog, UploadRecord};
use crate::utils::humanise_bytes;

pub async fn list_backups(log: &UploadLog, all: bool) -> anyhow::Result<()> {
  let records = log.list(all).await?;
  records.iter().for_each(|record| println!("{}", format_record(record)));
  Ok(())
}

pub fn format_record(record: &UploadRecord) -> String {
  let uploaded = DateTime::from_timestamp(record.uploaded_at, 0)
    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_default();
  let deleted = if record.deleted_at.is_some() { " (deleted)" } else { "" };
  format!(
    "{}  {}  {}:{}  {}  {}{}",
    uploaded, record.name, record.backend, record.container, record.remote_id, humanise_bytes(record.size.max(0) as u64), deleted
  )
}
