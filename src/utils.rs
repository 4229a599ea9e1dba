use std::future::Future;
use std::time::Duration;

pub fn humanise_bytes(b: u64) -> String {
  if b > 1024*1024*1024 {
    format!("{:.2}GiB", (b as f64) / (1024.0*1024.0*1024.0))
  } else if b > 1024*1024 {
    format!("{:.2}MiB", (b as f64) / (1024.0*1024.0))
  } else if b > 1024 {
    format!("{:.2}KiB", (b as f64) / 1024.0)
  } else {
    format!("{} bytes", b)
  }
}

/// Runs a gateway call, failing it once `limit` elapses. No limit means
/// wait forever.
pub async fn with_timeout<T, F>(limit: Option<Duration>, what: &str, call: F) -> anyhow::Result<T>
  where F: Future<Output = anyhow::Result<T>>
{
  match limit {
    Some(limit) => tokio::time::timeout(limit, call)
      .await
      .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", what, limit))?,
    None => call.await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn humanises() {
    assert_eq!(humanise_bytes(12), "12 bytes");
    assert_eq!(humanise_bytes(2048), "2.00KiB");
    assert_eq!(humanise_bytes(3 * 1024 * 1024 + 1), "3.00MiB");
  }

  #[tokio::test]
  async fn times_out() {
    let slow = async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(())
    };
    let err = with_timeout(Some(Duration::from_millis(10)), "upload", slow).await.unwrap_err();
    assert!(err.to_string().starts_with("upload timed out"));
  }

  #[tokio::test]
  async fn no_limit_waits() {
    assert_eq!(with_timeout(None, "download", async { Ok(7) }).await.unwrap(), 7);
  }
}
