use std::io;
use std::fs;
use std::path::Path;
use sha2::{Sha256, Digest};

/// Hex SHA-256 of a file's contents, recorded alongside every upload.
pub fn file_sha256(path: &Path) -> io::Result<String> {
  let mut hasher = Sha256::new();
  let mut file = fs::File::open(path)?;
  io::copy(&mut file, &mut hasher)?;
  Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn digest_of_known_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abc");
    fs::write(&path, "abc").unwrap();
    assert_eq!(
      file_sha256(&path).unwrap(),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }
}
