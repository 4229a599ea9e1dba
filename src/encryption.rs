use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

extern crate sequoia_openpgp as openpgp;

use anyhow::Context;
use log::info;
use openpgp::crypto::Password;
use openpgp::serialize::stream::*;

use crate::decryption;
use crate::error::BoupyError;

/// Encrypts and decrypts whole files. Backups and restores only ever
/// see this trait.
pub trait Cipher: Send + Sync {
    fn encrypt_file(&self, source: &Path, dest: &Path) -> anyhow::Result<()>;
    fn decrypt_file(&self, source: &Path, dest: &Path) -> anyhow::Result<()>;
}

/// OpenPGP symmetric encryption keyed by the first line of a password file.
pub struct PasswordCipher {
    password_file: Option<PathBuf>,
}

impl PasswordCipher {
    pub fn new(password_file: Option<PathBuf>) -> PasswordCipher {
        PasswordCipher { password_file }
    }

    // Read at the moment of use so that unencrypted runs never need the file.
    fn password(&self) -> anyhow::Result<Password> {
        let path = self
            .password_file
            .as_ref()
            .ok_or(BoupyError::MissingSetting("password_file"))?;
        let content = fs::read_to_string(path).with_context(|| format!("reading password file {:?}", path))?;
        let password = content.lines().next().unwrap_or_default().trim_end();
        if password.is_empty() {
            anyhow::bail!("password file {:?} is empty", path);
        }
        Ok(password.into())
    }
}

impl Cipher for PasswordCipher {
    fn encrypt_file(&self, source: &Path, dest: &Path) -> anyhow::Result<()> {
        let password = self.password()?;
        let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut source_file = File::open(source).with_context(|| format!("opening {:?}", source))?;
        let mut dest_file = File::create(dest).with_context(|| format!("creating {:?}", dest))?;
        encrypt(&mut source_file, &mut dest_file, password, &name)?;
        info!("Encrypted {:?} to {:?}", source, dest);
        Ok(())
    }

    fn decrypt_file(&self, source: &Path, dest: &Path) -> anyhow::Result<()> {
        let password = self.password()?;
        let mut dest_file = File::create(dest).with_context(|| format!("creating {:?}", dest))?;
        decryption::decrypt_file(source, &mut dest_file, &password)
            .with_context(|| format!("decrypting {:?}", source))?;
        info!("Decrypted {:?} to {:?}", source, dest);
        Ok(())
    }
}

/// Encrypts the given message.
fn encrypt(source: &mut (dyn Read), sink: &mut (dyn Write + Send + Sync),
          password: Password, name: &str)
    -> openpgp::Result<()>
{
    // Start streaming an OpenPGP message.
    let message = Message::new(sink);

    let message = Encryptor::with_passwords(message, Some(password))
        .build()?;

    // The payload is already gzip, so no Compressor layer.
    let mut message = LiteralWriter::new(message)
      .filename(name)?
      .build()?;

    io::copy(source, &mut message)?;

    // Finalize the OpenPGP message to make sure that all data is
    // written.
    message.finalize()?;

    Ok(())
}
