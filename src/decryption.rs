use std::io::{self, Write};
use std::path::Path;

extern crate sequoia_openpgp as openpgp;
extern crate anyhow;

use openpgp::crypto::{Password, SessionKey};
use openpgp::types::SymmetricAlgorithm;
use openpgp::parse::{Parse, stream::*};
use openpgp::policy::StandardPolicy as P;
use log::trace;

/// Supplies the session key from password-encrypted (SKESK) packets.
/// Messages are not expected to be signed.
struct Helper<'a> {
    password: &'a Password,
}

pub fn decrypt_file(source: &Path, sink: &mut (dyn Write + Send + Sync), password: &Password) -> openpgp::Result<()> {
    let policy = P::new();
    let helper = Helper { password };

    let mut decryptor = DecryptorBuilder::from_file(source)?
        .with_policy(&policy, None, helper)?;

    io::copy(&mut decryptor, sink)?;

    Ok(())
}

impl<'a> VerificationHelper for Helper<'a> {
    fn get_certs(&mut self, _ids: &[openpgp::KeyHandle])
                       -> openpgp::Result<Vec<openpgp::Cert>> {
        Ok(Vec::new())
    }

    fn check(&mut self, structure: MessageStructure)
             -> openpgp::Result<()> {
        for layer in structure.iter() {
            match layer {
                MessageLayer::Compression { algo } =>
                    trace!("Compressed using {}", algo),
                MessageLayer::Encryption { sym_algo, aead_algo } =>
                    if let Some(aead_algo) = aead_algo {
                        trace!("Encrypted and protected using {}/{}",
                                    sym_algo, aead_algo);
                    } else {
                        trace!("Encrypted using {}", sym_algo);
                    },
                MessageLayer::SignatureGroup { .. } =>
                    trace!("Ignoring signature group"),
            }
        }
        Ok(())
    }
}

impl<'a> DecryptionHelper for Helper<'a> {
    fn decrypt<D>(&mut self,
                  _pkesks: &[openpgp::packet::PKESK],
                  skesks: &[openpgp::packet::SKESK],
                  _sym_algo: Option<SymmetricAlgorithm>,
                  mut decrypt: D)
                  -> openpgp::Result<Option<openpgp::Fingerprint>>
        where D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool
    {
        for skesk in skesks {
            if let Ok((algo, session_key)) = skesk.decrypt(self.password) {
                if decrypt(algo, &session_key) {
                    return Ok(None);
                }
            }
        }
        Err(anyhow::anyhow!("No password-encrypted session key matched"))
    }
}
