use std::{fs::OpenOptions, io::Write, path::{Path, PathBuf}};

use anyhow::Context;
use clap::Parser;
use gcipher_api::ca;

#[derive(Clone, Parser)]
pub struct GenerateCaParams {
    /// Where to write the CA certificate (PEM).
    #[clap(long, default_value = "ca.crt")]
    pub cert_out: PathBuf,

    /// Where to write the CA private key (PKCS#8 PEM).
    #[clap(long, default_value = "ca.key")]
    pub key_out: PathBuf,

    #[clap(long, default_value = "gcipher root CA")]
    pub common_name: String,

    /// Validity of the CA certificate in days.
    #[clap(long, default_value_t = 3650)]
    pub days: u32,

    /// Replace existing files.
    #[clap(long, default_value_t = false)]
    pub force: bool,
}

fn write_file(path: &Path, contents: &str, mode: u32, force: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

pub fn generate_ca(params: GenerateCaParams) -> anyhow::Result<()> {
    let generated = ca::generate_ca(&params.common_name, params.days)?;

    write_file(&params.key_out, &generated.key_pem, 0o600, params.force)?;
    write_file(&params.cert_out, &generated.cert_pem, 0o644, params.force)?;

    println!(
        "Generated CA {} valid until {}\n  certificate: {}\n  key:         {}",
        generated.fingerprint,
        generated.not_after,
        params.cert_out.display(),
        params.key_out.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use gcipher_api::ca::SigningIdentity;

    use super::*;

    fn params(dir: &Path, force: bool) -> GenerateCaParams {
        GenerateCaParams {
            cert_out: dir.join("ca.crt"),
            key_out: dir.join("ca.key"),
            common_name: "ctl test CA".into(),
            days: 10,
            force,
        }
    }

    #[test]
    fn writes_loadable_ca_and_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("gcipherctl-ca-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        generate_ca(params(&dir, false)).unwrap();

        let cert = std::fs::read(dir.join("ca.crt")).unwrap();
        let key = std::fs::read(dir.join("ca.key")).unwrap();
        let identity = SigningIdentity::from_pem(&cert, &key, None).unwrap();
        assert!(identity.subject().contains("ctl test CA"));

        assert!(generate_ca(params(&dir, false)).is_err());
        generate_ca(params(&dir, true)).unwrap();
        assert_ne!(std::fs::read(dir.join("ca.crt")).unwrap(), cert);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
