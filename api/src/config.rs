use clap::Parser;
use std::{fmt, net::SocketAddr, time::Duration};

use crate::ca::{IdentitySource, MaterialSource};

#[derive(Clone, Parser)]
#[command(name = "gcipher-api", version, about = "Minimal certificate authority service")]
pub struct GcipherConfig {
    #[clap(
        short,
        long,
        env = "GCIPHER_BIND_ADDR",
        default_value = "0.0.0.0:8080"
    )]
    pub bind_addr: SocketAddr,

    /// Print the OpenAPI document and exit.
    #[clap(long, default_value_t = false)]
    pub dump_openapi: bool,

    /// MongoDB connection string. Without one, records are kept in memory
    /// and lost on restart.
    #[clap(long, env = "GCIPHER_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Root CA certificate (PEM), as a path or an `http(s)://` URL.
    #[clap(long, env = "GCIPHER_CA_CERT", default_value = "ca.crt")]
    pub ca_cert: MaterialSource,

    /// Root CA private key (PKCS#8, PKCS#1 or SEC1 PEM), as a path or an
    /// `http(s)://` URL.
    #[clap(long, env = "GCIPHER_CA_KEY", default_value = "ca.key")]
    pub ca_key: MaterialSource,

    /// Passphrase for an `ENCRYPTED PRIVATE KEY` root key.
    #[clap(long, env = "GCIPHER_CA_KEY_PASSPHRASE", hide_env_values = true)]
    pub ca_key_passphrase: Option<String>,

    /// Intermediate CA certificate. When set, the intermediate signs all
    /// certificates and revocation lists.
    #[clap(long, env = "GCIPHER_INTERMEDIATE_CERT", requires = "intermediate_key")]
    pub intermediate_cert: Option<MaterialSource>,

    #[clap(long, env = "GCIPHER_INTERMEDIATE_KEY", requires = "intermediate_cert")]
    pub intermediate_key: Option<MaterialSource>,

    #[clap(
        long,
        env = "GCIPHER_INTERMEDIATE_KEY_PASSPHRASE",
        hide_env_values = true
    )]
    pub intermediate_key_passphrase: Option<String>,

    /// Lifetime in days of certificates requested without one.
    #[clap(
        long,
        env = "GCIPHER_CERTIFICATE_LIFETIME_DEFAULT",
        default_value_t = 365,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub certificate_lifetime_default: u32,

    /// Seconds between revocation list generations.
    #[clap(
        long,
        env = "GCIPHER_CRL_INTERVAL_SECS",
        default_value_t = 86400,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub crl_interval_secs: u64,
}

impl GcipherConfig {
    pub fn root_identity(&self) -> IdentitySource {
        IdentitySource {
            cert: self.ca_cert.clone(),
            key: self.ca_key.clone(),
            passphrase: self.ca_key_passphrase.clone(),
        }
    }

    pub fn intermediate_identity(&self) -> Option<IdentitySource> {
        match (&self.intermediate_cert, &self.intermediate_key) {
            (Some(cert), Some(key)) => Some(IdentitySource {
                cert: cert.clone(),
                key: key.clone(),
                passphrase: self.intermediate_key_passphrase.clone(),
            }),
            _ => None,
        }
    }

    pub fn crl_interval(&self) -> Duration {
        Duration::from_secs(self.crl_interval_secs)
    }
}

impl fmt::Debug for GcipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcipherConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database_url.as_ref().map(|_| "<configured>"))
            .field("ca_cert", &self.ca_cert)
            .field("ca_key", &self.ca_key)
            .field("intermediate_cert", &self.intermediate_cert)
            .field("intermediate_key", &self.intermediate_key)
            .field("certificate_lifetime_default", &self.certificate_lifetime_default)
            .field("crl_interval_secs", &self.crl_interval_secs)
            .finish_non_exhaustive()
    }
}
