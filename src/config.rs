use crate::services::{gateway_service::GatewaySettings, remote_store::S3Settings};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use std::{env, time::Duration};

/// Longest TTL a presigned S3 URL may carry (7 days).
const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Bucket name used by the memory backend when none is configured.
const LOCAL_BUCKET: &str = "local-bucket";

/// Which object store implementation backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Amazon S3 or an S3-compatible endpoint.
    S3,
    /// In-process store; contents are lost on exit.
    Memory,
}

impl Backend {
    fn parse(value: &str) -> Result<Self> {
        <Backend as ValueEnum>::from_str(value, true)
            .map_err(|_| anyhow!("unknown backend `{}` (expected s3 or memory)", value))
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub public_base_url: String,
    pub download_ttl: Duration,
    pub upload_ttl: Duration,
    pub backend_timeout: Duration,
    pub max_in_flight: usize,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Blob storage gateway in front of an S3 bucket")]
pub struct Args {
    /// Host to bind to (overrides BLOB_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_GATEWAY_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides BLOB_GATEWAY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bucket name (overrides S3_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// AWS region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint, e.g. MinIO (overrides AWS_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Base of public object URLs (overrides BLOB_GATEWAY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Download URL lifetime in seconds (overrides BLOB_GATEWAY_DOWNLOAD_TTL_SECS)
    #[arg(long)]
    pub download_ttl_secs: Option<u64>,

    /// Upload URL lifetime in seconds (overrides BLOB_GATEWAY_UPLOAD_TTL_SECS)
    #[arg(long)]
    pub upload_ttl_secs: Option<u64>,

    /// Timeout for each object store call (overrides BLOB_GATEWAY_BACKEND_TIMEOUT_MS)
    #[arg(long)]
    pub backend_timeout_ms: Option<u64>,

    /// Concurrent metadata fetches per listing (overrides BLOB_GATEWAY_MAX_IN_FLIGHT)
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Largest proxied upload in bytes (overrides BLOB_GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge `args` over the variables visible through `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };
        let parsed = |name: &str| -> Result<Option<u64>> {
            var(name)?
                .map(|value| {
                    value
                        .parse::<u64>()
                        .with_context(|| format!("parsing {} value `{}`", name, value))
                })
                .transpose()
        };

        // --- Environment fallback ---
        let env_host = var("BLOB_GATEWAY_HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let port_var = match var("BLOB_GATEWAY_PORT")? {
            Some(_) => "BLOB_GATEWAY_PORT",
            None => "PORT",
        };
        let env_port = match var(port_var)? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing {} value `{}`", port_var, value))?,
            None => 3000,
        };
        let env_backend = var("BLOB_GATEWAY_BACKEND")?
            .map(|value| Backend::parse(&value))
            .transpose()?
            .unwrap_or(Backend::S3);

        // --- Merge ---
        let backend = args.backend.unwrap_or(env_backend);
        let bucket = match (args.bucket.or(var("S3_BUCKET")?), backend) {
            (Some(bucket), _) => bucket,
            (None, Backend::Memory) => LOCAL_BUCKET.to_string(),
            (None, Backend::S3) => {
                bail!("S3_BUCKET (or --bucket) is required for the s3 backend")
            }
        };
        let public_base_url = args
            .public_base_url
            .or(var("BLOB_GATEWAY_PUBLIC_BASE_URL")?)
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket));

        let download_ttl = Duration::from_secs(
            args.download_ttl_secs
                .or(parsed("BLOB_GATEWAY_DOWNLOAD_TTL_SECS")?)
                .unwrap_or(3600),
        );
        let upload_ttl = Duration::from_secs(
            args.upload_ttl_secs
                .or(parsed("BLOB_GATEWAY_UPLOAD_TTL_SECS")?)
                .unwrap_or(900),
        );
        let backend_timeout = Duration::from_millis(
            args.backend_timeout_ms
                .or(parsed("BLOB_GATEWAY_BACKEND_TIMEOUT_MS")?)
                .unwrap_or(10_000),
        );
        let max_in_flight = args
            .max_in_flight
            .or(parsed("BLOB_GATEWAY_MAX_IN_FLIGHT")?.map(|v| v as usize))
            .unwrap_or(16);
        let max_upload_bytes = args
            .max_upload_bytes
            .or(parsed("BLOB_GATEWAY_MAX_UPLOAD_BYTES")?.map(|v| v as usize))
            .unwrap_or(5 * 1024 * 1024);

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend,
            bucket,
            region: args.region.or(var("AWS_REGION")?),
            endpoint: args.endpoint.or(var("AWS_ENDPOINT_URL")?),
            public_base_url,
            download_ttl,
            upload_ttl,
            backend_timeout,
            max_in_flight,
            max_upload_bytes,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        validate_ttl("download TTL", self.download_ttl)?;
        validate_ttl("upload TTL", self.upload_ttl)?;
        if self.backend_timeout.is_zero() {
            bail!("backend timeout must be greater than zero");
        }
        if self.max_in_flight == 0 {
            bail!("max in-flight metadata fetches must be at least 1");
        }
        if self.max_upload_bytes == 0 {
            bail!("max upload size must be greater than zero");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            public_base_url: self.public_base_url.clone(),
            download_ttl: self.download_ttl,
            upload_ttl: self.upload_ttl,
            backend_timeout: self.backend_timeout,
            max_in_flight: self.max_in_flight,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Presigned URLs must live for a non-zero time of at most 7 days.
fn validate_ttl(what: &str, ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        bail!("{} must be greater than zero", what);
    }
    if ttl > MAX_PRESIGN_TTL {
        bail!(
            "{} of {:?} exceeds the maximum of {:?}",
            what,
            ttl,
            MAX_PRESIGN_TTL
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(args: Args, vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::resolve(args, |name| {
            vars.get(name).cloned().ok_or(env::VarError::NotPresent)
        })
    }

    #[test]
    fn test_defaults_with_bucket() {
        let cfg = resolve(Args::default(), &[("S3_BUCKET", "media")]).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.backend, Backend::S3);
        assert_eq!(cfg.bucket, "media");
        assert_eq!(cfg.public_base_url, "https://media.s3.amazonaws.com");
        assert_eq!(cfg.download_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.upload_ttl, Duration::from_secs(900));
        assert_eq!(cfg.backend_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_in_flight, 16);
        assert_eq!(cfg.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_s3_requires_bucket() {
        let err = resolve(Args::default(), &[]).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn test_memory_backend_has_default_bucket() {
        let cfg = resolve(Args::default(), &[("BLOB_GATEWAY_BACKEND", "Memory")]).unwrap();
        assert_eq!(cfg.backend, Backend::Memory);
        assert_eq!(cfg.bucket, LOCAL_BUCKET);
    }

    #[test]
    fn test_args_override_env() {
        let args = Args {
            port: Some(8080),
            download_ttl_secs: Some(60),
            bucket: Some("from-args".into()),
            ..Default::default()
        };
        let cfg = resolve(
            args,
            &[
                ("S3_BUCKET", "from-env"),
                ("BLOB_GATEWAY_PORT", "9000"),
                ("BLOB_GATEWAY_DOWNLOAD_TTL_SECS", "120"),
                ("BLOB_GATEWAY_UPLOAD_TTL_SECS", "300"),
                ("PORT", "7000"),
            ],
        )
        .unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.bucket, "from-args");
        assert_eq!(cfg.download_ttl, Duration::from_secs(60));
        assert_eq!(cfg.upload_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_port_falls_back_to_generic_var() {
        let cfg = resolve(Args::default(), &[("S3_BUCKET", "b"), ("PORT", "4000")]).unwrap();
        assert_eq!(cfg.port, 4000);
    }

    #[test]
    fn test_bad_numbers_name_the_variable() {
        let err = resolve(
            Args::default(),
            &[("S3_BUCKET", "b"), ("BLOB_GATEWAY_MAX_IN_FLIGHT", "lots")],
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("BLOB_GATEWAY_MAX_IN_FLIGHT"));
    }

    #[test]
    fn test_ttl_bounds_are_enforced() {
        let zero = Args {
            upload_ttl_secs: Some(0),
            ..Default::default()
        };
        assert!(resolve(zero, &[("S3_BUCKET", "b")]).is_err());

        let eight_days = Args {
            download_ttl_secs: Some(8 * 24 * 60 * 60),
            ..Default::default()
        };
        assert!(resolve(eight_days, &[("S3_BUCKET", "b")]).is_err());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let args = Args {
            max_in_flight: Some(0),
            ..Default::default()
        };
        assert!(resolve(args, &[("S3_BUCKET", "b")]).is_err());
    }
}
