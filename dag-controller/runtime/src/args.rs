use crate::{
    builder::Builder,
    cache::Cache,
    config::Config,
    log::{self, LogFormat},
    manifests,
    metrics::BuildMetrics,
    rebuild, report,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::{path::PathBuf, sync::Arc};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-dag",
    about = "Builds a routing DAG from Ingress and HTTPProxy resources"
)]
pub struct Args {
    #[clap(long, default_value = "ingress_dag=info,warn", env = "INGRESS_DAG_LOG")]
    log_level: String,

    #[clap(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    /// Path to the controller configuration file.
    #[clap(long, env = "INGRESS_DAG_CONFIG")]
    config: Option<PathBuf>,

    /// Ingress classes to serve, in addition to those in the configuration
    /// file.
    #[clap(long = "ingress-class-name")]
    ingress_class_names: Vec<String>,

    /// Prints build metrics after each report.
    #[clap(long)]
    print_metrics: bool,

    /// Exits after the first report.
    #[clap(long)]
    once: bool,

    /// Manifest files or directories to load. They are reloaded on SIGHUP.
    #[clap(required = true)]
    manifests: Vec<PathBuf>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            config,
            ingress_class_names,
            print_metrics,
            once,
            manifests,
        } = self;

        log::init(&log_level, log_format)?;

        let config = match config {
            Some(path) => Config::load(&path)?,
            None => Config::default(),
        };
        let mut classes = config.ingress_class_names.clone();
        classes.extend(ingress_class_names);
        classes.sort();
        classes.dedup();

        let builder = Builder::new(config.defaults()?);
        info!(
            processors = ?builder.processors().collect::<Vec<_>>(),
            ingress_classes = ?classes,
            "Configured builder"
        );

        let mut prom = Registry::default();
        let metrics = BuildMetrics::register(prom.sub_registry_with_prefix("dag"));

        let cache = load(&classes, &manifests)?;
        let (snapshots_tx, snapshots_rx) = watch::channel(Arc::new(cache));
        let (builds_tx, mut builds_rx) = watch::channel(None);
        let rebuild = tokio::spawn(
            rebuild::run(
                move |cache: &Cache| builder.build(cache),
                snapshots_rx,
                builds_tx,
                metrics,
            )
            .instrument(info_span!("rebuild")),
        );

        let mut hangup = signal(SignalKind::hangup())?;
        loop {
            tokio::select! {
                res = builds_rx.changed() => {
                    if res.is_err() {
                        bail!("rebuild task terminated");
                    }
                    let Some(build) = builds_rx.borrow_and_update().clone() else {
                        continue;
                    };
                    report::write(&build, std::io::stdout().lock())?;
                    if print_metrics {
                        let mut text = String::new();
                        encode(&mut text, &prom)?;
                        print!("{text}");
                    }
                    if once {
                        break;
                    }
                }

                _ = hangup.recv() => {
                    info!("Reloading manifests");
                    match load(&classes, &manifests) {
                        Ok(cache) => {
                            snapshots_tx.send_replace(Arc::new(cache));
                        }
                        Err(error) => warn!(%error, "Failed to reload manifests"),
                    }
                }

                res = tokio::signal::ctrl_c() => {
                    res?;
                    info!("Shutting down");
                    break;
                }
            }
        }

        drop(snapshots_tx);
        rebuild.await?;
        Ok(())
    }
}

fn load(classes: &[String], paths: &[PathBuf]) -> Result<Cache, manifests::ManifestError> {
    let (cache, loaded) = manifests::load(classes.to_vec(), paths)?;
    info!(
        applied = loaded.applied,
        skipped = loaded.skipped,
        "Loaded manifests"
    );
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "ingress-dag",
            "--ingress-class-name",
            "public",
            "--ingress-class-name=internal",
            "--log-format",
            "json",
            "--once",
            "manifests/",
        ])
        .unwrap();
        assert_eq!(args.ingress_class_names, vec!["public", "internal"]);
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(args.once);
        assert!(!args.print_metrics);
        assert_eq!(args.manifests, vec![PathBuf::from("manifests/")]);

        assert!(Args::try_parse_from(["ingress-dag"]).is_err());
    }
}
