// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Proteus server entrypoint.
//!
//! Binds the HTTP surface, hydrates the session registry from the persisted snapshot
//! (or scans the store root when none exists), and runs the expiration sweeper until
//! shutdown. Configuration comes from the environment (`OUTPUT_DIR`, `SESSION_FILE`,
//! `EXPIRATION_TIME`, `SWEEP_INTERVAL`, `PUBLIC_BASE_URL`, `GS_BINARY`) with CLI
//! overrides.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use proteus::config::Config;
use proteus::convert::Ghostscript;
use proteus::server::{router, App};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--port <port>] [--output-dir <dir>] [--session-file <path>]\n           [--ttl <seconds>] [--sweep-interval <seconds>]\n           [--min-session-id-len <len>] [--durable-writes]\n\nServes the conversion API on 0.0.0.0:<port> (default 5000).\n\nEnvironment: OUTPUT_DIR, SESSION_FILE, EXPIRATION_TIME, SWEEP_INTERVAL,\nPUBLIC_BASE_URL, GS_BINARY. Flags take precedence over the environment.\n\n--durable-writes opts into slower, best-effort durable persistence (fsync/sync where supported)."
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    port: Option<u16>,
    output_dir: Option<String>,
    session_file: Option<String>,
    ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    min_session_id_len: Option<usize>,
    durable_writes: bool,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.port = Some(raw.parse().map_err(|_| ())?);
            }
            "--output-dir" => {
                if options.output_dir.is_some() {
                    return Err(());
                }
                options.output_dir = Some(args.next().ok_or(())?);
            }
            "--session-file" => {
                if options.session_file.is_some() {
                    return Err(());
                }
                options.session_file = Some(args.next().ok_or(())?);
            }
            "--ttl" => {
                if options.ttl_seconds.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.ttl_seconds = Some(raw.parse().map_err(|_| ())?);
            }
            "--sweep-interval" => {
                if options.sweep_interval_seconds.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.sweep_interval_seconds = Some(raw.parse().map_err(|_| ())?);
            }
            "--min-session-id-len" => {
                if options.min_session_id_len.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.min_session_id_len = Some(raw.parse().map_err(|_| ())?);
            }
            "--durable-writes" => {
                if options.durable_writes {
                    return Err(());
                }
                options.durable_writes = true;
            }
            _ => return Err(()),
        }
    }

    Ok(options)
}

fn apply_overrides(config: &mut Config, options: &CliOptions) {
    if let Some(port) = options.port {
        config.port = port;
    }
    if let Some(dir) = &options.output_dir {
        config.output_dir = dir.into();
    }
    if let Some(path) = &options.session_file {
        config.index_path = path.into();
    }
    if let Some(ttl) = options.ttl_seconds {
        config.session_ttl_seconds = ttl;
    }
    if let Some(seconds) = options.sweep_interval_seconds {
        config.sweep_interval = Duration::from_secs(seconds);
    }
    if let Some(len) = options.min_session_id_len {
        config.min_session_id_len = len;
    }
    config.durable_writes = options.durable_writes;
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "proteus".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();

        let mut config = Config::from_env();
        apply_overrides(&mut config, &options);

        let app = App::new(config.clone(), Arc::new(Ghostscript::from_env()));
        app.init_from_disk()?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
            tracing::info!(port = config.port, output_dir = %config.output_dir.display(), "listening");

            let shutdown_token = CancellationToken::new();
            let sweeper_handle =
                tokio::spawn(app.sweeper().run(config.sweep_interval, shutdown_token.clone()));

            let serve_shutdown = shutdown_token.clone();
            axum::serve(listener, router(app.clone()))
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    serve_shutdown.cancel();
                })
                .await?;

            shutdown_token.cancel();
            let _ = sweeper_handle.await;
            app.final_flush();
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("proteus: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_options, CliOptions};

    #[test]
    fn parses_empty_args() {
        let options = parse_options(std::iter::empty()).expect("parse options");
        assert_eq!(options, CliOptions::default());
    }

    #[test]
    fn parses_port_and_dirs() {
        let options = parse_options(
            [
                "--port".to_owned(),
                "8080".to_owned(),
                "--output-dir".to_owned(),
                "converted".to_owned(),
                "--session-file".to_owned(),
                "data/sessions.json".to_owned(),
            ]
            .into_iter(),
        )
        .expect("parse options");
        assert_eq!(options.port, Some(8080));
        assert_eq!(options.output_dir.as_deref(), Some("converted"));
        assert_eq!(options.session_file.as_deref(), Some("data/sessions.json"));
        assert!(!options.durable_writes);
    }

    #[test]
    fn parses_timing_flags() {
        let options = parse_options(
            [
                "--ttl".to_owned(),
                "120".to_owned(),
                "--sweep-interval".to_owned(),
                "30".to_owned(),
                "--min-session-id-len".to_owned(),
                "16".to_owned(),
            ]
            .into_iter(),
        )
        .expect("parse options");
        assert_eq!(options.ttl_seconds, Some(120));
        assert_eq!(options.sweep_interval_seconds, Some(30));
        assert_eq!(options.min_session_id_len, Some(16));
    }

    #[test]
    fn parses_durable_writes() {
        let options =
            parse_options(["--durable-writes".to_owned()].into_iter()).expect("parse options");
        assert!(options.durable_writes);
    }

    #[test]
    fn rejects_unknown_args() {
        parse_options(["--nope".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_duplicate_flags() {
        parse_options(
            ["--port".to_owned(), "1".to_owned(), "--port".to_owned(), "2".to_owned()].into_iter(),
        )
        .unwrap_err();

        parse_options(
            ["--durable-writes".to_owned(), "--durable-writes".to_owned()].into_iter(),
        )
        .unwrap_err();
    }

    #[test]
    fn rejects_missing_values() {
        parse_options(["--port".to_owned()].into_iter()).unwrap_err();
        parse_options(["--output-dir".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_unparseable_numbers() {
        parse_options(["--port".to_owned(), "not-a-port".to_owned()].into_iter()).unwrap_err();
        parse_options(["--ttl".to_owned(), "soon".to_owned()].into_iter()).unwrap_err();
    }
}
