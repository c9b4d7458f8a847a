use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use complaint_desk::cli::outputformatter::{notice_line, print_lines, use_color};
use complaint_desk::cli::{usage, App, Command};
use complaint_desk::config::ClientConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean on stdout.
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "complaint_desk".to_string() } else { args.remove(0) };
    let cmd = match Command::parse(&args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, usage(&program));
            std::process::exit(2);
        }
    };
    if cmd == Command::Help {
        println!("{}", usage(&program));
        return Ok(());
    }

    let config = ClientConfig::load().context("failed to load configuration")?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "complaint_desk",
        "complaint_desk starting: RUST_LOG='{}', api='{}', session_dir='{}', timeout_ms={}",
        rust_log,
        config.api_base_url,
        config.session_dir.display(),
        config.request_timeout_ms
    );

    let app = App::from_config(config)?;
    match app.run(cmd).await {
        Ok(lines) => {
            print_lines(&lines);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(target: "complaint_desk", "command failed: {} (http {})", e, e.http_status());
            eprintln!("{}", notice_line(&e.notice(), use_color()));
            std::process::exit(1);
        }
    }
}
