use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use netsweep::{
    config::Options,
    output::{OutputConfig, OutputFormat, OutputManager},
    ping::PingerKind,
    scanner::ScanSession,
};
use std::process;
use std::time::Duration;

fn build_cli() -> Command {
    Command::new("netsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ping every host of a subnet concurrently and report latency and loss")
        .arg(
            Arg::new("subnet")
                .value_name("SUBNET")
                .help("Network subnet to sweep, in CIDR notation (e.g. 192.168.0.0/24)")
                .index(1),
        )
        .arg(
            Arg::new("count")
                .short('c')
                .long("count")
                .value_name("COUNT")
                .help("Number of ping attempts for each IP address [default: 3]")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("jobs")
                .short('n')
                .long("jobs")
                .value_name("JOBS")
                .help("Maximum concurrent ping workers [default: number of CPUs]")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Maximum ping duration per host in milliseconds, 0 for none [default: 300]")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MS")
                .help("Delay between ping attempts in milliseconds [default: 0]")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("pinger")
                .long("pinger")
                .value_name("TYPE")
                .help("Pinger implementation; auto uses mock under CI")
                .value_parser(["real", "mock", "auto"]),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Load options from a TOML file instead of ~/.netsweep.toml"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Output format")
                .value_parser(["table", "json"])
                .default_value("table"),
        )
        .arg(
            Arg::new("output-file")
                .long("output-file")
                .value_name("FILE")
                .help("Write results to a file instead of stdout"),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .help("List offline hosts as well")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (error, warn, info, debug, trace)")
                .value_parser(["error", "warn", "info", "debug", "trace"]),
        )
}

/// Config file first, command line flags on top
fn resolve_options(matches: &ArgMatches) -> netsweep::Result<Options> {
    let mut options = match matches.get_one::<String>("config") {
        Some(path) => Options::from_toml_file(path)?,
        None => Options::load_default(),
    };

    if let Some(subnet) = matches.get_one::<String>("subnet") {
        options.subnet = subnet.clone();
    }
    if let Some(&count) = matches.get_one::<i64>("count") {
        options.count = count;
    }
    if let Some(&jobs) = matches.get_one::<i64>("jobs") {
        options.max_workers = jobs;
    }
    if let Some(&timeout) = matches.get_one::<i64>("timeout") {
        options.timeout_ms = timeout;
    }
    if let Some(&interval) = matches.get_one::<i64>("interval") {
        options.interval_ms = interval;
    }
    if let Some(pinger) = matches.get_one::<String>("pinger") {
        options.pinger = pinger
            .parse::<PingerKind>()
            .map_err(netsweep::SweepError::Config)?;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        options.log_level = Some(level.clone());
    }

    Ok(options)
}

fn log_level(matches: &ArgMatches, options: &Options) -> String {
    match matches.get_count("verbose") {
        0 => options
            .log_level
            .clone()
            .unwrap_or_else(|| "error".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "[!]".bright_red(), message);
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let options = match resolve_options(&matches) {
        Ok(options) => options,
        Err(e) => fail(e),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(&matches, &options)),
    )
    .init();

    let format = matches
        .get_one::<String>("output")
        .and_then(|f| f.parse::<OutputFormat>().ok())
        .unwrap_or(OutputFormat::Table);
    let colored = !matches.get_flag("no-color");
    if !colored {
        colored::control::set_override(false);
    }

    let mut session = match ScanSession::from_options(&options) {
        Ok(session) => session,
        Err(e) => fail(e),
    };

    log::info!(
        "Sweeping {} with {} workers using the {} pinger",
        session.subnet(),
        session.max_workers(),
        session.pinger_name()
    );

    let spinner = (format == OutputFormat::Table).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Pinging {} hosts...", session.subnet().host_count()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let run_result = session.run().await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if let Err(e) = run_result {
        fail(e);
    }

    let manager = OutputManager::new(OutputConfig {
        format,
        file: matches.get_one::<String>("output-file").cloned(),
        colored,
        show_offline: matches.get_flag("all"),
    });

    if let Err(e) = manager.write_results(&session) {
        fail(format!("Failed to write results: {}", e));
    }
}
