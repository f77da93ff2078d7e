use std::env;
use std::process;
use std::time::Duration;

use getopts::{Matches, Options};

use zonemirror::dns::client::{probe_master, AxfrTransferClient};
use zonemirror::sync::context::{SyncConfig, SyncContext};
use zonemirror::sync::orchestrator;
use zonemirror::sync::provider::HttpZoneProvider;

/// Timeout for the zone transfer connection and reads
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for provider API calls
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn opt_or_env(matches: &Matches, opt: &str, env_name: &str) -> String {
    matches
        .opt_str(opt)
        .or_else(|| env::var(env_name).ok())
        .unwrap_or_default()
}

fn flag_or_env(matches: &Matches, opt: &str, env_name: &str) -> bool {
    matches.opt_present(opt)
        || env::var(env_name)
            .map(|value| value == "True" || value == "true" || value == "1")
            .unwrap_or(false)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Main entry point for the zonemirror run
fn main() {
    simple_logger::init().expect("Failed to initialize logger");

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "d",
        "domains",
        "Comma separated source domains to mirror",
        "DOMAINS",
    );
    opts.optopt(
        "m",
        "masters",
        "Comma separated candidate master servers",
        "SERVERS",
    );
    opts.optopt("z", "zone-id", "Identifier of the hosted target zone", "ID");
    opts.optopt("n", "zone-name", "Origin name of the hosted target zone", "NAME");
    opts.optopt(
        "s",
        "serial-record",
        "Relative name of the serial marker record",
        "NAME",
    );
    opts.optopt(
        "e",
        "endpoint",
        "Base URL of the hosted zone provider API",
        "URL",
    );
    opts.optflag("", "dry-run", "Log the change batch instead of submitting it");
    opts.optflag(
        "",
        "ignore-ttl",
        "Tolerate TTL drift on otherwise equal record sets",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&program, opts);
            process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let config = SyncConfig {
        domains: split_list(&opt_or_env(&matches, "d", "ZONEMIRROR_DOMAINS")),
        masters: split_list(&opt_or_env(&matches, "m", "ZONEMIRROR_MASTERS")),
        zone_id: opt_or_env(&matches, "z", "ZONEMIRROR_ZONE_ID"),
        zone_name: opt_or_env(&matches, "n", "ZONEMIRROR_ZONE_NAME"),
        serial_record: opt_or_env(&matches, "s", "ZONEMIRROR_SERIAL_RECORD"),
        provider_endpoint: opt_or_env(&matches, "e", "ZONEMIRROR_PROVIDER_ENDPOINT"),
        dry_run: flag_or_env(&matches, "dry-run", "ZONEMIRROR_DRY_RUN"),
        ignore_ttl: flag_or_env(&matches, "ignore-ttl", "ZONEMIRROR_IGNORE_TTL"),
    };

    if let Err(e) = config.validate() {
        log::error!("{}", e);
        print_usage(&program, opts);
        process::exit(1);
    }

    let master = match probe_master(&config.masters, &config.domains[0]) {
        Some(master) => master,
        None => {
            log::error!("no master server answered the liveness probe");
            process::exit(1);
        }
    };

    let provider = match HttpZoneProvider::new(&config.provider_endpoint, PROVIDER_TIMEOUT) {
        Ok(provider) => provider,
        Err(e) => {
            log::error!("cannot build provider client: {}", e);
            process::exit(1);
        }
    };

    let context = SyncContext::new(
        config,
        Box::new(AxfrTransferClient::new(master, TRANSFER_TIMEOUT)),
        Box::new(provider),
    );

    if let Err(e) = orchestrator::run(&context) {
        log::error!("mirror run failed: {}", e);
        process::exit(1);
    }

    log::info!("mirror run complete");
}
