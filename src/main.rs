//! listing-monitor binary entrypoint.
//!
//! Loads settings from the environment (and `.env`), prints a short summary and
//! hands control to the detection loop, which runs until the process is killed.

use listing_monitor::{ConfigError, Monitor, MonitorConfig, VERSION};
use listing_monitor::config::settings::ENV_TARGET_URL;

const URL_PREVIEW_CHARS: usize = 50;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!();
    println!("╔══════════════════════════════════════╗");
    println!("║        LISTING MONITOR v{VERSION:<13}║");
    println!("╚══════════════════════════════════════╝");
    println!();

    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            print_guidance(&err);
            return;
        }
    };

    let mut monitor = Monitor::builder(config).build();
    print_summary(&monitor);

    monitor.run().await;
}

fn print_guidance(err: &ConfigError) {
    eprintln!("[ERROR] {err}");
    if let ConfigError::Missing(var) = err {
        eprintln!("   - {var}");
        if *var == ENV_TARGET_URL {
            eprintln!("   set it to the search results page you want to watch");
        }
    }
    eprintln!();
    eprintln!("[TIP] Create a .env file based on .env.example");
}

fn print_summary(monitor: &Monitor) {
    let config = monitor.config();
    let url: String = config
        .target_url
        .as_str()
        .chars()
        .take(URL_PREVIEW_CHARS)
        .collect();

    println!("[CONFIG]");
    println!("   Polling Interval: {}s", config.timing.poll_interval.as_secs());
    println!(
        "   Webhook:          {}",
        if monitor.notifications_enabled() { "Enabled" } else { "Disabled" }
    );
    println!("   Proxies:          {}", monitor.proxies().len());
    println!("   Known Items:      {}", monitor.store().len());
    println!("   Search URL:       {url}...");
    println!();
}
