use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

mod collectors;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let cmd = Command::new("dash_exporter")
        .about("Cloud-managed network dashboard metric exporter for Prometheus")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(built_info::GIT_COMMIT_HASH.unwrap_or(env!("CARGO_PKG_VERSION")))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9823")
                .env("DASH_EXPORTER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("IP address to bind (defaults to IPv6 any, falling back to IPv4 any)")
                .env("DASH_EXPORTER_LISTEN")
                .value_name("IP"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Base URL of the dashboard API")
                .default_value("https://api.dashboard.example.com/api/v1")
                .env("DASH_EXPORTER_API_URL")
                .value_name("URL"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .help("Dashboard API key")
                .env("DASH_EXPORTER_API_KEY")
                .required(true)
                .value_name("KEY"),
        )
        .arg(
            Arg::new("api-timeout")
                .long("api-timeout")
                .help("Per-request timeout against the dashboard API, in seconds")
                .default_value("50")
                .env("DASH_EXPORTER_API_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("organizations")
                .long("organizations")
                .help("Comma-separated organization ids to collect (default: all visible)")
                .env("DASH_EXPORTER_ORGANIZATIONS")
                .value_name("O1,O2,...")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("interval-fast")
                .long("interval-fast")
                .help("Fast tier interval in seconds (statuses, uplinks)")
                .default_value("60")
                .env("DASH_EXPORTER_INTERVAL_FAST")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("interval-medium")
                .long("interval-medium")
                .help("Medium tier interval in seconds (inventory, clients)")
                .default_value("300")
                .env("DASH_EXPORTER_INTERVAL_MEDIUM")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("interval-slow")
                .long("interval-slow")
                .help("Slow tier interval in seconds (licensing)")
                .default_value("900")
                .env("DASH_EXPORTER_INTERVAL_SLOW")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("collector-timeout")
                .long("collector-timeout")
                .help("Soft ceiling for one collection pass, in seconds")
                .default_value("120")
                .env("DASH_EXPORTER_COLLECTOR_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("max-concurrent-requests")
                .long("max-concurrent-requests")
                .help("Ceiling on concurrent dashboard API requests across all collectors (0 disables)")
                .default_value("5")
                .env("DASH_EXPORTER_MAX_CONCURRENT_REQUESTS")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("client-ttl")
                .long("client-ttl")
                .help("Seconds before an unrefreshed network is evicted from the client store")
                .default_value("3600")
                .env("DASH_EXPORTER_CLIENT_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("discovery-ttl")
                .long("discovery-ttl")
                .help("Seconds before an unrefreshed network is evicted from the device directory")
                .default_value("3600")
                .env("DASH_EXPORTER_DISCOVERY_TTL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("webhook-enabled")
                .long("webhook-enabled")
                .help("Accept inbound webhook events on POST /webhook")
                .env("DASH_EXPORTER_WEBHOOK_ENABLED")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("webhook-secret")
                .long("webhook-secret")
                .help("Shared secret expected in webhook payloads")
                .env("DASH_EXPORTER_WEBHOOK_SECRET")
                .value_name("SECRET"),
        )
        .arg(
            Arg::new("webhook-require-secret")
                .long("webhook-require-secret")
                .help("Reject webhook payloads without a valid shared secret")
                .default_value("true")
                .env("DASH_EXPORTER_WEBHOOK_REQUIRE_SECRET")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new("webhook-max-body-bytes")
                .long("webhook-max-body-bytes")
                .help("Largest accepted webhook payload, in bytes")
                .default_value("65536")
                .env("DASH_EXPORTER_WEBHOOK_MAX_BODY_BYTES")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("trace-sample-rate")
                .long("trace-sample-rate")
                .help("Ratio of locally-rooted traces to sample (0.0 - 1.0)")
                .default_value("1.0")
                .env("DASH_EXPORTER_TRACE_SAMPLE_RATE")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        );

    collectors::add_collectors_args(cmd)
}
