use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use std::path::Path;
use std::process;
use std::time::Duration;
use vigilant_eye::config::EngineConfig;
use vigilant_eye::html::{parse_document, parse_fragment, to_html};
use vigilant_eye::publisher::{ChannelSink, LogSink, OutboundMessage};
use vigilant_eye::rules::RuleSet;
use vigilant_eye::runtime::EngineRuntime;
use vigilant_eye::session::EngineSession;

#[tokio::main]
async fn main() {
    let matches = Command::new("vigilant-eye")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing detection and threat scoring for web pages")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("vigilant-eye.yaml"),
        )
        .arg(
            Arg::new("rules")
                .short('r')
                .long("rules")
                .value_name("FILE")
                .help("Rule source (JSON or YAML), overrides the configured path"),
        )
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("URL the page was served from"),
        )
        .arg(
            Arg::new("scan")
                .long("scan")
                .value_name("FILE")
                .help("Scan an HTML page and print the assessment"),
        )
        .arg(
            Arg::new("inject")
                .long("inject")
                .value_name("FILE")
                .help("HTML fragment appended to the page after the initial scan")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("FILE")
                .help("Write the marked-up page after scanning"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file"),
        )
        .arg(
            Arg::new("generate-rules")
                .long("generate-rules")
                .value_name("FILE")
                .help("Generate a starter rule source"),
        )
        .arg(
            Arg::new("test-rules")
                .long("test-rules")
                .help("Load and compile the rule source, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match EngineConfig::default().to_file(path) {
            Ok(()) => println!("Default configuration written to: {path}"),
            Err(e) => {
                eprintln!("Error writing configuration: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(path) = matches.get_one::<String>("generate-rules") {
        if let Err(e) = write_default_rules(path) {
            eprintln!("Error writing rules: {e}");
            process::exit(1);
        }
        println!("Starter rules written to: {path}");
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("vigilant-eye.yaml");
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };
    if let Some(rules) = matches.get_one::<String>("rules") {
        config.rules_path = rules.clone();
    }
    if let Some(url) = matches.get_one::<String>("url") {
        config.page_url = Some(url.clone());
    }

    if matches.get_flag("test-rules") {
        test_rules(&config.rules_path);
        return;
    }

    if let Some(page) = matches.get_one::<String>("scan") {
        let fragments: Vec<String> = matches
            .get_many::<String>("inject")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let output = matches.get_one::<String>("output");
        if let Err(e) = scan_page(&config, page, &fragments, output.map(String::as_str)).await {
            eprintln!("Scan failed: {e:#}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do. Use --scan FILE, --test-rules or --help.");
    process::exit(2);
}

fn load_config(path: &str) -> anyhow::Result<EngineConfig> {
    if Path::new(path).exists() {
        log::debug!("Loading configuration from {path}");
        EngineConfig::from_file(path)
    } else {
        log::debug!("No configuration at {path}, using defaults");
        Ok(EngineConfig::default())
    }
}

fn write_default_rules(path: &str) -> anyhow::Result<()> {
    let source = RuleSet::default_source();
    let content = if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::to_string(&source)?
    } else {
        serde_json::to_string_pretty(&source)?
    };
    std::fs::write(path, content)?;
    Ok(())
}

fn test_rules(path: &str) {
    println!("Testing rules in {path}");
    match RuleSet::load(path) {
        Ok(rules) => {
            println!("  Keywords: {}", rules.keywords().len());
            println!("  Suspicious TLDs: {}", rules.suspicious_tlds().len());
            println!("  Sensitive field names: {}", rules.sensitive_field_names().len());
            println!("All keyword patterns compiled successfully.");
        }
        Err(e) => {
            println!("Rule validation failed: {e}");
            process::exit(1);
        }
    }
}

async fn scan_page(
    config: &EngineConfig,
    page: &str,
    fragments: &[String],
    output: Option<&str>,
) -> anyhow::Result<()> {
    let html = tokio::fs::read_to_string(page).await?;
    let mut injected = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        injected.push(tokio::fs::read_to_string(fragment).await?);
    }

    let mut session = EngineSession::boot(config).await?;
    let (sink, mut outbound) = ChannelSink::channel();
    session.add_sink(Box::new(sink));
    session.add_sink(Box::new(LogSink));

    let (runtime, handle) = EngineRuntime::new(session, parse_document(&html));
    let task = tokio::spawn(runtime.run());

    let has_fragments = !injected.is_empty();
    for fragment in injected {
        handle.edit(move |doc| {
            let body = doc.body();
            for node in parse_fragment(doc, &fragment) {
                doc.append_child(body, node);
            }
        });
    }
    if has_fragments {
        tokio::time::sleep(config.debounce() + Duration::from_millis(50)).await;
    }
    handle.tear_down();
    let (_session, document) = task.await?;

    let mut latest: Option<OutboundMessage> = None;
    while let Ok(message) = outbound.try_recv() {
        latest = Some(message);
    }
    if let Some(message) = latest {
        println!("{}", serde_json::to_string_pretty(&message)?);
    }

    if let Some(path) = output {
        tokio::fs::write(path, to_html(&document)).await?;
        log::info!("Marked-up page written to {path}");
    }
    Ok(())
}
