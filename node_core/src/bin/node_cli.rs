use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command};
use node_core::config::NodeConfig;
use node_core::logging::{self, LoggingConfig};
use node_core::node::{LocalNode, demo_state};
use node_rpc::CallContext;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("node_cli")
        .version("1.0")
        .about("Calls node services on an in-process demo node")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON config file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable verbose logging")
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write logs to this file")
                .value_name("FILE")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("call")
                .about("Issue one unary call and print the JSON response")
                .arg(
                    Arg::new("method")
                        .help("<Service>/<Method>, e.g. NodeService/GetNodeInfo, or a full path")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("request")
                        .help("JSON request body; defaults to the empty message")
                        .index(2),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help("Call timeout in milliseconds")
                        .value_name("MS")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("list").about("List registered services and methods"))
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    logging::init(LoggingConfig::new(
        matches.get_one::<String>("log-file").map(PathBuf::from),
        true,
        level,
    ))?;

    let config = match matches.get_one::<String>("config") {
        Some(path) => NodeConfig::from_json_file(&PathBuf::from(path))?,
        None => NodeConfig::default(),
    };
    debug!(?config, "Using config");
    let node = LocalNode::start(config, Arc::new(demo_state()?))?;

    match matches.subcommand() {
        Some(("list", _)) => {
            for service in node.dispatcher().services() {
                println!("{service}");
                for method in node.dispatcher().methods(service).unwrap_or_default() {
                    println!("  /{service}/{method}");
                }
            }
        }
        Some(("call", call)) => {
            let method = call
                .get_one::<String>("method")
                .ok_or("a method is required")?;
            let request = call
                .get_one::<String>("request")
                .map(String::as_str)
                .unwrap_or("");
            let mut ctx = CallContext::new();
            if let Some(timeout) = call.get_one::<u64>("timeout") {
                ctx = ctx.with_timeout(Duration::from_millis(*timeout));
            }

            info!("Calling {method}");
            match node.call_json(&ctx, method, request).await {
                Ok(response) => println!("{response}"),
                Err(error) => {
                    match error.status() {
                        Some(status) => eprintln!("{}: {}", status.code(), status.message()),
                        None => eprintln!("{}", snafu::Report::from_error(error)),
                    }
                    node.shutdown();
                    std::process::exit(1);
                }
            }
        }
        _ => unreachable!("subcommand is required"),
    }

    node.shutdown();
    Ok(())
}
