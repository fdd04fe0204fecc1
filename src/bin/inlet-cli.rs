use std::collections::BTreeMap;
use std::time::Duration;

use api_inlet::client::ApiClient;
use clap::{Parser, Subcommand};
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "inlet-cli")]
#[command(about = "Call APIs exposed by an api-inlet", long_about = None)]
struct Cli {
    /// Inlet endpoint, base path included
    #[arg(short, long, default_value = "http://localhost:8080/")]
    url: String,

    /// Header carrying the API name
    #[arg(long, default_value = "X-Api")]
    api_header: String,

    /// Advisory pipeline timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call one API with a JSON body
    Call {
        api: String,
        #[arg(default_value = "{}")]
        body: String,
    },
    /// Call several APIs at once; the body maps API names to request bodies
    Multi { body: String },
    /// Check that the inlet is up
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = ApiClient::new(Url::parse(&cli.url)?).api_header(cli.api_header);
    if let Some(ms) = cli.timeout_ms {
        client = client.call_timeout(Duration::from_millis(ms));
    }

    match cli.command {
        Commands::Call { api, body } => {
            let content: Value = serde_json::from_str(&body)?;
            match client.call(&api, &content).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => print_error(&e.to_api_error()),
            }
        }
        Commands::Multi { body } => {
            let calls: BTreeMap<String, Value> = serde_json::from_str(&body)?;
            match client.call_multi(&calls).await {
                Ok(outcomes) => {
                    for (api, outcome) in outcomes {
                        match outcome {
                            Ok(result) => println!("{api}: {}", serde_json::to_string_pretty(&result)?),
                            Err(e) => {
                                eprint!("{api}: ");
                                print_error(&e);
                            }
                        }
                    }
                }
                Err(e) => print_error(&e.to_api_error()),
            }
        }
        Commands::Ping => {
            if client.ping().await.unwrap_or(false) {
                println!("pong");
            } else {
                eprintln!("Error: inlet at {} is not answering", cli.url);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_error(err: &api_inlet::error::ApiError) {
    eprintln!("Error: [{}:{}] {} (id {})", err.namespace, err.code, err.message, err.id);
}
