use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use rpc_client::{ClientError, HttpClient, HttpClientOptions, Response, TcpClient};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Call a JSON-RPC 2.0 method on an rpc-dispatch server", long_about = None)]
struct Cli {
    #[command(flatten)]
    target: Target,

    /// Per-call timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Accept invalid TLS certificates (HTTPS only).
    #[arg(long)]
    insecure: bool,

    /// Method name.
    method: String,

    /// Parameters as a JSON document.
    #[arg(default_value = "{}")]
    params: String,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// HTTP(S) endpoint, e.g. http://127.0.0.1:8080/rpc
    #[arg(long)]
    http: Option<String>,

    /// TCP address, e.g. 127.0.0.1:9000
    #[arg(long)]
    tcp: Option<String>,

    /// Unix socket path.
    #[arg(long)]
    unix: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let params: Value = serde_json::from_str(&cli.params)?;
    let timeout = Duration::from_secs(cli.timeout);

    match call(&cli, &params, timeout).await {
        Ok(response) => print_response(&response),
        Err(ClientError::NoResponse) => {
            eprintln!("Server sent no response");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn call(cli: &Cli, params: &Value, timeout: Duration) -> Result<Response, ClientError> {
    if let Some(url) = &cli.target.http {
        let options = HttpClientOptions {
            insecure: cli.insecure,
            timeout,
        };
        return HttpClient::with_options(url, options)?
            .call_raw(&cli.method, params)
            .await;
    }
    if let Some(addr) = &cli.target.tcp {
        return TcpClient::new(addr.as_str())
            .with_timeout(timeout)
            .call_raw(&cli.method, params)
            .await;
    }
    match &cli.target.unix {
        #[cfg(unix)]
        Some(path) => {
            rpc_client::UnixClient::new(path)
                .with_timeout(timeout)
                .call_raw(&cli.method, params)
                .await
        }
        _ => Err(ClientError::InvalidEndpoint(
            "unix sockets are not supported on this platform".to_string(),
        )),
    }
}

fn print_response(response: &Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(error) = &response.error {
        eprintln!("Error {}: {}", error.code, error.message);
        if let Some(data) = &error.data {
            eprintln!("{}", serde_json::to_string_pretty(data)?);
        }
        std::process::exit(1);
    }

    let result = response.result.clone().unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
