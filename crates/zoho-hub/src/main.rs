use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

use zoho_hub::{
    ConfigManager, Connection, FileTokenStore, Method, OAuthRefresher, Target, TokenStorage,
};

const USAGE: &str = "usage: zoho-hub <get|post|put|delete> <path> [json-params] [--invoice]";

/// One request, as given on the command line
#[derive(Debug)]
struct Args {
    method: Method,
    path: String,
    params: Value,
    target: Target,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut target = Target::Crm;
    let mut positional = Vec::new();
    for arg in args {
        if arg == "--invoice" {
            target = Target::Invoice;
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let method = match positional.next().context(USAGE)?.to_ascii_lowercase().as_str() {
        "get" => Method::GET,
        "post" => Method::POST,
        "put" => Method::PUT,
        "delete" => Method::DELETE,
        other => anyhow::bail!("unknown method '{other}'\n{USAGE}"),
    };
    let path = positional.next().context(USAGE)?;
    let params = match positional.next() {
        Some(raw) => serde_json::from_str(&raw).context("params must be valid JSON")?,
        None => Value::Object(serde_json::Map::new()),
    };
    if positional.next().is_some() {
        anyhow::bail!("too many arguments\n{USAGE}");
    }

    Ok(Args {
        method,
        path,
        params,
        target,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let config = ConfigManager::new()?.get();
    zoho_hub::logging::init(config.debug);

    let store = Arc::new(FileTokenStore::new()?);
    let token = store
        .load()
        .await
        .context("No stored token; write token.json to the zoho-hub config directory")?;
    let refresher = OAuthRefresher::from_config(&config)
        .context("client_id and client_secret are needed to refresh tokens")?;

    let connection = Connection::new(&config, token.to_credentials(), Arc::new(refresher))?
        .with_credential_sink(store);

    tracing::debug!("{} {} ({})", args.method, args.path, args.target);
    let body = connection
        .request(args.method, args.target, &args.path, &args.params)
        .await?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
