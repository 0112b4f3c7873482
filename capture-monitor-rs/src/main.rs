// Lambda entry point for the data capture monitor

use std::sync::Arc;

use capture_monitor::handler::{handle_invocation, HandlerResponse, MonitorContext};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::info;
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load environment variables
    dotenv::dotenv().ok();

    let ctx = Arc::new(MonitorContext::from_env().await?);
    info!("capture-monitor {} ready", env!("CARGO_PKG_VERSION"));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let ctx = Arc::clone(&ctx);
        async move { Ok::<HandlerResponse, Error>(handle_invocation(&ctx, event.payload).await) }
    }))
    .await
}
