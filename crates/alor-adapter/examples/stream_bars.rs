/*
[INPUT]:  ALOR_REFRESH_TOKEN environment variable
[OUTPUT]: Closed one-minute bars printed to stdout
[POS]:    Examples - streaming subscription with reconnection
[UPDATE]: When the streaming API changes
*/

use std::sync::Arc;

use alor_adapter::*;
use tokio::time::{Duration, sleep};

/// Example: stream closed SBER minute bars from the demo environment
///
/// The connection is re-established automatically; the subscription is
/// replayed with its original id after every reconnect.
#[tokio::main]
async fn main() -> Result<()> {
    let refresh_token = std::env::var("ALOR_REFRESH_TOKEN")
        .map_err(|_| AlorError::Config("ALOR_REFRESH_TOKEN is not set".to_string()))?;

    let environment = Environment::Demo;
    let client = AlorClient::with_config(ClientConfig {
        environment,
        ..ClientConfig::default()
    })?;
    let auth: Arc<dyn TokenProvider> = Arc::new(AuthManager::new(client, &refresh_token));

    let ws = AlorWebSocket::new(StreamConfig::new(environment), auth);
    ws.add_lifecycle_listener(|event| println!("[lifecycle] {event}"));
    ws.add_listener(EventKind::NewBar, |event: &StreamEvent| {
        let bar: Bar = serde_json::from_value(event.data.clone())?;
        println!("[bar] {} close={} volume={}", bar.time, bar.close, bar.volume);
        Ok(())
    });

    let from = chrono::Utc::now().timestamp() - 3600;
    let id = ws
        .subscribe_bars(Exchange::Moex, "SBER", Timeframe::minutes(1), from, false, Format::Simple)
        .await?;
    println!("subscribed: {id}");

    sleep(Duration::from_secs(180)).await;

    ws.unsubscribe(&id).await?;
    ws.shutdown();
    ws.join().await;
    Ok(())
}
