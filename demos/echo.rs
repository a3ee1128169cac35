use smart_socket_rs::{
    EventKind, HeartbeatOptions, Message, SmartSocket, SmartSocketOptions, SocketEvent,
    WebSocketFactory,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_socket_rs=debug,info".into()),
        )
        .init();

    let url = std::env::var("ECHO_URL").unwrap_or_else(|_| "wss://echo.websocket.org".to_string());
    println!("📡 Connecting to: {}\n", url);

    let socket = SmartSocket::new(
        &url,
        SmartSocketOptions {
            heartbeat: HeartbeatOptions {
                interval: Duration::from_secs(5),
                timeout: Duration::from_secs(2),
                message: Some(Message::Text("ping".to_string())),
                enabled: true,
            },
            ..Default::default()
        },
        WebSocketFactory,
    )?;

    for kind in EventKind::ALL {
        socket.subscribe(kind, |event| match event {
            SocketEvent::Message(message) => println!("📨 {:?}", message),
            SocketEvent::Close(info) => println!("🔌 closed: {} '{}'", info.code, info.reason),
            SocketEvent::Reconnect(retry) => println!("🔁 reconnect #{}", retry),
            other => println!("• {}", other.kind()),
        });
    }

    // Sent before the handshake completes, so these go through the buffer
    socket.send("hello")?;
    socket.send(vec![0xde, 0xad, 0xbe, 0xef])?;

    println!("⏳ Waiting 12 seconds to observe heartbeats...\n");
    tokio::time::sleep(Duration::from_secs(12)).await;
    if let Some(latency) = socket.latency() {
        println!("\n⏱️  Last heartbeat latency: {:?}", latency);
    }

    socket.disconnect(None, Some("demo finished"))?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("✅ Final state: {}", socket.state());

    Ok(())
}
