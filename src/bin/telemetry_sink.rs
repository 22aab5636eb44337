// src/bin/telemetry_sink.rs - Bench listener that prints incoming location telemetry
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Accept tracker connections and print each telemetry chunk")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:4399")]
    bind: String,

    /// Print each `;`-terminated entry on its own line.
    #[arg(long)]
    split: bool,
}

async fn serve(mut stream: TcpStream, split: bool) -> Result<()> {
    let peer = stream.peer_addr()?;
    info!(%peer, "tracker connected");

    let mut buf = vec![0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = String::from_utf8_lossy(&buf[..n]);
        let stamp = Local::now().format("%H:%M:%S%.3f");
        if split {
            for entry in chunk.split_terminator(';') {
                println!("{stamp} {peer} {entry}");
            }
        } else {
            println!("{stamp} {peer} {chunk}");
        }
    }

    info!(%peer, "tracker disconnected");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, _) = listener.accept().await?;
        let split = args.split;
        tokio::spawn(async move {
            if let Err(e) = serve(stream, split).await {
                warn!("connection ended with error: {e:#}");
            }
        });
    }
}
