//! Sending driver: splits one file across unidirectional streams and drives
//!  the send loop until every stream is terminal.

use qudp::config::{TransportConfig, PORT_RECEIVER, PORT_SENDER};
use qudp::connection::QuicConnection;
use qudp::packet_header::ConnectionId;
use qudp::stream_id::{Direction, Initiator};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

const DEFAULT_FILE_PATH: &str = "payload.bin";
const DEFAULT_FILE_SIZE_KB: usize = 477;

/// make sure there is something to transfer
fn ensure_payload_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        info!("creating {} with {} KiB of filler", path, DEFAULT_FILE_SIZE_KB);
        std::fs::write(path, vec![b'I'; DEFAULT_FILE_SIZE_KB * 1024])?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let path = std::env::args().nth(1)
        .unwrap_or_else(|| DEFAULT_FILE_PATH.to_string());
    ensure_payload_file(&path)?;
    let data = std::fs::read(&path)?;

    let config = TransportConfig::default_loopback();
    let max_streams = config.max_streams;

    let local_addr: SocketAddr = format!("127.0.0.1:{}", PORT_SENDER).parse()?;
    let peer_addr: SocketAddr = format!("127.0.0.1:{}", PORT_RECEIVER).parse()?;

    let connection = QuicConnection::connect(
        ConnectionId::from_raw(0),
        local_addr,
        peer_addr,
        Initiator::Client,
        config,
    ).await?;

    for _ in 0..max_streams {
        let stream_id = connection.open_stream(Direction::Unidirectional).await?;
        connection.write(stream_id, &data).await?;
        connection.finish_stream(stream_id).await?;
        info!("queued {} bytes on stream {}", data.len(), stream_id);
    }

    connection.run_send_loop().await;
    connection.close();

    let stats = connection.stats().await;
    println!("sent {} bytes in {} packets over {:.3} seconds",
             stats.total_bytes_sent(), stats.packets_sent, stats.elapsed.as_secs_f64());
    println!("  rate: {:.0} bytes/second, {:.1} packets/second",
             stats.send_byte_rate(), stats.send_packet_rate());

    Ok(())
}
