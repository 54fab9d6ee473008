//! Receiving driver: runs the receive loop until the socket timeout signals
//!  the end of the connection, then writes each completed stream to
//!  `<stream_id>.out` and prints throughput statistics.

use qudp::config::{TransportConfig, PORT_RECEIVER, PORT_SENDER};
use qudp::connection::QuicConnection;
use qudp::packet_header::ConnectionId;
use qudp::stream_id::Initiator;
use std::net::SocketAddr;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let local_addr: SocketAddr = format!("127.0.0.1:{}", PORT_RECEIVER).parse()?;
    let peer_addr: SocketAddr = format!("127.0.0.1:{}", PORT_SENDER).parse()?;

    let connection = QuicConnection::connect(
        ConnectionId::from_raw(0),
        local_addr,
        peer_addr,
        Initiator::Server,
        TransportConfig::default_loopback(),
    ).await?;

    connection.run_recv_loop().await?;
    connection.close();

    for stream_id in connection.stream_ids().await {
        if !connection.is_stream_complete(stream_id).await? {
            warn!("stream {} did not complete", stream_id);
            continue;
        }
        let data = connection.read_available(stream_id).await?;
        let file_name = format!("{}.out", stream_id);
        std::fs::write(&file_name, &data)?;
        info!("wrote {} bytes of stream {} to {}", data.len(), stream_id, file_name);
    }

    let stats = connection.stats().await;
    for (stream_id, stream_stats) in &stats.per_stream {
        println!("STREAM #{}:", stream_id);
        println!("---------------- {} bytes total", stream_stats.bytes_received);
        println!("---------------- {} packets total", stream_stats.packets_received);
    }
    println!("received {} bytes in {} packets over {:.3} seconds",
             stats.total_bytes_received(), stats.packets_received, stats.elapsed.as_secs_f64());
    println!("  rate: {:.0} bytes/second, {:.1} packets/second",
             stats.receive_byte_rate(), stats.receive_packet_rate());
    println!("  dropped datagrams: {}, failed streams: {}",
             stats.dropped_datagrams, stats.stream_errors);

    Ok(())
}
