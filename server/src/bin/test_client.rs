use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use server::broadcast::into_message;
use shared::{decode_binary, decode_text, ClientEvent, Codec, ServerEvent};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Scripted client that registers and wanders around
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3001")]
    server: String,

    /// Display name to register with
    #[arg(short, long, default_value = "test-bot")]
    name: String,

    /// Display color, server picks one when omitted
    #[arg(short, long)]
    color: Option<String>,

    /// Number of moves to send before disconnecting
    #[arg(long, default_value = "10")]
    steps: u32,

    /// Send bincode binary frames instead of JSON text
    #[arg(long)]
    binary: bool,
}

fn decode(message: Message) -> Option<ServerEvent> {
    match message {
        Message::Text(text) => decode_text(text.as_str()).ok(),
        Message::Binary(bytes) => decode_binary(&bytes[..]).ok(),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let codec = if args.binary { Codec::Binary } else { Codec::Json };

    let url = format!("ws://{}/", args.server);
    println!("Connecting to {}", url);
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let register = ClientEvent::SetName {
        name: args.name.clone(),
        color: args.color.clone(),
    };
    sink.send(into_message(codec.encode(&register)?)).await?;

    let mut rng = rand::thread_rng();
    let (mut x, mut z) = (0.0f32, 0.0f32);

    for step in 0..args.steps {
        // Drain whatever arrived since the last move
        while let Ok(Some(Ok(message))) = timeout(Duration::from_millis(50), stream.next()).await {
            match decode(message) {
                Some(ServerEvent::Welcome { id }) => println!("Assigned connection id {}", id),
                Some(ServerEvent::UserList(participants)) => {
                    println!("userList ({} participants)", participants.len());
                    for p in participants {
                        println!(
                            "  {} '{}' {} at ({:.2}, {:.2}, {:.2})",
                            p.id, p.name, p.color, p.x, p.y, p.z
                        );
                    }
                }
                Some(ServerEvent::Rejected { reason }) => println!("Rejected: {}", reason),
                None => {}
            }
        }

        x += rng.gen_range(-1.0f32..=1.0);
        z += rng.gen_range(-1.0f32..=1.0);
        let step_event = ClientEvent::Move { x, y: None, z };
        println!("Step {}: moving to ({:.2}, {:.2})", step + 1, x, z);
        sink.send(into_message(codec.encode(&step_event)?)).await?;

        sleep(Duration::from_millis(500)).await;
    }

    sink.send(Message::Close(None)).await?;
    println!("Test client finished");

    Ok(())
}
