mod input;

use anyhow::{Context, Result};
use clap::Parser;
use input::Expect;
use iot_shared::limits::SERVER_PORT;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Interactive client for the IoT device control server
#[derive(Parser, Debug)]
#[command(name = "iot-client", version, about)]
struct Cli {
    /// Server host name or address
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = SERVER_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("=== IoT Device Control Client ===");
    let stream = TcpStream::connect((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", cli.host, cli.port))?;
    let (mut reader, mut writer) = stream.into_split();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut expect = Expect::Command;
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read.context("connection error")?;
                if n == 0 {
                    println!("\nServer disconnected");
                    break;
                }
                let text = String::from_utf8_lossy(&buf[..n]);
                print!("{}", text);
                std::io::stdout().flush()?;
                expect = expect.after_server_text(&text);
            }
            line = stdin.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    writer.shutdown().await?;
                    continue;
                };
                match input::to_wire(&line, expect) {
                    Ok(out) => {
                        writer.write_all(out.wire.as_bytes()).await?;
                        if out.is_exit {
                            // Wait for the server to say goodbye and close
                            stdin_open = false;
                        }
                    }
                    Err(e) => {
                        println!("Invalid input ({})", e);
                        print!("Select: ");
                        std::io::stdout().flush()?;
                    }
                }
            }
        }
    }

    Ok(())
}
