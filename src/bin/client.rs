//! Interactive client for the prodigit server.
//!
//! Forwards stdin lines as request lines and prints each response.
//! `exit` (or end of input) ends the session.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "prodigit-client")]
#[command(about = "Interactive client for the digit-product server", long_about = None)]
struct CliArgs {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let stream = TcpStream::connect(&args.addr).await?;
    let (reader, mut writer) = stream.into_split();
    let mut responses = BufReader::new(reader);

    println!("Connected to {}", args.addr);
    println!("Enter a number N to find the smallest Q whose digit product is N");
    println!("Type 'exit' to quit");

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    let mut response = String::new();

    loop {
        input.clear();
        if stdin.read_line(&mut input).await? == 0 {
            // stdin closed: end the session cleanly.
            writer.write_all(b"exit\n").await?;
            break;
        }

        let request = input.trim();
        if request.is_empty() {
            continue;
        }

        writer.write_all(request.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        response.clear();
        if responses.read_line(&mut response).await? == 0 {
            println!("Server closed the connection");
            break;
        }
        let answer = response.trim_end();
        println!("Result: {}", answer);

        if request.eq_ignore_ascii_case("exit") {
            break;
        }
        if answer == "NO_SOLUTION" {
            println!("No natural number has digit product {}", request);
        }
    }

    Ok(())
}
