use anyhow::Context as _;
use futures::prelude::*;
use ssb_muxrpc::{transport, Body, CallHandler, MuxRpc, PacketStream, RequestType, StreamSender};
use std::sync::Arc;
use structopt::StructOpt;

#[async_std::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::from_args();
    args.command.run(args.options).await
}

/// Serve or call muxrpc methods over plain TCP
#[derive(StructOpt)]
#[structopt(name = "muxrpc-peer", max_term_width = 100)]
struct Cli {
    #[structopt(subcommand)]
    command: Command,

    #[structopt(flatten)]
    options: Options,
}

#[derive(StructOpt)]
struct Options {
    /// Address to listen on or to connect to
    #[structopt(long, default_value = "127.0.0.1:8009")]
    addr: String,
}

#[derive(StructOpt)]
enum Command {
    /// Run the test server
    Serve,
    Call(Call),
}

impl Command {
    async fn run(&self, options: Options) -> anyhow::Result<()> {
        match self {
            Self::Serve => ssb_muxrpc::test_server::run(options.addr).await,
            Self::Call(cmd) => cmd.run(options).await,
        }
    }
}

#[derive(StructOpt)]
/// Call a method and print the responses as JSON, one per line
///
/// For `sink` and `duplex` calls every line read from stdin is parsed as JSON
/// and sent to the server.
struct Call {
    /// Method path delimited with a dot (.)
    method: String,

    /// Arguments, each one a JSON value
    #[structopt(parse(try_from_str = serde_json::from_str))]
    args: Vec<serde_json::Value>,

    /// One of sync, async, source, sink or duplex
    #[structopt(long = "type", default_value = "async")]
    type_: RequestType,
}

impl Call {
    async fn run(&self, options: Options) -> anyhow::Result<()> {
        let stream = async_std::net::TcpStream::connect(&options.addr)
            .await
            .context(format!("Failed to connect to {}", &options.addr))?;
        let connection = Arc::new(PacketStream::new(transport::from_io(
            stream.clone(),
            stream,
        )));
        let mut rpc = MuxRpc::new();
        rpc.add_connection(Arc::clone(&connection));
        let rpc = Arc::new(rpc);
        let processing = Arc::clone(&rpc).spawn_processing();

        let call = rpc
            .call(&self.method, self.args.clone(), self.type_)
            .await
            .context("Failed to send request")?;
        match call {
            CallHandler::Response(response) => {
                if let Some(message) = response.get_response().await? {
                    print_body(&message.body)?;
                }
            }
            CallHandler::Source(source) => print_stream(source).await?,
            CallHandler::Sink(sink) => {
                send_stdin(&sink).await?;
            }
            CallHandler::Duplex(duplex) => {
                let (source, sink) = duplex.split();
                future::try_join(send_stdin(&sink), print_stream(source)).await?;
            }
        }

        connection.disconnect().await;
        processing.await?;
        Ok(())
    }
}

async fn print_stream(
    source: impl Stream<Item = Result<ssb_muxrpc::Message, ssb_muxrpc::Error>>,
) -> anyhow::Result<()> {
    futures::pin_mut!(source);
    while let Some(message) = source.try_next().await? {
        print_body(&message.body)?;
    }
    Ok(())
}

async fn send_stdin(sink: &impl StreamSender) -> anyhow::Result<()> {
    let stdin = async_std::io::BufReader::new(async_std::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next().await {
        let value = serde_json::from_str::<serde_json::Value>(&line?)
            .context("Failed to parse input line as JSON")?;
        sink.send(Body::Json(value), false).await?;
    }
    sink.close().await?;
    Ok(())
}

fn print_body(body: &Body) -> anyhow::Result<()> {
    match body {
        Body::Json(value) => println!("{}", serde_json::to_string(value)?),
        Body::Text(string) => println!("{}", string),
        Body::Binary(data) => println!("{:?}", data),
    }
    Ok(())
}
