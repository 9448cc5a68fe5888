use clap::Parser;
use ledgerchat::args::{Args, Command, ConnectArgs, ServeArgs};
use ledgerchat::{Client, Server, ServerConfig};
use log::{LevelFilter, error, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    // Parsing degli argomenti da linea di comando
    let args = Args::parse();

    let result = match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Connect(connect_args) => connect(connect_args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    // Configurazione non valida: il server non deve partire
    let config = ServerConfig::resolve(&args)?;
    info!("Files directory: {:?}", config.files_dir);
    info!("Max upload size: {} bytes", config.max_upload_size);

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn connect(args: ConnectArgs) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    let name = match args.name {
        Some(name) => name,
        None => {
            stdout.write_all(b"Enter your name:\n").await?;
            stdout.flush().await?;
            let mut line = String::new();
            input.read_line(&mut line).await?;
            line.trim().to_string()
        }
    };

    let client = Client::connect((args.host.as_str(), args.port), name).await?;
    client.run(input, stdout).await
}
