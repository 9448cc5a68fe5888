use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Configurazione da linea di comando
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Avvia il server di chat e ricezione file
    Serve(ServeArgs),
    /// Si connette a un server come client interattivo
    Connect(ConnectArgs),
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Indirizzo IP su cui ascoltare [default: 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Porta su cui ascoltare [default: 8888]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory in cui salvare i file ricevuti [default: ./files]
    #[arg(long)]
    pub files_dir: Option<PathBuf>,

    /// File di impostazioni JSON (formato appSettings.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timeout di lettura per sessione in secondi (0 = nessun timeout)
    #[arg(long, default_value = "300")]
    pub read_timeout: u64,

    /// Lunghezza massima di un messaggio di testo (in bytes)
    #[arg(long, default_value = "65536")]
    pub max_frame_length: usize,

    /// Dimensione massima di un file ricevuto (in bytes)
    #[arg(long, default_value = "1073741824")]
    pub max_upload_size: u64,

    /// Disattiva il monitoraggio della directory dei file
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Indirizzo del server
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Porta del server
    #[arg(short, long, default_value = "8888")]
    pub port: u16,

    /// Nome visualizzato nella chat (chiesto all'avvio se assente)
    #[arg(short, long)]
    pub name: Option<String>,
}
