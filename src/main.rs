// src/main.rs
//
// CLI host for seriline: enumerate ports, run an interactive line monitor,
// manage stored link secrets.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;

use seriline::{
    credentials, list_ports, AppSettings, SerialSession, SessionState, StatusSink,
};

#[derive(Parser)]
#[command(name = "seriline", version, about = "Line-delimited serial monitor")]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available serial ports
    Ports,
    /// Open a session and exchange lines with the peer
    Monitor {
        /// Port name (falls back to default_port from settings)
        #[arg(long)]
        port: Option<String>,
        /// Baud rate override
        #[arg(long)]
        baud: Option<u32>,
        /// Send the stored link secret as the first line after connecting
        #[arg(long)]
        send_secret: bool,
    },
    /// Store the link secret for a port in the system keyring
    SetSecret {
        #[arg(long)]
        port: String,
        #[arg(long)]
        secret: String,
    },
    /// Remove the stored link secret for a port
    ForgetSecret {
        #[arg(long)]
        port: String,
    },
}

/// Prints session status to the terminal; inbound text goes straight to stdout.
struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn on_connected(&self) {
        println!("* connected");
    }

    fn on_disconnected(&self, reason: &str) {
        println!("* {}", reason);
    }

    fn on_error(&self, message: &str) {
        eprintln!("* error: {}", message);
    }

    fn on_data(&self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(AppSettings::default_path);
    let settings = match AppSettings::load(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("warning: {} (using defaults)", e);
            AppSettings::default()
        }
    };

    if let Some(dir) = settings.log_dir.as_deref() {
        if let Err(e) = seriline::logging::init_file_logging(std::path::Path::new(dir)) {
            eprintln!("warning: {}", e);
        }
    }

    let result = match cli.command {
        Command::Ports => run_ports(),
        Command::Monitor {
            port,
            baud,
            send_secret,
        } => run_monitor(&settings, port, baud, send_secret).await,
        Command::SetSecret { port, secret } => credentials::store_link_secret(&port, &secret),
        Command::ForgetSecret { port } => credentials::delete_link_secret(&port),
    };

    seriline::logging::stop_file_logging();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_ports() -> Result<(), String> {
    let ports = list_ports().map_err(|e| e.to_string())?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for p in ports {
        let mut line = format!("{}  [{}]", p.port_name, p.port_type);
        if let (Some(manufacturer), Some(product)) = (&p.manufacturer, &p.product) {
            line.push_str(&format!("  {} {}", manufacturer, product));
        }
        println!("{}", line);
    }
    Ok(())
}

async fn run_monitor(
    settings: &AppSettings,
    port: Option<String>,
    baud: Option<u32>,
    send_secret: bool,
) -> Result<(), String> {
    let mut config = settings.session_config();
    if port.is_some() {
        config.port = port;
    }
    if let Some(baud) = baud {
        config.baud_rate = baud;
    }
    let Some(port_name) = config.port.clone() else {
        return Err(
            "no port given; pass --port or set default_port (see `seriline ports`)".to_string(),
        );
    };
    if send_secret {
        config.secret = credentials::get_link_secret(&port_name)?;
        if config.secret.is_none() {
            return Err(format!(
                "no stored secret for {}; run `seriline set-secret` first",
                port_name
            ));
        }
    }

    let session = Arc::new(SerialSession::new(config, Arc::new(ConsoleSink)));
    session.connect().await.map_err(|e| e.to_string())?;

    println!("type lines to send; /clear clears the monitor, /quit exits");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await.map_err(|e| e.to_string())? {
            Some(line) => line,
            None => break, // stdin closed
        };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                session.monitor().clear();
                continue;
            }
            _ => {}
        }
        if let Err(e) = session.write(&line).await {
            eprintln!("* write failed: {}", e);
            if session.state() != SessionState::Connected {
                break;
            }
        }
    }

    session.disconnect().await.map_err(|e| e.to_string())?;
    Ok(())
}
