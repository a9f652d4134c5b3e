use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "convo-relay")]
#[command(author, version, about = "Conversation relay with a durable conversation log", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP relay service
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Relay a single message and print the reply
    Chat {
        message: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Print how many conversations the primary log holds
    LogCount,
}
