use clap::{Parser, Subcommand};

/// Repository clone/index job server.
///
/// Accepts repositories over HTTP, runs clone, index and delete jobs in the
/// background and pushes their progress over a websocket.
#[derive(Parser, Debug)]
#[command(name = "repoflow", about = "Repository clone/index job server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server and the background workers
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the stored status entry for a repository uri
    Status {
        /// Repository uri, e.g. github.com/elastic/kibana
        uri: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::parse_from(["repoflow", "serve", "--port", "4000"]);
        match cli.command {
            Command::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(4000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_status_uri() {
        let cli = Cli::parse_from(["repoflow", "status", "github.com/a/b"]);
        assert!(matches!(cli.command, Command::Status { uri } if uri == "github.com/a/b"));
    }
}
