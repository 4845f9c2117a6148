use broadside::{
    init_logging, ClientConfig, ClientOutcome, CoordinateInput, PlayerClient, PromptInput,
    RandomInput, Renderer, Server, ServerConfig, SilentRenderer, TextRenderer, DEFAULT_BIND,
    WIN_THRESHOLD,
};
use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the game server and pair incoming players.
    Serve {
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
        #[arg(long, default_value_t = WIN_THRESHOLD, help = "Hull points lost before a match is decided")]
        threshold: usize,
        #[arg(long, help = "Fix RNG seed for reproducible first-attacker draws (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Connect to a server and play one match.
    Play {
        #[arg(long, default_value = DEFAULT_BIND)]
        connect: String,
        #[arg(long, help = "Let the computer place ships and fire")]
        bot: bool,
        #[arg(long, help = "Fix RNG seed for the bot (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(match cli.command {
        Commands::Serve { .. } => LevelFilter::Info,
        Commands::Play { .. } => LevelFilter::Warn,
    });

    match cli.command {
        Commands::Serve {
            bind,
            threshold,
            seed,
        } => {
            let config = ServerConfig {
                bind,
                win_threshold: threshold,
                seed,
                ..ServerConfig::default()
            };
            let server = Server::bind(config).await?;
            println!("Server listening on {}", server.local_addr()?);
            let handle = server.handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.shutdown();
                }
            });
            server.run().await?;
        }
        Commands::Play { connect, bot, seed } => {
            let config = ClientConfig {
                server: connect,
                ..ClientConfig::default()
            };
            println!("Connecting to {}...", config.server);
            let outcome = if bot {
                play(&config, RandomInput::new(seed), SilentRenderer).await?
            } else {
                play(&config, PromptInput::stdio(), TextRenderer).await?
            };
            match outcome {
                ClientOutcome::Won { message } | ClientOutcome::Lost { message } => {
                    println!("{}", message)
                }
                ClientOutcome::Closed => println!("The server closed the connection."),
                ClientOutcome::Interrupted => println!("You left the game."),
            }
        }
    }
    Ok(())
}

async fn play<I: CoordinateInput, R: Renderer>(
    config: &ClientConfig,
    input: I,
    renderer: R,
) -> anyhow::Result<ClientOutcome> {
    let mut client = PlayerClient::connect(config, input, renderer).await?;
    client.run().await
}
