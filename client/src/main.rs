use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::NetworkClient;
use log::{info, warn};
use shared::ControlScheme;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Account name; unknown names are registered on first login
    #[arg(short = 'u', long)]
    username: String,

    #[arg(short = 'p', long, default_value = "password")]
    password: String,

    /// Movement keys to press: "wasd" or "arrows"
    #[arg(short = 'c', long, default_value = "wasd")]
    controls: String,

    /// Requests per second while queued or in a match
    #[arg(short = 'r', long, default_value = "60")]
    poll_rate: u32,

    /// Matches to play before exiting
    #[arg(short = 'n', long, default_value = "1")]
    matches: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let controls: ControlScheme = args.controls.parse()?;

    let mut network = NetworkClient::connect(&args.server).await?;
    network.log_in(&args.username, &args.password).await?;

    let (elo, _) = network.elo(&args.username).await?;
    let winrate = network.winrate(&args.username).await?;
    info!(
        "{}: rating {:?}, winrate {:?}%",
        args.username, elo, winrate
    );

    let mut game = ClientGameState::new();
    let mut input = InputManager::new(controls);

    for round in 1..=args.matches {
        info!("Queueing for match {}/{} with {} controls", round, args.matches, controls);

        let stats = tokio::select! {
            result = network.play_match(&mut game, &mut input, args.poll_rate) => result?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, leaving");
                return Ok(());
            }
        };

        match stats.get(&args.username) {
            Some(own) => info!(
                "Match {} over, winner {:?}: {} goals, {} touches",
                round, stats.winner, own.goals, own.touches
            ),
            None => info!("Match {} over, winner {:?}", round, stats.winner),
        }
    }

    let (solo, _) = network.history(&args.username).await?;
    for record in solo.iter().take(5) {
        info!(
            "{} {}-{} {} (winner {:?})",
            record.names.0, record.scores.0, record.scores.1, record.names.1, record.winner
        );
    }

    Ok(())
}
