//! Minimal terminal client: connect, log in, sit in the matchmaking queue,
//! and print whatever the server sends.
//!
//! ```text
//! console-client ws://localhost:8080 <username> <password>
//! ```

use std::sync::Arc;

use flotilla::protocol::{Message, MsgType};
use flotilla::session::FileTokenStore;
use flotilla::{Client, ClientConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "ws://localhost:8080".into());
    let username = args.next().unwrap_or_else(|| "captain".into());
    let password = args.next().unwrap_or_else(|| "hunter2".into());

    let store = Arc::new(FileTokenStore::new(
        std::env::temp_dir().join("flotilla-session.json"),
    ));
    let client = Client::new(ClientConfig::new(&url), store);

    client.on_state_change(|state| {
        println!("[state] {state}");
    });
    client.on(MsgType::StartGame, |msg| {
        if let Message::StartGame(game) = msg {
            println!(
                "game {} started against {}, {} moves first",
                game.game_id, game.opponent, game.current_turn
            );
        }
    });
    client.on(MsgType::MoveResult, |msg| {
        if let Message::MoveResult(result) = msg {
            let whose = if result.is_your_shot { "your" } else { "their" };
            println!(
                "{whose} shot at ({}, {}): {}{}",
                result.row,
                result.col,
                if result.is_hit { "hit" } else { "miss" },
                if result.is_sunk { ", ship sunk" } else { "" },
            );
        }
    });
    client.on(MsgType::Chat, |msg| {
        if let Message::Chat(chat) = msg {
            println!("[chat] {}", chat.message);
        }
    });
    client.on(MsgType::OnlinePlayersList, |msg| {
        if let Message::OnlinePlayersList(list) = msg {
            println!("{} players online:", list.players.len());
            for player in &list.players {
                println!("  {} ({}, {})", player.username, player.elo, player.rank);
            }
        }
    });
    client.on(MsgType::ChallengeReceived, |msg| {
        if let Message::ChallengeReceived(challenge) = msg {
            println!(
                "challenge {} from {} ({}, {} min)",
                challenge.challenge_id,
                challenge.challenger_username,
                challenge.game_mode,
                challenge.time_control,
            );
        }
    });
    client.on(MsgType::GameOver, |_| {
        println!("game over");
    });

    client.connect().await?;

    // A stored session skips the password round-trip; the token went out
    // with the connect.
    if client.session().is_none() {
        let auth = client.login(&username, &password).await?;
        println!("logged in as {}", auth.username);
    } else {
        println!("resumed session");
    }

    client.get_online_players()?;
    client.join_queue()?;
    println!("waiting in queue, Ctrl-C to quit");

    tokio::signal::ctrl_c().await?;
    client.disconnect();
    Ok(())
}
