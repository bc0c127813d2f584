use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use session::{rules::RulesEngine, ChessRules, Session, SessionOptions};
use shared::{
    domain::{Color, ConnectionId, MoveDescriptor, Position},
    protocol::{ClientRequest, ServerEvent},
};

#[derive(Parser, Debug)]
struct Cli {
    /// Starting position; the standard start when omitted
    #[arg(long)]
    fen: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a move list (e2e4 e7e5 ...) through a local session
    Replay {
        moves: Vec<String>,
        /// Print the final move history as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report the status of the starting position
    Status,
}

const WHITE: ConnectionId = ConnectionId(1);
const BLACK: ConnectionId = ConnectionId(2);

fn main() -> Result<()> {
    let cli = Cli::parse();
    let rules = match cli.fen.as_deref() {
        Some(fen) => ChessRules::from_fen(fen).map_err(anyhow::Error::msg)?,
        None => ChessRules::default(),
    };

    match cli.command {
        Command::Replay { moves, json } => replay(rules, &moves, json),
        Command::Status => {
            let start = rules.initial_position();
            let status = rules.status(&start, &[]);
            println!("{start}");
            println!("{}", status.result_text().unwrap_or("ongoing"));
            Ok(())
        }
    }
}

fn replay(rules: ChessRules, moves: &[String], json: bool) -> Result<()> {
    let to_move = rules.side_to_move(&rules.initial_position());
    let mut session = Session::new(rules, SessionOptions::default());
    session.connect(WHITE);
    session.connect(BLACK);
    let (first, second) = match to_move {
        Color::White => (WHITE, BLACK),
        Color::Black => (BLACK, WHITE),
    };

    for (ply, text) in moves.iter().enumerate() {
        let mover = if ply % 2 == 0 { first } else { second };
        let mv = parse_uci(text)?;
        let out = session.handle(mover, ClientRequest::Move(mv));

        let mut board: Option<&Position> = None;
        for event in out.events_for(mover) {
            match event {
                ServerEvent::InvalidMove(_) => bail!("ply {}: {text} is not legal", ply + 1),
                ServerEvent::BoardState(position) => board = Some(position),
                ServerEvent::GameOver(result) => println!("{result}"),
                _ => {}
            }
        }
        if let Some(position) = board {
            println!("{:>3}. {text:<6} {position}", ply + 1);
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(session.ledger().applied())?
        );
    }
    Ok(())
}

/// `e2e4`, or `e7e8q` with a promotion letter.
fn parse_uci(text: &str) -> Result<MoveDescriptor> {
    let text = text.trim();
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        bail!("expected a move like e2e4, got '{text}'");
    }
    let mv = MoveDescriptor::new(&text[0..2], &text[2..4]);
    Ok(match text.get(4..5) {
        Some(piece) => mv.with_promotion(piece),
        None => mv,
    })
}
