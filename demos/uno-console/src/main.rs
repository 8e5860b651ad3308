use cardlink::prelude::*;
use cardlink::rules;
use cardlink::{DEFAULT_URL, protocol::normalize_game_code};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_STORE: &str = "cardlink-session.json";

// ---------------------------------------------------------------------------
// Input commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Create { name: String },
    Join { name: String, code: String },
    Leave,
    Start,
    End,
    Play { index: usize, color: Option<Color> },
    Draw,
    Done,
    Show,
    Hint,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  create <name>            host a new game
  join <name> <code>       join a game by code
  leave                    leave the current game
  start | end              start or end the game (host)
  play <index> [R|G|B|Y]   play a card; color for wilds
  draw | done              draw a card, or stop drawing
  show | hint              print the table, or suggest a move
  help | quit";

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".into());
    };
    let rest: Vec<&str> = words.collect();

    let input = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("create", [name]) => Input::Create { name: name.to_string() },
        ("join", [name, code]) => Input::Join {
            name: name.to_string(),
            code: code.to_string(),
        },
        ("leave", []) => Input::Leave,
        ("start", []) => Input::Start,
        ("end", []) => Input::End,
        ("play", [index]) => Input::Play {
            index: parse_index(index)?,
            color: None,
        },
        ("play", [index, color]) => Input::Play {
            index: parse_index(index)?,
            color: Some(
                color
                    .to_ascii_uppercase()
                    .parse()
                    .map_err(|_| format!("unknown color {color:?}; use R, G, B or Y"))?,
            ),
        },
        ("draw", []) => Input::Draw,
        ("done", []) => Input::Done,
        ("show", []) => Input::Show,
        ("hint", []) => Input::Hint,
        ("help" | "?", []) => Input::Help,
        ("quit" | "exit", []) => Input::Quit,
        (other, _) => return Err(format!("can't parse {other:?}; try `help`")),
    };
    Ok(input)
}

fn parse_index(text: &str) -> Result<usize, String> {
    text.parse().map_err(|_| format!("card index must be a number, got {text:?}"))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(state: &ClientState) -> String {
    let mut out = format!("[{:?}]", state.phase());
    if let Some(code) = &state.game_id {
        let name = state.game_pneumonic.as_deref().unwrap_or("");
        out.push_str(&format!(" game {code} {name}"));
    }
    let Some(game) = &state.game else {
        return out;
    };

    for (seat, player) in game.other_players.iter().enumerate() {
        let marker = if seat == game.active_player { '>' } else { ' ' };
        out.push_str(&format!("\n {marker} {} ({} cards)", player.name, player.num_cards));
    }

    if let Some(top) = &game.discard_top {
        out.push_str(&format!("\n top: {top}"));
        if let Some(color) = game.wild_color {
            out.push_str(&format!(" (color {color})"));
        }
        if game.must_draw > 0 {
            out.push_str(&format!(", must draw {}", game.must_draw));
        }

        let playable = rules::playable_indices(top, game.wild_color, &game.you.cards);
        let hand: Vec<String> = game
            .you
            .cards
            .iter()
            .enumerate()
            .map(|(i, card)| {
                let mark = if playable.contains(&i) { "*" } else { "" };
                format!("{i}:{card}{mark}")
            })
            .collect();
        out.push_str(&format!("\n hand: {}", hand.join(" ")));
    }
    out
}

fn hint(state: &ClientState) -> String {
    let Some(game) = &state.game else {
        return "no game yet".into();
    };
    match rules::initial_selection_for(game) {
        Selection::Card(i) => format!("try `play {i}` ({})", game.you.cards[i]),
        Selection::Deck => "nothing playable: `draw`".into(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

async fn run(client: &GameClient, input: Input) -> Result<(), ClientError> {
    match input {
        Input::Create { name } => client.create_game(&name).await.map(drop),
        Input::Join { name, code } => {
            tracing::info!(code = %normalize_game_code(&code), "joining");
            client.join_game(&name, &code).await.map(drop)
        }
        Input::Leave => client.leave_game().await.map(drop),
        Input::Start => client.start_game().await.map(drop),
        Input::End => client.end_game().await.map(drop),
        Input::Play { index, color } => client.play_card(index, color).await.map(drop),
        Input::Draw => client.draw_card().await.map(drop),
        Input::Done => client.done_drawing().await.map(drop),
        Input::Show => {
            println!("{}", render(&client.current_state()));
            Ok(())
        }
        Input::Hint => {
            println!("{}", hint(&client.current_state()));
            Ok(())
        }
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Quit => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let store = args.next().unwrap_or_else(|| DEFAULT_STORE.to_string());

    tracing::info!(%url, %store, "starting uno console");

    let client = GameClient::builder()
        .url(url)
        .store(FileStore::new(store))
        .connect()
        .await?;
    let _sub = client.subscribe(|state| println!("{}", render(state)));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        if input == Input::Quit {
            break;
        }
        if let Err(e) = run(&client, input).await {
            eprintln!("error: {e}");
        }
    }

    client.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink::protocol::{Direction, OtherPlayer, PlayerHand};

    #[test]
    fn test_parse_every_action() {
        assert_eq!(parse_input("create ann").unwrap(), Input::Create { name: "ann".into() });
        assert_eq!(
            parse_input("join bob abcd").unwrap(),
            Input::Join { name: "bob".into(), code: "abcd".into() }
        );
        assert_eq!(parse_input("leave").unwrap(), Input::Leave);
        assert_eq!(parse_input("start").unwrap(), Input::Start);
        assert_eq!(parse_input("end").unwrap(), Input::End);
        assert_eq!(parse_input("play 2").unwrap(), Input::Play { index: 2, color: None });
        assert_eq!(
            parse_input("play 0 g").unwrap(),
            Input::Play { index: 0, color: Some(Color::Green) }
        );
        assert_eq!(parse_input("draw").unwrap(), Input::Draw);
        assert_eq!(parse_input("done").unwrap(), Input::Done);
        assert_eq!(parse_input("show").unwrap(), Input::Show);
        assert_eq!(parse_input("hint").unwrap(), Input::Hint);
        assert_eq!(parse_input("?").unwrap(), Input::Help);
        assert_eq!(parse_input("QUIT").unwrap(), Input::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_input("").is_err());
        assert!(parse_input("play x").is_err());
        assert!(parse_input("play 1 purple").is_err());
        assert!(parse_input("join onlyname").is_err());
        assert!(parse_input("dance").is_err());
    }

    fn playing_state() -> ClientState {
        ClientState {
            connected: true,
            game_id: Some("ABCD".into()),
            game_pneumonic: Some("able-baker".into()),
            game: Some(GameSnapshot {
                status: GameStatus::Playing,
                active_player: 1,
                direction: Direction::Clockwise,
                discard_top: Some("R5".parse().unwrap()),
                discard_pile_count: 3,
                draw_pile_count: 50,
                must_draw: 0,
                other_players: vec![
                    OtherPlayer { name: "ann".into(), num_cards: 3 },
                    OtherPlayer { name: "bob".into(), num_cards: 4 },
                ],
                you: PlayerHand {
                    name: "ann".into(),
                    cards: ["B7", "R2", "wild"].iter().map(|c| c.parse().unwrap()).collect(),
                },
                wild_color: None,
            }),
            ..ClientState::default()
        }
    }

    #[test]
    fn test_render_marks_active_seat_and_playable_cards() {
        let text = render(&playing_state());
        assert!(text.starts_with("[Playing] game ABCD able-baker"));
        assert!(text.contains("> bob (4 cards)"));
        assert!(text.contains("top: R5"));
        assert!(text.contains("hand: 0:B7 1:R2* 2:wild*"));
    }

    #[test]
    fn test_render_without_game_is_one_line() {
        let state = ClientState { connected: true, ..ClientState::default() };
        assert_eq!(render(&state), "[Welcome]");
    }

    #[test]
    fn test_hint_suggests_first_legal_card() {
        assert_eq!(hint(&playing_state()), "try `play 1` (R2)");
    }
}
