use std::collections::VecDeque;
use std::io::Cursor;

use broadside::transport::Transport;
use broadside::{
    render_grids, AttackStatus, Cell, ClientConfig, ClientOutcome, CoordinateInput, Grid,
    InMemoryTransport, Interrupted, Message, Orientation, PlayerClient, PromptInput, RandomInput,
    ShipSpec, SilentRenderer, WireCoordinate, GRID_HEIGHT, GRID_WIDTH,
};
use tokio::time::{timeout, Duration};

const STEP: Duration = Duration::from_secs(5);

/// Replays fixed answers; runs dry into an interrupt.
struct Scripted {
    placements: VecDeque<(usize, usize, Orientation)>,
    targets: VecDeque<(usize, usize)>,
}

impl Scripted {
    fn new(placements: &[(usize, usize, Orientation)], targets: &[(usize, usize)]) -> Self {
        Self {
            placements: placements.iter().copied().collect(),
            targets: targets.iter().copied().collect(),
        }
    }
}

impl CoordinateInput for Scripted {
    fn placement(
        &mut self,
        _grid: &Grid,
        _ship: &ShipSpec,
    ) -> Result<(usize, usize, Orientation), Interrupted> {
        self.placements.pop_front().ok_or(Interrupted)
    }

    fn target(&mut self, _opponent: &Grid) -> Result<(usize, usize), Interrupted> {
        self.targets.pop_front().ok_or(Interrupted)
    }
}

const LEFT_EDGE: [(usize, usize, Orientation); 3] = [
    (1, 1, Orientation::Horizontal),
    (1, 4, Orientation::Horizontal),
    (1, 7, Orientation::Horizontal),
];

async fn recv(t: &mut InMemoryTransport) -> Message {
    timeout(STEP, t.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("transport failed")
}

fn client(
    input: Scripted,
) -> (
    PlayerClient<Scripted, SilentRenderer>,
    InMemoryTransport,
) {
    let (client_end, server_end) = InMemoryTransport::pair();
    let client = PlayerClient::new(
        Box::new(client_end),
        &ClientConfig::default(),
        input,
        SilentRenderer,
    );
    (client, server_end)
}

#[tokio::test]
async fn attacker_copy_marks_confirmed_hit() {
    let (mut player, mut server) = client(Scripted::new(&LEFT_EDGE, &[(2, 1)]));
    let run = tokio::spawn(async move {
        let outcome = player.run().await;
        (player, outcome)
    });

    server.send(&Message::StartGame).await.unwrap();
    let Message::Coordinates { ships, .. } = recv(&mut server).await else {
        panic!("expected the fleet");
    };
    assert_eq!(ships.len(), 3);

    // The opponent uses the same layout; the client fires first.
    server
        .send(&Message::Coordinates {
            ships,
            starting: true,
        })
        .await
        .unwrap();
    let coordinate = WireCoordinate::new(2, 1);
    assert_eq!(recv(&mut server).await, Message::Attack { coordinate });
    server
        .send(&Message::AttackStatus(AttackStatus {
            status: true,
            coordinate,
        }))
        .await
        .unwrap();
    server.send(&Message::Close).await.unwrap();

    let (player, outcome) = run.await.unwrap();
    assert_eq!(outcome.unwrap(), ClientOutcome::Closed);
    assert_eq!(player.opponent_grid().count_damaged(), 1);
    assert!(player.opponent_grid().cell(1, 0).unwrap().is_damaged());
    assert_eq!(player.own_grid().count_damaged(), 0);
}

#[tokio::test]
async fn incoming_attack_is_answered_from_own_grid() {
    let (mut player, mut server) = client(Scripted::new(&LEFT_EDGE, &[]));
    let run = tokio::spawn(async move {
        let outcome = player.run().await;
        (player, outcome)
    });

    server.send(&Message::StartGame).await.unwrap();
    let Message::Coordinates { ships, .. } = recv(&mut server).await else {
        panic!("expected the fleet");
    };
    server
        .send(&Message::Coordinates {
            ships,
            starting: false,
        })
        .await
        .unwrap();

    for (x, y, hit) in [(1, 1, true), (9, 9, false)] {
        let coordinate = WireCoordinate::new(x, y);
        server.send(&Message::Attack { coordinate }).await.unwrap();
        assert_eq!(
            recv(&mut server).await,
            Message::AttackStatus(AttackStatus {
                status: hit,
                coordinate
            })
        );
    }

    server
        .send(&Message::EndGame {
            is_win: true,
            message: "done".to_string(),
            attack_status: None,
        })
        .await
        .unwrap();
    let (player, outcome) = run.await.unwrap();
    assert_eq!(
        outcome.unwrap(),
        ClientOutcome::Won {
            message: "done".to_string()
        }
    );
    assert_eq!(
        player.own_grid().cell(0, 0),
        Some(Cell::Ship {
            sign: 'X',
            damaged: true
        })
    );
}

#[tokio::test]
async fn final_status_in_end_game_is_applied() {
    let (mut player, mut server) = client(Scripted::new(&LEFT_EDGE, &[(1, 1)]));
    let run = tokio::spawn(async move {
        let outcome = player.run().await;
        (player, outcome)
    });

    server.send(&Message::StartGame).await.unwrap();
    let Message::Coordinates { ships, .. } = recv(&mut server).await else {
        panic!("expected the fleet");
    };
    server
        .send(&Message::Coordinates {
            ships,
            starting: true,
        })
        .await
        .unwrap();
    let Message::Attack { coordinate } = recv(&mut server).await else {
        panic!("expected an attack");
    };
    server
        .send(&Message::EndGame {
            is_win: true,
            message: "won".to_string(),
            attack_status: Some(AttackStatus {
                status: true,
                coordinate,
            }),
        })
        .await
        .unwrap();

    let (player, outcome) = run.await.unwrap();
    assert!(matches!(outcome.unwrap(), ClientOutcome::Won { .. }));
    assert_eq!(player.opponent_grid().count_damaged(), 1);
}

#[tokio::test]
async fn rejected_fleet_is_placed_again() {
    let placements = [LEFT_EDGE, LEFT_EDGE].concat();
    let (mut player, mut server) = client(Scripted::new(&placements, &[]));
    let run = tokio::spawn(async move { player.run().await });

    server.send(&Message::StartGame).await.unwrap();
    assert!(matches!(recv(&mut server).await, Message::Coordinates { .. }));
    server
        .send(&Message::PlacementRejected {
            message: "try again".to_string(),
        })
        .await
        .unwrap();
    let Message::Coordinates { ships, .. } = recv(&mut server).await else {
        panic!("expected a second fleet");
    };
    assert_eq!(ships.len(), 3);
    server.send(&Message::Close).await.unwrap();
    assert_eq!(run.await.unwrap().unwrap(), ClientOutcome::Closed);
}

#[tokio::test]
async fn interrupted_input_sends_exit() {
    let (mut player, mut server) = client(Scripted::new(&[], &[]));
    let run = tokio::spawn(async move { player.run().await });

    server.send(&Message::StartGame).await.unwrap();
    assert_eq!(recv(&mut server).await, Message::Exit);
    assert_eq!(run.await.unwrap().unwrap(), ClientOutcome::Interrupted);
}

#[test]
fn prompt_reprompts_until_valid() {
    let input = Cursor::new("0\nabc\n3\n11\n4\nx\nv\n");
    let mut output = Vec::new();
    let mut prompt = PromptInput::new(input, &mut output);
    let grid = Grid::new(GRID_WIDTH, GRID_HEIGHT);
    let spec = ShipSpec::new("MO201", 'o', 3, 2).unwrap();
    let answer = prompt.placement(&grid, &spec).unwrap();
    assert_eq!(answer, (3, 4, Orientation::Vertical));
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Please enter a number between 1 and 10"));
    assert!(text.contains("Please enter h or v"));
}

#[test]
fn prompt_interrupts_on_exit_or_eof() {
    let grid = Grid::new(GRID_WIDTH, GRID_HEIGHT);
    let mut quit = PromptInput::new(Cursor::new("exit\n"), Vec::new());
    assert_eq!(quit.target(&grid), Err(Interrupted));
    let mut eof = PromptInput::new(Cursor::new("5\n"), Vec::new());
    assert_eq!(eof.target(&grid), Err(Interrupted));
}

#[test]
fn random_input_never_repeats_a_target() {
    let grid = Grid::new(3, 3);
    let mut bot = RandomInput::new(Some(5));
    for _ in 0..9 {
        bot.target(&grid).unwrap();
    }
    assert_eq!(bot.fired().len(), 9);
    assert_eq!(bot.target(&grid), Err(Interrupted));
}

#[test]
fn random_input_places_the_default_fleet() {
    let mut bot = RandomInput::new(Some(9));
    let mut grid = Grid::new(GRID_WIDTH, GRID_HEIGHT);
    for spec in broadside::default_fleet() {
        let (x, y, o) = bot.placement(&grid, &spec).unwrap();
        grid.place(&spec, (x, y), o).unwrap();
    }
    let cells: usize = grid.ships().iter().map(|s| s.coordinates().len()).sum();
    assert_eq!(cells, 26);
}

#[test]
fn opponent_ships_stay_hidden_until_revealed() {
    let mut own = Grid::new(4, 4);
    let mut opponent = Grid::new(4, 4);
    let spec = ShipSpec::new("MO201", 'o', 2, 1).unwrap();
    own.place(&spec, (1, 1), Orientation::Horizontal).unwrap();
    opponent
        .place(&spec, (1, 1), Orientation::Horizontal)
        .unwrap();
    own.hit(1, 1);
    opponent.hit(2, 1);

    let masked = render_grids(&own, &opponent, false);
    let first_row = masked.lines().nth(2).unwrap();
    assert!(first_row.contains('*'));
    assert_eq!(first_row.matches('o').count(), 1);
    assert!(first_row.contains('X'));

    let revealed = render_grids(&own, &opponent, true);
    let first_row = revealed.lines().nth(2).unwrap();
    assert_eq!(first_row.matches('o').count(), 2);
}

#[test]
fn log_level_falls_back_to_role_default() {
    use log::LevelFilter;
    assert_eq!(
        broadside::level_from(Some(" debug "), LevelFilter::Warn),
        LevelFilter::Debug
    );
    assert_eq!(
        broadside::level_from(Some("loud"), LevelFilter::Info),
        LevelFilter::Info
    );
    assert_eq!(broadside::level_from(None, LevelFilter::Warn), LevelFilter::Warn);
}
