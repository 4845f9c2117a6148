use std::net::SocketAddr;

use broadside::transport::tcp::TcpTransport;
use broadside::transport::Transport;
use broadside::{
    ClientConfig, ClientOutcome, Message, PlayerClient, RandomInput, Server, ServerConfig,
    ServerHandle, SilentRenderer, WIN_THRESHOLD,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};

const STEP: Duration = Duration::from_secs(10);

async fn start_server(config: ServerConfig) -> (SocketAddr, ServerHandle, JoinHandle<anyhow::Result<()>>) {
    let server = Server::bind(ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        ..config
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    let task = tokio::spawn(server.run());
    (addr, handle, task)
}

fn fast_keepalive() -> ServerConfig {
    ServerConfig {
        keepalive_initial: Duration::from_millis(40),
        keepalive_step: Duration::from_millis(20),
        seed: Some(21),
        ..ServerConfig::default()
    }
}

type Bot = PlayerClient<RandomInput, SilentRenderer>;

fn spawn_bot(addr: SocketAddr, seed: u64) -> JoinHandle<(Bot, ClientOutcome)> {
    tokio::spawn(async move {
        let config = ClientConfig {
            server: addr.to_string(),
            ..ClientConfig::default()
        };
        let mut bot = PlayerClient::connect(&config, RandomInput::new(Some(seed)), SilentRenderer)
            .await
            .unwrap();
        let outcome = bot.run().await.unwrap();
        (bot, outcome)
    })
}

/// Next message that is not a lobby keep-alive.
async fn next_game_message(t: &mut TcpTransport) -> Message {
    loop {
        let msg = timeout(STEP, t.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("transport failed");
        if !matches!(msg, Message::WaitForOpponent { .. }) {
            return msg;
        }
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + STEP;
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(20)).await;
    }
}

fn check_decided(results: &[(Bot, ClientOutcome)]) {
    for (bot, outcome) in results {
        match outcome {
            ClientOutcome::Won { .. } => {
                assert!(bot.own_grid().count_damaged() < WIN_THRESHOLD);
                assert_eq!(bot.opponent_grid().count_damaged(), WIN_THRESHOLD);
            }
            ClientOutcome::Lost { .. } => {
                assert_eq!(bot.own_grid().count_damaged(), WIN_THRESHOLD);
                assert!(bot.opponent_grid().count_damaged() < WIN_THRESHOLD);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn two_bots_play_a_full_match() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(fast_keepalive()).await;

    let first = spawn_bot(addr, 1);
    let second = spawn_bot(addr, 2);
    let results = [
        timeout(STEP, first).await??,
        timeout(STEP, second).await??,
    ];
    let wins = results
        .iter()
        .filter(|(_, o)| matches!(o, ClientOutcome::Won { .. }))
        .count();
    assert_eq!(wins, 1);
    check_decided(&results);

    wait_until(|| handle.live_matches().is_empty()).await;
    assert_eq!(handle.client_count(), 0);
    handle.shutdown();
    timeout(STEP, server).await???;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_matches_stay_isolated() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(fast_keepalive()).await;

    let bots: Vec<_> = (0..4).map(|i| spawn_bot(addr, 100 + i)).collect();
    let mut results = Vec::new();
    for bot in bots {
        results.push(timeout(STEP, bot).await??);
    }
    let wins = results
        .iter()
        .filter(|(_, o)| matches!(o, ClientOutcome::Won { .. }))
        .count();
    assert_eq!(wins, 2);
    check_decided(&results);

    wait_until(|| handle.live_matches().is_empty()).await;
    handle.shutdown();
    timeout(STEP, server).await???;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unpaired_session_gets_keepalives_until_paired() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(fast_keepalive()).await;

    let mut first = TcpTransport::connect(addr).await?;
    for _ in 0..3 {
        let msg = timeout(STEP, first.recv()).await??;
        assert!(matches!(msg, Message::WaitForOpponent { .. }), "{:?}", msg);
    }
    assert_eq!(handle.waiting_count(), 1);

    let mut second = TcpTransport::connect(addr).await?;
    assert_eq!(next_game_message(&mut first).await, Message::StartGame);
    assert_eq!(next_game_message(&mut second).await, Message::StartGame);
    assert_eq!(handle.live_matches().len(), 1);

    // Leaving during placement hands the other side the win.
    second.send(&Message::Exit).await?;
    assert!(matches!(
        next_game_message(&mut first).await,
        Message::EndGame { is_win: true, .. }
    ));

    wait_until(|| handle.live_matches().is_empty()).await;
    handle.shutdown();
    timeout(STEP, server).await???;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn keepalive_pause_grows_after_every_send() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(ServerConfig {
        keepalive_initial: Duration::from_millis(50),
        keepalive_step: Duration::from_millis(150),
        ..ServerConfig::default()
    })
    .await;

    let mut client = TcpTransport::connect(addr).await?;
    let mut arrivals = Vec::new();
    for _ in 0..4 {
        let msg = timeout(STEP, client.recv()).await??;
        assert!(matches!(msg, Message::WaitForOpponent { .. }), "{:?}", msg);
        arrivals.push(Instant::now());
    }
    let gaps: Vec<Duration> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();
    // Pauses of 50 ms, 200 ms and 350 ms.
    assert!(gaps[1] > gaps[0] + Duration::from_millis(100), "{:?}", gaps);
    assert!(gaps[2] > gaps[1] + Duration::from_millis(100), "{:?}", gaps);

    handle.shutdown();
    timeout(STEP, server).await???;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_leaving_the_lobby_is_never_paired() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(ServerConfig {
        keepalive_initial: Duration::from_secs(5),
        ..fast_keepalive()
    })
    .await;

    // One leaves with `exit`, the other just hangs up.
    let mut quitter = TcpTransport::connect(addr).await?;
    assert!(matches!(
        timeout(STEP, quitter.recv()).await??,
        Message::WaitForOpponent { .. }
    ));
    quitter.send(&Message::Exit).await?;
    drop(quitter);
    wait_until(|| handle.waiting_count() == 0 && handle.client_count() == 0).await;

    let mut hangup = TcpTransport::connect(addr).await?;
    assert!(matches!(
        timeout(STEP, hangup.recv()).await??,
        Message::WaitForOpponent { .. }
    ));
    drop(hangup);
    wait_until(|| handle.waiting_count() == 0 && handle.client_count() == 0).await;

    let mut first = TcpTransport::connect(addr).await?;
    assert!(matches!(
        timeout(STEP, first.recv()).await??,
        Message::WaitForOpponent { .. }
    ));
    sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.waiting_count(), 1);
    assert!(handle.live_matches().is_empty());

    let mut second = TcpTransport::connect(addr).await?;
    assert_eq!(next_game_message(&mut first).await, Message::StartGame);
    assert_eq!(next_game_message(&mut second).await, Message::StartGame);

    handle.shutdown();
    for t in [&mut first, &mut second] {
        assert_eq!(next_game_message(t).await, Message::Close);
    }
    timeout(STEP, server).await???;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_waiting_and_playing_sessions() -> anyhow::Result<()> {
    let (addr, handle, server) = start_server(fast_keepalive()).await;

    let mut a = TcpTransport::connect(addr).await?;
    let mut b = TcpTransport::connect(addr).await?;
    assert_eq!(next_game_message(&mut a).await, Message::StartGame);
    assert_eq!(next_game_message(&mut b).await, Message::StartGame);
    let mut lonely = TcpTransport::connect(addr).await?;
    assert!(matches!(
        timeout(STEP, lonely.recv()).await??,
        Message::WaitForOpponent { .. }
    ));

    handle.shutdown();
    assert!(handle.is_shutting_down());
    for t in [&mut a, &mut b, &mut lonely] {
        assert_eq!(next_game_message(t).await, Message::Close);
    }
    timeout(STEP, server).await???;
    assert_eq!(handle.client_count(), 0);
    Ok(())
}
