//! Scripted arena client for smoke-testing a running server.
//!
//! Run one bot without `--code` to open a room, then a second bot with the
//! printed code to fill seat B. The host starts the match once both seats are
//! taken and both bots walk toward each other and trade blows until the
//! match ends.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use shared::{
    ActionKind, Direction, MatchPhase, Notification, Packet, Position, Role, RoomView, Seat,
    StatsRequest, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Room code to join; opens a new room when omitted
    #[arg(short, long)]
    code: Option<String>,

    /// Room password
    #[arg(long, default_value = "")]
    password: String,

    /// Display name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Milliseconds between intents
    #[arg(long, default_value = "250")]
    pace_ms: u64,
}

struct Bot {
    socket: UdpSocket,
    server: SocketAddr,
    buf: Vec<u8>,
}

impl Bot {
    async fn send(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server).await?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Option<Packet> {
        let (len, _) = timeout(wait, self.socket.recv_from(&mut self.buf))
            .await
            .ok()?
            .ok()?;
        match deserialize::<Packet>(&self.buf[..len]) {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!("Failed to deserialize packet: {}", e);
                None
            }
        }
    }

    /// Waits for the first packet `pick` accepts, logging everything else.
    async fn wait_for<T>(
        &mut self,
        wait: Duration,
        mut pick: impl FnMut(Packet) -> Result<T, Packet>,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Some(packet) = self.recv(left).await else {
                return Err("timed out waiting for server".into());
            };
            match pick(packet) {
                Ok(value) => return Ok(value),
                Err(Packet::Rejected { reason }) => return Err(reason.into()),
                Err(Packet::Disconnected { reason }) => return Err(reason.into()),
                Err(other) => debug!("Skipping {:?}", other),
            }
        }
    }
}

fn step_toward(from: Position, to: Position) -> Option<Direction> {
    if from.manhattan(&to) <= 1 {
        None
    } else if from.x < to.x {
        Some(Direction::Right)
    } else if from.x > to.x {
        Some(Direction::Left)
    } else if from.y < to.y {
        Some(Direction::Down)
    } else {
        Some(Direction::Up)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bot socket bound to {}", socket.local_addr()?);
    let mut bot = Bot {
        socket,
        server: args.server,
        buf: vec![0u8; 8192],
    };
    let wait = Duration::from_secs(3);

    bot.send(&Packet::Connect {
        client_version: PROTOCOL_VERSION,
    })
    .await?;
    let client_id = bot
        .wait_for(wait, |p| match p {
            Packet::Connected { client_id } => Ok(client_id),
            other => Err(other),
        })
        .await?;
    info!("Connected as client {}", client_id);

    let (seat, hosting) = match &args.code {
        Some(code) => {
            bot.send(&Packet::JoinRoom {
                code: code.clone(),
                password: args.password.clone(),
                role: Role::Player,
            })
            .await?;
            (Seat::B, false)
        }
        None => {
            bot.send(&Packet::CreateRoom {
                password: args.password.clone(),
            })
            .await?;
            (Seat::A, true)
        }
    };
    let code = bot
        .wait_for(wait, |p| match p {
            Packet::RoomJoined { code, .. } => Ok(code),
            other => Err(other),
        })
        .await?;
    info!("In room {} (share this code with the second bot)", code);

    bot.send(&Packet::JoinSeat {
        seat,
        name: args.name.clone(),
        stats: StatsRequest::default(),
    })
    .await?;

    let mut pace = interval(Duration::from_millis(args.pace_ms));
    let mut last_view: Option<RoomView> = None;

    loop {
        tokio::select! {
            packet = bot.recv(Duration::from_secs(30)) => {
                match packet {
                    Some(Packet::State(view)) => last_view = Some(view),
                    Some(Packet::Notify(Notification::MatchEnded { winner, reason })) => {
                        info!("Match ended ({:?}), winner: {:?}", reason, winner);
                        break;
                    }
                    Some(Packet::Notify(note)) => info!("{:?}", note),
                    Some(Packet::Rejected { reason }) => debug!("Rejected: {}", reason),
                    Some(other) => debug!("Unexpected packet: {:?}", other),
                    None => {
                        warn!("Server went quiet");
                        break;
                    }
                }
            }

            _ = pace.tick() => {
                let Some(view) = &last_view else {
                    bot.send(&Packet::Heartbeat).await?;
                    continue;
                };

                let both_seated = view.players.len() == 2;
                let intent = match view.phase {
                    MatchPhase::Idle if hosting && both_seated => Some(Packet::StartMatch),
                    MatchPhase::Running => {
                        match (view.player(seat), view.player(seat.other())) {
                            (Some(me), Some(foe)) => Some(match step_toward(me.position, foe.position) {
                                Some(direction) => Packet::Move { direction },
                                None if me.hp * 3 < me.hp_max && me.heals_left > 0 => {
                                    Packet::Action { kind: ActionKind::Heal }
                                }
                                None => Packet::Action { kind: ActionKind::Attack },
                            }),
                            _ => None,
                        }
                    }
                    _ => None,
                };

                bot.send(&intent.unwrap_or(Packet::Heartbeat)).await?;
            }
        }
    }

    bot.send(&Packet::Disconnect).await?;
    info!("Bot finished");
    Ok(())
}
