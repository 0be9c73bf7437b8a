//! The fixed Discord-webhook JSON payload shape: one embed naming the title,
//! a chat-style one-liner, and a bullet list of current lobby members.

use common::GameId;
use serde::Serialize;

const EMBED_COLOR: u32 = 9_118_205;

struct GameArt {
    name: &'static str,
    icon_url: &'static str,
}

fn art_for(game: GameId) -> GameArt {
    match game {
        GameId::Daytona | GameId::DaytonaJp => GameArt {
            name: "Daytona USA",
            icon_url: "https://dcnet.flyca.st/gamepic/daytona.jpg",
        },
        GameId::Tetris => GameArt {
            name: "Sega Tetris",
            icon_url: "https://dcnet.flyca.st/gamepic/segatetris.jpg",
        },
        GameId::GolfShiyouYo => GameArt {
            name: "Golf Shiyou Yo 2",
            icon_url: "https://dcnet.flyca.st/gamepic/golfshiyou2.jpg",
        },
        GameId::AeroDancingI => GameArt {
            name: "Aero Dancing i",
            icon_url: "https://dcnet.flyca.st/gamepic/aerodancing.jpg",
        },
        GameId::HundredSwords => GameArt {
            name: "Hundred Swords",
            icon_url: "https://dcnet.flyca.st/gamepic/hundredswords.jpg",
        },
        GameId::CuldCept => GameArt {
            name: "Culdcept",
            icon_url: "",
        },
        GameId::AeroDancingF => GameArt {
            name: "Aero Dancing F",
            icon_url: "https://dcnet.flyca.st/gamepic/aerodancing-fsd.jpg",
        },
    }
}

#[derive(Serialize)]
struct Author {
    name: &'static str,
    icon_url: &'static str,
}

#[derive(Serialize)]
struct Embed {
    author: Author,
    title: &'static str,
    description: String,
    color: u32,
}

#[derive(Serialize)]
pub struct Notification {
    content: String,
    embeds: [Embed; 1],
}

impl Notification {
    fn new(game: GameId, content: String, player_list: &[String]) -> Self {
        let art = art_for(game);
        Notification {
            content,
            embeds: [Embed {
                author: Author {
                    name: art.name,
                    icon_url: art.icon_url,
                },
                title: "Lobby Players",
                description: player_list.join("\n"),
                color: EMBED_COLOR,
            }],
        }
    }

    pub fn lobby_joined(game: GameId, username: &str, lobby_name: &str, player_list: &[String]) -> Self {
        Self::new(
            game,
            format!("Player **{username}** joined lobby **{lobby_name}**"),
            player_list,
        )
    }

    pub fn game_created(game: GameId, username: &str, game_name: &str, player_list: &[String]) -> Self {
        Self::new(
            game,
            format!("Player **{username}** created team **{game_name}**"),
            player_list,
        )
    }
}
