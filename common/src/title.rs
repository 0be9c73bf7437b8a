//! The fixed roster of supported titles: the 20-character client tokens that
//! identify them, their listening ports, and the handful of per-title quirks
//! (full-width text, handle length, flagship suffix) the rest of the system
//! keys off of.

/// Stable identifier for a supported game. Never renumber these: the integer
/// value is persisted as `GAME` in the handle and extra-mem tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameId {
    Daytona = 0,
    DaytonaJp = 1,
    Tetris = 2,
    GolfShiyouYo = 3,
    AeroDancingI = 4,
    HundredSwords = 5,
    CuldCept = 6,
    AeroDancingF = 7,
}

impl GameId {
    pub const ALL: [GameId; 8] = [
        GameId::Daytona,
        GameId::DaytonaJp,
        GameId::Tetris,
        GameId::GolfShiyouYo,
        GameId::AeroDancingI,
        GameId::HundredSwords,
        GameId::CuldCept,
        GameId::AeroDancingF,
    ];

    /// The title's matching 20-character client token. Used only for tests
    /// and documentation; lookup direction is always token -> title.
    pub fn canonical_token(self) -> Option<&'static str> {
        match self {
            GameId::Daytona => None, // flagship: matched by fallback, not a token
            GameId::DaytonaJp => Some("S00001S0001010440110"),
            GameId::Tetris => Some("F00001S0000810380101"),
            GameId::GolfShiyouYo => Some("T00009T0000910430101"),
            GameId::AeroDancingI => Some("F00005T0000510410101"),
            GameId::HundredSwords => Some("F00001S0000110490101"),
            GameId::CuldCept => Some("T00011T0001110500101"),
            GameId::AeroDancingF => Some("F00005T0000510420101"),
        }
    }
}

/// Static per-title configuration: everything about a game that is fixed at
/// compile time rather than read from `iwango.cfg`.
#[derive(Debug, Clone, Copy)]
pub struct Title {
    pub id: GameId,
    pub display_name: &'static str,
    pub port: u16,
    /// True for titles whose on-wire text requires full-width ASCII mapping.
    pub full_width: bool,
    /// Maximum length of a handle on the wire for this title.
    pub max_handle_len: usize,
    /// True for the flagship title, which appends `.us` to sanitised default handles.
    pub is_flagship: bool,
}

impl Title {
    pub const fn for_id(id: GameId) -> &'static Title {
        match id {
            GameId::Daytona => &TITLES[0],
            GameId::DaytonaJp => &TITLES[1],
            GameId::Tetris => &TITLES[2],
            GameId::GolfShiyouYo => &TITLES[3],
            GameId::AeroDancingI => &TITLES[4],
            GameId::HundredSwords => &TITLES[5],
            GameId::CuldCept => &TITLES[6],
            GameId::AeroDancingF => &TITLES[7],
        }
    }

    /// Every client-supplied 20-character token is matched bit-for-bit
    /// against the table below; anything unrecognised falls through to the
    /// flagship title, matching the wire behaviour this system must preserve.
    pub fn from_token(token: &str) -> &'static Title {
        match token {
            "S00001S0001010440110" => Title::for_id(GameId::DaytonaJp),
            "F00001S0000810380101" => Title::for_id(GameId::Tetris),
            "T00009T0000910430101" => Title::for_id(GameId::GolfShiyouYo),
            "F00005T0000510410101" | "F00005T0000510700101" => Title::for_id(GameId::AeroDancingI),
            "F00001S0000110490101" => Title::for_id(GameId::HundredSwords),
            "T00011T0001110500101" => Title::for_id(GameId::CuldCept),
            "F00005T0000510420101" => Title::for_id(GameId::AeroDancingF),
            _ => Title::for_id(GameId::Daytona),
        }
    }
}

pub const GATE_PORT: u16 = 9500;

static TITLES: [Title; 8] = [
    Title {
        id: GameId::Daytona,
        display_name: "Daytona USA",
        port: 9501,
        full_width: false,
        max_handle_len: 19,
        is_flagship: true,
    },
    Title {
        id: GameId::DaytonaJp,
        display_name: "Daytona USA",
        port: 9502,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
    Title {
        id: GameId::Tetris,
        display_name: "Sega Tetris",
        port: 9503,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
    Title {
        id: GameId::GolfShiyouYo,
        display_name: "Golf Shiyou Yo 2",
        port: 9504,
        full_width: true,
        max_handle_len: 9,
        is_flagship: false,
    },
    Title {
        id: GameId::AeroDancingI,
        display_name: "Aero Dancing i",
        port: 9505,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
    Title {
        id: GameId::HundredSwords,
        display_name: "Hundred Swords",
        port: 9506,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
    Title {
        id: GameId::CuldCept,
        display_name: "Culdcept",
        port: 9507,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
    Title {
        id: GameId::AeroDancingF,
        display_name: "Aero Dancing F",
        port: 9508,
        full_width: false,
        max_handle_len: 19,
        is_flagship: false,
    },
];

/// Sanitises a client-proposed default handle: banned characters become `_`,
/// the result is truncated to the title's wire length budget, and the
/// flagship title appends `.us` if there's room.
pub fn sanitize_default_handle(title: &Title, raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .map(|c| match c {
            ' ' | '#' | '&' | '*' | '=' => '_',
            other => other,
        })
        .collect();
    cleaned.truncate(title.max_handle_len);
    if title.is_flagship {
        const SUFFIX: &str = ".us";
        let budget = title.max_handle_len.saturating_sub(SUFFIX.len());
        cleaned.truncate(budget);
        cleaned.push_str(SUFFIX);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_token_falls_back_to_flagship() {
        assert_eq!(Title::from_token("garbage").id, GameId::Daytona);
        assert_eq!(Title::from_token("").id, GameId::Daytona);
    }

    #[test]
    fn known_tokens_map_exactly() {
        assert_eq!(
            Title::from_token("T00009T0000910430101").id,
            GameId::GolfShiyouYo
        );
        assert_eq!(
            Title::from_token("T00011T0001110500101").id,
            GameId::CuldCept
        );
    }

    #[test]
    fn aerodancing_has_two_tokens() {
        assert_eq!(
            Title::from_token("F00005T0000510410101").id,
            GameId::AeroDancingI
        );
        assert_eq!(
            Title::from_token("F00005T0000510700101").id,
            GameId::AeroDancingI
        );
    }

    #[test]
    fn sanitize_replaces_banned_chars_and_truncates() {
        let flagship = Title::for_id(GameId::Daytona);
        let handle = sanitize_default_handle(flagship, "A B#C&D*E=F");
        assert!(!handle.contains(' '));
        assert!(handle.ends_with(".us"));
        assert!(handle.len() <= flagship.max_handle_len);
    }

    #[test]
    fn sanitize_truncates_to_title_length() {
        let golf = Title::for_id(GameId::GolfShiyouYo);
        let handle = sanitize_default_handle(golf, "areallylongdefaulthandlename");
        assert_eq!(handle.len(), golf.max_handle_len);
    }
}
