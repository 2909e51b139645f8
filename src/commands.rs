use crate::giveaway::CreateGiveaway;
use thiserror::Error;

/// Command words that can never be used as a giveaway entry token.
pub const RESERVED_TOKENS: &[&str] = &[
    "!addadmin",
    "!removeadmin",
    "!blacklist",
    "!kill",
    "!createprizelist",
    "!creategiveaway",
    "!endgiveaway",
    "!cancelgiveaway",
    "!quit",
    "!exit",
    "!shutdown",
    "!rank",
    "!level",
    "!timeleft",
    "!winners",
];

pub fn is_reserved_token(token: &str) -> bool {
    let token = token.trim().to_lowercase();
    RESERVED_TOKENS.contains(&token.as_str())
}

/// A malformed command. The message is the chat notice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub type Result<T, E = CommandError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    AddAdmin(String),
    RemoveAdmin(String),
    /// Identity or `@name` to ignore from now on.
    Ignore(String),
    CreatePrizeList {
        name: String,
        prizes: Vec<String>,
    },
    CreateGiveaway(CreateGiveaway),
    EndGiveaway {
        entry_token: String,
    },
    SetEndIn {
        entry_token: String,
        seconds: i64,
    },
    CancelGiveaway {
        entry_token: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Rank,
    TimeLeft { entry_token: String },
    Winners { entry_token: String },
    /// Any other `!word`; it enters the giveaway of that name if one is live.
    Enter { entry_token: String },
}

/// Splits off the command word. The word ends at whitespace or a comma and is
/// lower-cased; the remainder is returned untouched.
fn split_head(text: &str) -> Option<(String, &str)> {
    let text = text.trim();
    if !text.starts_with('!') {
        return None;
    }
    let end = text
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(text.len());
    Some((text[..end].to_lowercase(), &text[end..]))
}

fn first_arg(rest: &str) -> Option<String> {
    rest.split_whitespace()
        .next()
        .map(|arg| arg.trim_matches(',').to_string())
        .filter(|arg| !arg.is_empty())
}

fn comma_fields(rest: &str) -> Vec<String> {
    let rest = rest.trim_matches(|c: char| c.is_whitespace() || c == ',');
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split(',').map(|field| field.trim().to_string()).collect()
}

/// `None` for a blank or `none` field.
fn optional_field(fields: &[String], i: usize) -> Option<&str> {
    fields
        .get(i)
        .map(String::as_str)
        .filter(|field| !field.is_empty() && !field.eq_ignore_ascii_case("none"))
}

/// `name, !entry, minutes, whitelist, prizelist, winners, minlvl`. Every field after
/// the entry token may be left out or given as `none`.
pub fn parse_create_args(rest: &str) -> CreateGiveaway {
    let fields = comma_fields(rest);
    let count_or_one = |i: usize| {
        optional_field(&fields, i)
            .and_then(|field| field.parse::<u32>().ok())
            .unwrap_or(1)
    };
    CreateGiveaway {
        name: fields.first().cloned().unwrap_or_default(),
        entry_token: fields.get(1).cloned().unwrap_or_default(),
        minutes: optional_field(&fields, 2)
            .and_then(|field| field.parse::<f64>().ok())
            .filter(|minutes| minutes.is_finite()),
        whitelist: optional_field(&fields, 3).map(str::to_string),
        prize_list: optional_field(&fields, 4).map(str::to_string),
        winner_count: count_or_one(5),
        min_level: count_or_one(6).max(1),
    }
}

/// `Ok(None)` when the text is not an operator command.
pub fn parse_operator_command(text: &str) -> Result<Option<OperatorCommand>> {
    let Some((head, rest)) = split_head(text) else {
        return Ok(None);
    };
    let command = match head.as_str() {
        "!addadmin" => OperatorCommand::AddAdmin(
            first_arg(rest)
                .ok_or(CommandError::Usage("!addadmin @someone"))?
                .to_lowercase(),
        ),
        "!removeadmin" => OperatorCommand::RemoveAdmin(
            first_arg(rest)
                .ok_or(CommandError::Usage("!removeadmin @someone"))?
                .to_lowercase(),
        ),
        "!blacklist" | "!kill" => OperatorCommand::Ignore(
            first_arg(rest)
                .ok_or(CommandError::Usage(
                    "!blacklist @someone OR !blacklist 0xWallet",
                ))?
                .to_lowercase(),
        ),
        "!createprizelist" => {
            let mut fields = comma_fields(rest).into_iter();
            let name = fields.next().unwrap_or_default();
            OperatorCommand::CreatePrizeList {
                name,
                prizes: fields.collect(),
            }
        }
        "!creategiveaway" => {
            if comma_fields(rest).is_empty() {
                return Err(CommandError::Usage(
                    "!creategiveaway, name, !entry, minutes, whitelist, prizelist, winners, minlvl",
                ));
            }
            OperatorCommand::CreateGiveaway(parse_create_args(rest))
        }
        "!endgiveaway" => {
            let mut args = rest.split_whitespace();
            let entry_token = args
                .next()
                .map(str::to_string)
                .ok_or(CommandError::Usage("!endgiveaway !entry [seconds]"))?;
            match args.next().and_then(|arg| arg.parse::<i64>().ok()) {
                Some(seconds) => OperatorCommand::SetEndIn {
                    entry_token,
                    seconds,
                },
                None => OperatorCommand::EndGiveaway { entry_token },
            }
        }
        "!cancelgiveaway" => OperatorCommand::CancelGiveaway {
            entry_token: first_arg(rest).ok_or(CommandError::Usage("!cancelgiveaway !entry"))?,
        },
        "!quit" | "!exit" | "!shutdown" => OperatorCommand::Shutdown,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// `Ok(None)` when the text is not a participant command.
pub fn parse_user_command(text: &str) -> Result<Option<UserCommand>> {
    let Some((head, rest)) = split_head(text) else {
        return Ok(None);
    };
    let command = match head.as_str() {
        "!rank" | "!level" => UserCommand::Rank,
        "!timeleft" => UserCommand::TimeLeft {
            entry_token: first_arg(rest).ok_or(CommandError::Usage("!timeleft !entrycmd"))?,
        },
        "!winners" => UserCommand::Winners {
            entry_token: first_arg(rest).ok_or(CommandError::Usage("!winners !entrycmd"))?,
        },
        "!" => return Ok(None),
        token if is_reserved_token(token) => return Ok(None),
        token => UserCommand::Enter {
            entry_token: token.to_string(),
        },
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tokens_ignore_case() {
        assert!(is_reserved_token("!Rank"));
        assert!(is_reserved_token(" !SHUTDOWN "));
        assert!(!is_reserved_token("!foam"));
    }

    #[test]
    fn test_operator_commands() {
        assert_eq!(
            parse_operator_command("!AddAdmin 0xABC").unwrap(),
            Some(OperatorCommand::AddAdmin("0xabc".to_string()))
        );
        assert_eq!(
            parse_operator_command("!kill @Spammer").unwrap(),
            Some(OperatorCommand::Ignore("@spammer".to_string()))
        );
        assert_eq!(
            parse_operator_command("!endgiveaway !foam").unwrap(),
            Some(OperatorCommand::EndGiveaway {
                entry_token: "!foam".to_string()
            })
        );
        assert_eq!(
            parse_operator_command("!endgiveaway !foam 30").unwrap(),
            Some(OperatorCommand::SetEndIn {
                entry_token: "!foam".to_string(),
                seconds: 30
            })
        );
        assert_eq!(
            parse_operator_command("!endgiveaway !foam soon").unwrap(),
            Some(OperatorCommand::EndGiveaway {
                entry_token: "!foam".to_string()
            })
        );
        assert_eq!(
            parse_operator_command("!Shutdown now").unwrap(),
            Some(OperatorCommand::Shutdown)
        );
        assert_eq!(parse_operator_command("!rank").unwrap(), None);
        assert_eq!(parse_operator_command("hello !quit").unwrap(), None);
    }

    #[test]
    fn test_missing_arguments_give_usage() {
        let err = parse_operator_command("!cancelgiveaway").unwrap_err();
        assert_eq!(err.to_string(), "Usage: !cancelgiveaway !entry");
        assert_eq!(
            parse_operator_command("!endgiveaway").unwrap_err(),
            CommandError::Usage("!endgiveaway !entry [seconds]")
        );
        assert!(parse_operator_command("!creategiveaway ,").is_err());
        assert_eq!(
            parse_user_command("!winners").unwrap_err().to_string(),
            "Usage: !winners !entrycmd"
        );
    }

    #[test]
    fn test_create_giveaway_fields() {
        let Some(OperatorCommand::CreateGiveaway(request)) =
            parse_operator_command("!creategiveaway, Foam Party, !Foam, 0.1, none, shirts, 3, 0")
                .unwrap()
        else {
            panic!("expected a create command");
        };
        assert_eq!(request.name, "Foam Party");
        assert_eq!(request.entry_token, "!Foam");
        assert_eq!(request.minutes, Some(0.1));
        assert_eq!(request.whitelist, None);
        assert_eq!(request.prize_list.as_deref(), Some("shirts"));
        assert_eq!(request.winner_count, 3);
        assert_eq!(request.min_level, 1);
    }

    #[test]
    fn test_create_giveaway_defaults() {
        let request = parse_create_args(" Foam, !foam");
        assert_eq!(request.minutes, None);
        assert_eq!(request.winner_count, 1);
        assert_eq!(request.min_level, 1);

        let request = parse_create_args("Foam, !foam, soon, , , many, NONE");
        assert_eq!(request.minutes, None);
        assert_eq!(request.whitelist, None);
        assert_eq!(request.winner_count, 1);
        assert_eq!(request.min_level, 1);

        assert_eq!(parse_create_args("Foam, !foam, inf").minutes, None);
    }

    #[test]
    fn test_prize_list_fields() {
        assert_eq!(
            parse_operator_command("!createprizelist shirts, Red shirt , Blue shirt,").unwrap(),
            Some(OperatorCommand::CreatePrizeList {
                name: "shirts".to_string(),
                prizes: vec!["Red shirt".to_string(), "Blue shirt".to_string()],
            })
        );
        assert_eq!(
            parse_operator_command("!createprizelist").unwrap(),
            Some(OperatorCommand::CreatePrizeList {
                name: String::new(),
                prizes: Vec::new(),
            })
        );
    }

    #[test]
    fn test_user_commands() {
        assert_eq!(parse_user_command(" !LEVEL ").unwrap(), Some(UserCommand::Rank));
        assert_eq!(
            parse_user_command("!timeleft !foam").unwrap(),
            Some(UserCommand::TimeLeft {
                entry_token: "!foam".to_string()
            })
        );
        assert_eq!(
            parse_user_command("!Foam please").unwrap(),
            Some(UserCommand::Enter {
                entry_token: "!foam".to_string()
            })
        );
        assert_eq!(parse_user_command("!creategiveaway, x, !y").unwrap(), None);
        assert_eq!(parse_user_command("!").unwrap(), None);
        assert_eq!(parse_user_command("gm everyone").unwrap(), None);
    }
}
