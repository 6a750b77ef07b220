/// A slash command with its raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Help,
    Key,
    Buy(Option<String>),
    Support,
    Cancel,
    // owner only
    Price(Option<String>),
    Give(Option<String>),
    GenKey(Option<String>),
    Revoke(Option<String>),
    Reply(Option<String>),
    Keys,
    Stats,
    Broadcast,
    Confirm,
    Unknown(String),
}

impl ChatCommand {
    /// `None` for plain text. Accepts the `/cmd@botname` form.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let args = (!args.is_empty()).then(|| args.to_string());

        let command = match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "key" => Self::Key,
            "buy" => Self::Buy(args),
            "support" => Self::Support,
            "cancel" => Self::Cancel,
            "price" => Self::Price(args),
            "give" => Self::Give(args),
            "genkey" => Self::GenKey(args),
            "revoke" => Self::Revoke(args),
            "reply" => Self::Reply(args),
            "keys" => Self::Keys,
            "stats" => Self::Stats,
            "broadcast" => Self::Broadcast,
            "confirm" => Self::Confirm,
            _ => Self::Unknown(name),
        };
        Some(command)
    }

    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Self::Price(_)
                | Self::Give(_)
                | Self::GenKey(_)
                | Self::Revoke(_)
                | Self::Reply(_)
                | Self::Keys
                | Self::Stats
                | Self::Broadcast
                | Self::Confirm
        )
    }
}

/// Splits `"<user_id> <rest>"`; `rest` may be empty.
pub fn split_target(args: &str) -> Option<(i64, &str)> {
    let args = args.trim();
    let (id, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let id = id.parse().ok()?;
    Some((id, rest.trim()))
}
