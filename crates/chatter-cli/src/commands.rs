//! Parsing of the line-oriented command language.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Signup { uid: String, email: String, name: String },
    Login { uid: String },
    Whoami,
    Search { text: String },
    Open { uid: String },
    Send { text: String },
    Inbox,
    History,
    Logout,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
commands:
  signup <uid> <email> [name...]   register and sign in
  login <uid>                      sign in (or switch to) an existing user
  whoami                           show the active user
  search <text>                    find people by name or email
  open <uid>                       open the conversation with a user
  send <text...>                   send to the open conversation (bare text works too)
  inbox                            list recent conversations
  history                          show the open conversation
  logout                           sign the active user out
  help                             show this text
  quit                             exit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let required = |what: &str| {
            if rest.is_empty() {
                Err(format!("usage: {word} <{what}>"))
            } else {
                Ok(rest.to_string())
            }
        };

        match word {
            "signup" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                match (parts.next(), parts.next()) {
                    (Some(uid), Some(email)) if !uid.is_empty() && !email.is_empty() => {
                        Ok(Command::Signup {
                            uid: uid.to_string(),
                            email: email.to_string(),
                            name: parts.next().unwrap_or_default().trim().to_string(),
                        })
                    }
                    _ => Err("usage: signup <uid> <email> [name...]".to_string()),
                }
            }
            "login" => Ok(Command::Login { uid: required("uid")? }),
            "whoami" => Ok(Command::Whoami),
            "search" => Ok(Command::Search { text: rest.to_string() }),
            "open" => Ok(Command::Open { uid: required("uid")? }),
            "send" => Ok(Command::Send { text: rest.to_string() }),
            "inbox" => Ok(Command::Inbox),
            "history" => Ok(Command::History),
            "logout" => Ok(Command::Logout),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Ok(Command::Send { text: line.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_with_and_without_name() {
        assert_eq!(
            Command::parse("signup u2 ada@example.com Ada Lovelace"),
            Ok(Command::Signup {
                uid: "u2".into(),
                email: "ada@example.com".into(),
                name: "Ada Lovelace".into(),
            })
        );
        assert_eq!(
            Command::parse("signup u2 ada@example.com"),
            Ok(Command::Signup {
                uid: "u2".into(),
                email: "ada@example.com".into(),
                name: String::new(),
            })
        );
        assert!(Command::parse("signup u2").is_err());
    }

    #[test]
    fn test_bare_text_sends() {
        assert_eq!(
            Command::parse("hey Ada, how are you?"),
            Ok(Command::Send { text: "hey Ada, how are you?".into() })
        );
        assert_eq!(
            Command::parse("send   spaced out  "),
            Ok(Command::Send { text: "spaced out".into() })
        );
    }

    #[test]
    fn test_required_arguments() {
        assert!(Command::parse("open").is_err());
        assert!(Command::parse("login").is_err());
        assert_eq!(Command::parse("open u2"), Ok(Command::Open { uid: "u2".into() }));
        assert_eq!(Command::parse("   "), Ok(Command::Empty));
        assert_eq!(Command::parse("exit"), Ok(Command::Quit));
    }
}
