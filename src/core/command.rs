//! The FOOT_COMMANDV string-vector command protocol.
//!
//! ICCCM/EWMH has no verbs for creating, deleting or renaming desktops so
//! those operations travel through a custom root window property instead: a
//! UTF8_STRING list interpreted as an argv. Clients write the property, the
//! window manager observes the PropertyNotify and parses the vector.
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A decoded FOOT_COMMANDV command.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `desktop insert <name> <index>`: create a desktop
    DesktopInsert {
        /// The (unique) name for the new desktop
        name: String,
        /// Where in the desktop list to insert it
        index: usize,
    },
    /// `desktop delete <index>`: delete a desktop, parking its windows
    DesktopDelete {
        /// The desktop to delete
        index: usize,
    },
    /// `desktop rename <index> <new-name>`: rename a desktop
    DesktopRename {
        /// The desktop to rename
        index: usize,
        /// Its new (unique) name
        name: String,
    },
    /// `desktop select <index>`: make a desktop current
    DesktopSelect {
        /// The desktop to select
        index: usize,
    },
    /// `window ...`: reserved for future window commands, currently ignored
    Window,
}

impl Command {
    /// Parse a command argv as read from the FOOT_COMMANDV property.
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let err = |reason: &str| {
            let joined: Vec<&str> = argv.iter().map(|s| s.as_ref()).collect();
            Error::InvalidCommand(format!("{reason}: {:?}", joined))
        };
        let index = |s: &S| {
            s.as_ref()
                .parse::<usize>()
                .map_err(|_| err("invalid index"))
        };

        let strs: Vec<&str> = argv.iter().map(|s| s.as_ref()).collect();

        match strs.first() {
            Some(&"desktop") => match (strs.get(1), argv.get(2), argv.get(3), argv.get(4)) {
                (Some(&"insert"), Some(name), Some(ix), None) => Ok(Self::DesktopInsert {
                    name: name.as_ref().to_string(),
                    index: index(ix)?,
                }),
                (Some(&"delete"), Some(ix), None, None) => {
                    Ok(Self::DesktopDelete { index: index(ix)? })
                }
                (Some(&"rename"), Some(ix), Some(name), None) => Ok(Self::DesktopRename {
                    index: index(ix)?,
                    name: name.as_ref().to_string(),
                }),
                (Some(&"select"), Some(ix), None, None) => {
                    Ok(Self::DesktopSelect { index: index(ix)? })
                }
                _ => Err(err("unknown desktop command")),
            },
            Some(&"window") => Ok(Self::Window),
            _ => Err(err("unknown command")),
        }
    }

    /// Encode this command as the argv to write to FOOT_COMMANDV. The
    /// client side half of [parse][Command::parse].
    pub fn to_argv(&self) -> Vec<String> {
        let s = |v: &str| v.to_string();

        match self {
            Self::DesktopInsert { name, index } => {
                vec![s("desktop"), s("insert"), name.clone(), index.to_string()]
            }
            Self::DesktopDelete { index } => vec![s("desktop"), s("delete"), index.to_string()],
            Self::DesktopRename { index, name } => {
                vec![s("desktop"), s("rename"), index.to_string(), name.clone()]
            }
            Self::DesktopSelect { index } => vec![s("desktop"), s("select"), index.to_string()],
            Self::Window => vec![s("window")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use simple_test_case::test_case;

    fn argv(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test_case(
        &["desktop", "insert", "work", "0"],
        Command::DesktopInsert { name: "work".into(), index: 0 };
        "insert"
    )]
    #[test_case(&["desktop", "delete", "2"], Command::DesktopDelete { index: 2 }; "delete")]
    #[test_case(
        &["desktop", "rename", "1", "play"],
        Command::DesktopRename { index: 1, name: "play".into() };
        "rename"
    )]
    #[test_case(&["desktop", "select", "3"], Command::DesktopSelect { index: 3 }; "select")]
    #[test_case(&["window"], Command::Window; "reserved window verb")]
    #[test]
    fn parse(raw: &[&str], expected: Command) {
        assert_eq!(Command::parse(&argv(raw)).unwrap(), expected);
    }

    #[test_case(&[]; "empty argv")]
    #[test_case(&["desktop"]; "missing subcommand")]
    #[test_case(&["desktop", "insert", "work"]; "missing index")]
    #[test_case(&["desktop", "delete", "two"]; "non numeric index")]
    #[test_case(&["desktop", "explode", "1"]; "unknown subcommand")]
    #[test_case(&["session", "save"]; "unknown verb")]
    #[test_case(&["desktop", "delete", "1", "extra"]; "delete with trailing arguments")]
    #[test_case(&["desktop", "insert", "work", "0", "extra"]; "insert with trailing arguments")]
    #[test_case(&["desktop", "rename", "1", "play", "extra"]; "rename with trailing arguments")]
    #[test_case(&["desktop", "select", "2", "extra"]; "select with trailing arguments")]
    #[test]
    fn parse_errors(raw: &[&str]) {
        assert!(matches!(
            Command::parse(&argv(raw)),
            Err(Error::InvalidCommand(_))
        ));
    }

    impl Arbitrary for Command {
        fn arbitrary(g: &mut Gen) -> Self {
            let name = |g: &mut Gen| {
                let s = String::arbitrary(g).replace('\0', "");
                if s.is_empty() {
                    "d".to_string()
                } else {
                    s
                }
            };

            match u8::arbitrary(g) % 5 {
                0 => Self::DesktopInsert {
                    name: name(g),
                    index: usize::arbitrary(g),
                },
                1 => Self::DesktopDelete {
                    index: usize::arbitrary(g),
                },
                2 => Self::DesktopRename {
                    index: usize::arbitrary(g),
                    name: name(g),
                },
                3 => Self::DesktopSelect {
                    index: usize::arbitrary(g),
                },
                _ => Self::Window,
            }
        }
    }

    #[quickcheck]
    fn commands_round_trip_through_argv(cmd: Command) -> bool {
        Command::parse(&cmd.to_argv()).unwrap() == cmd
    }
}
