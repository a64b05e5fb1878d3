use crate::{disk::DEFAULT_BLOCK_SIZE, shell::command::Command};

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "format" => match args.first() {
            Some(size) => size.parse().ok().map(Command::Format),
            None => Some(Command::Format(DEFAULT_BLOCK_SIZE)),
        },
        "create" => args.first().map(|&name| Command::Create(name.to_string())),
        "open" => args.first().map(|&name| Command::Open(name.to_string())),
        "close" => args.first()?.parse().ok().map(Command::Close),
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].parse().ok()?, args[1..].join(" ")))
            } else {
                None
            }
        }
        "read" => {
            let fd = args.first()?.parse().ok()?;
            let len = args.get(1)?.parse().ok()?;
            Some(Command::Read(fd, len))
        }
        "rm" => args.first().map(|&name| Command::Rm(name.to_string())),
        "cp" => pair(args).map(|(src, dest)| Command::Cp(src, dest)),
        "mv" => pair(args).map(|(old, new)| Command::Mv(old, new)),
        "ls" => Some(Command::Ls),
        "list" => Some(Command::List),
        "stat" => args.first().map(|&name| Command::Stat(name.to_string())),
        "df" => Some(Command::Df),
        "fsck" => Some(Command::Fsck),
        "sync" => Some(Command::Sync),
        "clear" => Some(Command::Clear),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

fn pair(args: &[&str]) -> Option<(String, String)> {
    match args {
        [a, b, ..] => Some((a.to_string(), b.to_string())),
        _ => None,
    }
}
