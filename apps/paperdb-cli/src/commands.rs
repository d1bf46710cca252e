//! Shell command parsing.

use std::path::PathBuf;

use paperdb_core::types::{Filter, SearchQuery};
use paperdb_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ingest(PathBuf),
    Ask(String),
    Search(SearchQuery),
    Status,
    Invalidate(Target),
    Settings,
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Path(PathBuf),
}

pub const HELP: &[(&str, &str)] = &[
    ("ingest <folder>", "Parse and index the PDFs of a folder (runs to completion, Ctrl-C is ignored)"),
    ("ask <question>", "Ask a question about the indexed documents"),
    (
        "search <text> [-n N] [-o OFFSET] [-t TITLE] [--figures|--prose]",
        "Similarity search without question refinement; quote titles with spaces",
    ),
    ("status", "Show index statistics and sample chunks"),
    ("invalidate <file|folder|all>", "Remove documents from the index (runs to completion)"),
    ("settings", "Show the current configuration"),
    ("help", "Show this help message; Ctrl-C interrupts ask, search and status"),
    ("exit", "Leave the shell"),
];

/// Parse one input line. A blank line is `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, args) = match line.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (line, ""),
    };
    let command = match name.to_ascii_lowercase().as_str() {
        "ingest" => Command::Ingest(PathBuf::from(required(args, "Please specify a folder path")?)),
        "ask" => Command::Ask(required(args, "Please specify a question")?.to_string()),
        "search" => Command::Search(parse_search(args)?),
        "status" => Command::Status,
        "invalidate" => {
            let target = required(args, "Please specify a file or folder path, or 'all'")?;
            if target.eq_ignore_ascii_case("all") {
                Command::Invalidate(Target::All)
            } else {
                Command::Invalidate(Target::Path(PathBuf::from(target)))
            }
        }
        "settings" => Command::Settings,
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => {
            return Err(Error::Input(format!("Unknown command '{other}'. Type 'help' for available commands.")))
        }
    };
    Ok(Some(command))
}

fn required<'a>(args: &'a str, message: &str) -> Result<&'a str> {
    if args.is_empty() {
        Err(Error::Input(message.to_string()))
    } else {
        Ok(args)
    }
}

fn parse_search(args: &str) -> Result<SearchQuery> {
    let mut query = SearchQuery::new("");
    let mut words = Vec::new();
    let mut figures = None;
    let arguments = split_arguments(args)?;
    let mut parts = arguments.iter().map(String::as_str);
    while let Some(part) = parts.next() {
        match part {
            "-n" | "--limit" => query.size = number(part, parts.next())?,
            "-o" | "--offset" => query.offset = number(part, parts.next())?,
            "-t" | "--title" => {
                let title = parts
                    .next()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| Error::Input(format!("{part} requires a title")))?;
                query.filters.push(Filter::Title(title.to_string()));
            }
            "--figures" | "--prose" => {
                let wanted = part == "--figures";
                if figures.is_some_and(|f| f != wanted) {
                    return Err(Error::Input("--figures and --prose are exclusive".into()));
                }
                figures = Some(wanted);
            }
            word => words.push(word),
        }
    }
    if let Some(is_figure) = figures {
        query.filters.push(Filter::Figures(is_figure));
    }
    query.text = words.join(" ");
    if query.text.is_empty() {
        return Err(Error::Input("Please specify search text".into()));
    }
    Ok(query)
}

/// Split on whitespace, keeping double-quoted runs together.
fn split_arguments(args: &str) -> Result<Vec<String>> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    for c in args.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    arguments.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if quoted {
        return Err(Error::Input("Unterminated quote".into()));
    }
    if started {
        arguments.push(current);
    }
    Ok(arguments)
}

fn number(flag: &str, value: Option<&str>) -> Result<usize> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Input(format!("{flag} requires a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("STATUS").unwrap(), Some(Command::Status));
        assert_eq!(parse("exit").unwrap(), Some(Command::Exit));
        assert_eq!(
            parse("ask  how do panels degrade? ").unwrap(),
            Some(Command::Ask("how do panels degrade?".into()))
        );
        assert_eq!(
            parse("ingest ~/papers/solar power").unwrap(),
            Some(Command::Ingest(PathBuf::from("~/papers/solar power")))
        );
    }

    #[test]
    fn missing_arguments_are_input_errors() {
        for line in ["ask", "ingest  ", "invalidate", "search -n 3"] {
            assert!(matches!(parse(line), Err(Error::Input(_))), "{line}");
        }
        assert!(matches!(parse("reload"), Err(Error::Input(_))));
    }

    #[test]
    fn invalidate_all_is_case_insensitive() {
        assert_eq!(parse("invalidate ALL").unwrap(), Some(Command::Invalidate(Target::All)));
        assert_eq!(
            parse("invalidate papers/a.pdf").unwrap(),
            Some(Command::Invalidate(Target::Path(PathBuf::from("papers/a.pdf"))))
        );
    }

    #[test]
    fn search_flags() {
        let Some(Command::Search(q)) = parse("search battery -n 3 storage -o 2 -t manual.pdf --figures").unwrap()
        else {
            panic!("expected search");
        };
        assert_eq!(q.text, "battery storage");
        assert_eq!((q.size, q.offset), (3, 2));
        assert_eq!(q.filters, vec![Filter::Title("manual.pdf".into()), Filter::Figures(true)]);

        assert!(parse("search x -n many").is_err());
        assert!(parse("search x --figures --prose").is_err());
        assert!(parse("search x -t").is_err());
    }

    #[test]
    fn search_accepts_quoted_values() {
        let Some(Command::Search(q)) = parse(r#"search "grid tie" inverter -t "solar manual.pdf" -n 2"#).unwrap()
        else {
            panic!("expected search");
        };
        assert_eq!(q.text, "grid tie inverter");
        assert_eq!(q.size, 2);
        assert_eq!(q.filters, vec![Filter::Title("solar manual.pdf".into())]);

        assert!(matches!(parse(r#"search x -t "solar manual.pdf"#), Err(Error::Input(_))));
        assert!(matches!(parse(r#"search x -t """#), Err(Error::Input(_))));
    }
}
