//! v1 command line grammar
//!
//! `<name> [tokens...] [-- <value>]`
//!
//! Tokens are whitespace separated. A double-quoted run may contain
//! whitespace and uses `\\` and `\"` escapes. Unquoted tokens of the form
//! `--name=value` or `--flag` that appear before a literal `--` are options.
//! Everything after the `--` separator is the positional value, taken
//! verbatim (or unquoted when it is a single quoted string).

use crate::error::CommandError;

/// Error parsing v1 arguments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("Unterminated quote")]
    UnterminatedQuote,

    #[error("Unknown option --{0}")]
    UnknownOption(String),

    #[error("Option --{0} requires a value")]
    MissingValue(String),
}

impl From<CommandParseError> for CommandError {
    fn from(err: CommandParseError) -> Self {
        CommandError::invalid_params(err.to_string())
    }
}

/// A v1 record split into command name and raw argument text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    /// Argument text after the name, leading whitespace removed
    pub raw: String,
}

impl CommandLine {
    /// Split a record; `None` for a blank line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start();
        if line.trim().is_empty() {
            return None;
        }
        let (name, raw) = match line.find(char::is_whitespace) {
            Some(split) => (&line[..split], line[split..].trim_start()),
            None => (line, ""),
        };
        Some(Self {
            name: name.to_string(),
            raw: raw.trim_end_matches(['\r', '\n']).to_string(),
        })
    }

    /// Tokenize the argument text into positionals and options
    pub fn args(&self) -> Result<CommandArgs, CommandParseError> {
        CommandArgs::parse(&self.raw)
    }
}

/// Tokenized v1 arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub positional: Vec<String>,
    /// Options in the order given; later duplicates win on lookup
    pub options: Vec<(String, Option<String>)>,
    /// Value after a `--` separator
    pub trailing: Option<String>,
}

struct Token {
    text: String,
    quoted_start: bool,
}

impl CommandArgs {
    pub fn parse(raw: &str) -> Result<Self, CommandParseError> {
        let mut args = CommandArgs::default();
        let mut rest = raw;

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let (token, remainder) = next_token(rest)?;
            if !token.quoted_start && token.text == "--" {
                let value = remainder.trim_start();
                args.trailing = Some(unquote_whole(value));
                break;
            }
            if !token.quoted_start && token.text.starts_with("--") && token.text.len() > 2 {
                let body = &token.text[2..];
                match body.split_once('=') {
                    Some((name, value)) => args
                        .options
                        .push((name.to_string(), Some(value.to_string()))),
                    None => args.options.push((body.to_string(), None)),
                }
            } else {
                args.positional.push(token.text);
            }
            rest = remainder;
        }

        Ok(args)
    }

    /// Value of `--name=value`; `None` if absent or given as a bare flag
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Value of an option that must carry `=value` when present
    pub fn option_value(&self, name: &str) -> Result<Option<&str>, CommandParseError> {
        match self.options.iter().rev().find(|(n, _)| n == name) {
            Some((_, Some(value))) => Ok(Some(value.as_str())),
            Some((_, None)) => Err(CommandParseError::MissingValue(name.to_string())),
            None => Ok(None),
        }
    }

    /// Whether `--name` appeared in either form
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    /// Fail on any option outside `allowed`
    pub fn reject_unknown_options(&self, allowed: &[&str]) -> Result<(), CommandParseError> {
        match self
            .options
            .iter()
            .find(|(n, _)| !allowed.contains(&n.as_str()))
        {
            Some((name, _)) => Err(CommandParseError::UnknownOption(name.clone())),
            None => Ok(()),
        }
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// The free-text value: the trailing value if present, else the
    /// positionals from `start` joined by single spaces
    pub fn text_from(&self, start: usize) -> Option<String> {
        if let Some(trailing) = &self.trailing {
            return Some(trailing.clone());
        }
        if self.positional.len() > start {
            Some(self.positional[start..].join(" "))
        } else {
            None
        }
    }
}

/// Read one token from the front of `input` (which has no leading space)
fn next_token(input: &str) -> Result<(Token, &str), CommandParseError> {
    let mut text = String::new();
    let quoted_start = input.starts_with('"');
    let mut chars = input.char_indices();
    let mut in_quotes = false;

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => match chars.next() {
                Some((_, escaped @ ('\\' | '"'))) => text.push(escaped),
                Some((_, other)) => {
                    text.push('\\');
                    text.push(other);
                }
                None => return Err(CommandParseError::UnterminatedQuote),
            },
            c if c.is_whitespace() && !in_quotes => {
                return Ok((Token { text, quoted_start }, &input[idx..]));
            }
            c => text.push(c),
        }
    }

    if in_quotes {
        return Err(CommandParseError::UnterminatedQuote);
    }
    Ok((Token { text, quoted_start }, ""))
}

/// Unquote a value that is exactly one quoted string, else return it as-is
fn unquote_whole(value: &str) -> String {
    let trimmed = value.trim_end();
    if trimmed.len() >= 2 && trimmed.starts_with('"') {
        if let Ok((token, rest)) = next_token(trimmed) {
            if rest.is_empty() && trimmed.ends_with('"') {
                return token.text;
            }
        }
    }
    value.to_string()
}

/// Quote a value for use as `--name=<value>` or after `--`
pub fn quote_option_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Interpret `\n`, `\r`, `\t` and `\\` escapes used by `send` payloads
pub fn unescape_controls(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        let line = CommandLine::parse("  select_workspace   2 ").unwrap();
        assert_eq!(line.name, "select_workspace");
        assert_eq!(line.raw, "2 ");
        assert!(CommandLine::parse("   ").is_none());
        assert_eq!(CommandLine::parse("ping").unwrap().raw, "");
    }

    #[test]
    fn test_options_before_separator() {
        let args = CommandArgs::parse(
            "task --icon=sf:doc --url=\"https://x/y z\" --priority=50 --tab=1 -- \"--force is \\\"fine\\\"\"",
        )
        .unwrap();
        assert_eq!(args.positional, vec!["task"]);
        assert_eq!(args.option("icon"), Some("sf:doc"));
        assert_eq!(args.option("url"), Some("https://x/y z"));
        assert_eq!(args.option("priority"), Some("50"));
        assert_eq!(args.trailing.as_deref(), Some("--force is \"fine\""));
    }

    #[test]
    fn test_trailing_verbatim_when_not_single_quoted() {
        let args = CommandArgs::parse("-- --tab=3 hello  world").unwrap();
        assert!(args.options.is_empty());
        assert_eq!(args.trailing.as_deref(), Some("--tab=3 hello  world"));
    }

    #[test]
    fn test_options_after_positionals() {
        let args = CommandArgs::parse("0.5 --label=\"Building\"").unwrap();
        assert_eq!(args.positional(0), Some("0.5"));
        assert_eq!(args.option("label"), Some("Building"));
        assert_eq!(args.text_from(0).as_deref(), Some("0.5"));
    }

    #[test]
    fn test_quoted_token_is_not_an_option() {
        let args = CommandArgs::parse("\"--tab=1\"").unwrap();
        assert_eq!(args.positional, vec!["--tab=1"]);
        assert!(args.options.is_empty());
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            CommandArgs::parse("key -- \"open").map(|a| a.trailing),
            Ok(Some("\"open".to_string()))
        );
        assert_eq!(
            CommandArgs::parse("--url=\"open"),
            Err(CommandParseError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_unknown_and_valueless_options() {
        let args = CommandArgs::parse("--tab=1 --focus --bogus=2").unwrap();
        assert!(args.has_option("focus"));
        assert_eq!(
            args.reject_unknown_options(&["tab", "focus"]),
            Err(CommandParseError::UnknownOption("bogus".into()))
        );
        assert_eq!(
            args.option_value("focus"),
            Err(CommandParseError::MissingValue("focus".into()))
        );
    }

    #[test]
    fn test_quote_option_value_parses_back() {
        let value = r#"say "hi" \ bye"#;
        let args = CommandArgs::parse(&format!("-- {}", quote_option_value(value))).unwrap();
        assert_eq!(args.trailing.as_deref(), Some(value));
    }

    #[test]
    fn test_unescape_controls() {
        assert_eq!(unescape_controls("echo hi\\n"), "echo hi\n");
        assert_eq!(unescape_controls("a\\tb\\\\n"), "a\tb\\n");
        assert_eq!(unescape_controls("\\x"), "\\x");
    }
}
