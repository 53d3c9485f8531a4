//! Recognising commands addressed to the bot.
//!
//! A message is addressed to the bot when it contains a `<@BOT>` mention
//! (optionally `<@BOT|name>`), or when it arrives in a direct-message
//! channel.  The command line runs from just after the mention to the end of
//! that line; in a DM without a mention the whole message is the command line.
//!
//! Fenced code blocks are not tokenised.  Instead `&1`, `&2`, ... expand to the
//! first, second, ... block of the whole message:
//!
//! ~~~text
//! <@UBOT> paste &1
//! ```
//! fn main() {}
//! ```
//!     → ["paste", "fn main() {}"]
//! ~~~

use chorus_core::UserId;
use thiserror::Error;

const FENCE: &str = "```";

/// Recoverable problem found while tokenising a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("`&0` is not a code block reference; blocks are numbered from 1")]
    ZeroBlockIndex,

    #[error("`&{index}` refers to a code block that does not exist (the message has {available})")]
    MissingBlock { index: usize, available: usize },
}

/// A tokenised command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub args: Vec<String>,
    /// First tokenisation problem, if any.  Offending tokens are kept verbatim.
    pub error: Option<ParseError>,
    /// `true` when the bot was addressed implicitly (DM without a mention).
    pub lenient: bool,
}

/// What a message means to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    NotCommand,
    /// A bare mention with nothing after it.
    Wave,
    Command(ParsedCommand),
}

impl ParseOutcome {
    pub fn is_command(&self) -> bool {
        matches!(self, ParseOutcome::Command(_))
    }
}

/// Classifies `text` for a bot whose identity is `bot`.
pub fn parse_message(text: &str, bot: &UserId, is_direct: bool) -> ParseOutcome {
    let blocks = extract_code_blocks(text);

    if let Some(after) = find_mention(text, bot) {
        let line = after.split('\n').next().unwrap_or_default();
        let line = line.trim_start_matches([':', ',']);
        let (args, error) = tokenize(&strip_code_blocks(line), &blocks);
        if args.is_empty() && error.is_none() {
            return ParseOutcome::Wave;
        }
        return ParseOutcome::Command(ParsedCommand {
            args,
            error,
            lenient: false,
        });
    }

    if is_direct {
        let (args, error) = tokenize(&strip_code_blocks(text), &blocks);
        if args.is_empty() {
            return ParseOutcome::NotCommand;
        }
        return ParseOutcome::Command(ParsedCommand {
            args,
            error,
            lenient: true,
        });
    }

    ParseOutcome::NotCommand
}

/// Returns the text following the first mention of `bot`.
fn find_mention<'a>(text: &'a str, bot: &UserId) -> Option<&'a str> {
    let needle = format!("<@{}", bot.as_str());
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(&needle) {
        let start = offset + pos + needle.len();
        let rest = &text[start..];
        if let Some(after) = rest.strip_prefix('>') {
            return Some(after);
        }
        if rest.starts_with('|')
            && let Some(close) = rest.find('>')
        {
            return Some(&rest[close + 1..]);
        }
        // A longer id sharing this prefix (`<@UBOT2>`); keep looking.
        offset = start;
    }
    None
}

/// Returns the contents of every closed ``` fence, in order.
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let body = &rest[open + FENCE.len()..];
        let Some(close) = body.find(FENCE) else {
            break;
        };
        blocks.push(body[..close].trim_matches('\n').to_string());
        rest = &body[close + FENCE.len()..];
    }
    blocks
}

/// Removes closed fences so their contents never become tokens.
fn strip_code_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let body = &rest[open + FENCE.len()..];
        let Some(close) = body.find(FENCE) else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &body[close + FENCE.len()..];
    }
    out.push_str(rest);
    out
}

/// Splits on whitespace and substitutes `&N` code block references.
pub fn tokenize(line: &str, blocks: &[String]) -> (Vec<String>, Option<ParseError>) {
    let mut error = None;
    let args = line
        .split_whitespace()
        .map(|token| match block_reference(token) {
            Some(0) => {
                error.get_or_insert(ParseError::ZeroBlockIndex);
                token.to_string()
            }
            Some(n) => match blocks.get(n - 1) {
                Some(block) => block.clone(),
                None => {
                    error.get_or_insert(ParseError::MissingBlock {
                        index: n,
                        available: blocks.len(),
                    });
                    token.to_string()
                }
            },
            None => token.to_string(),
        })
        .collect();
    (args, error)
}

fn block_reference(token: &str) -> Option<usize> {
    let digits = token.strip_prefix('&')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> UserId {
        UserId::new("UBOT")
    }

    fn command(args: &[&str]) -> ParseOutcome {
        ParseOutcome::Command(ParsedCommand {
            args: args.iter().map(|a| a.to_string()).collect(),
            error: None,
            lenient: false,
        })
    }

    #[test]
    fn test_mention_at_start() {
        assert_eq!(
            parse_message("<@UBOT> echo hello world", &bot(), false),
            command(&["echo", "hello", "world"])
        );
        assert_eq!(
            parse_message("<@UBOT|chorus>: echo hi", &bot(), false),
            command(&["echo", "hi"])
        );
    }

    #[test]
    fn test_mention_mid_message_runs_to_end_of_line() {
        assert_eq!(
            parse_message("hey <@UBOT> recall foo\nunrelated text", &bot(), false),
            command(&["recall", "foo"])
        );
    }

    #[test]
    fn test_bare_mention_is_a_wave() {
        assert_eq!(parse_message("<@UBOT>", &bot(), false), ParseOutcome::Wave);
        assert_eq!(parse_message("hi <@UBOT>  ", &bot(), false), ParseOutcome::Wave);
        assert_eq!(parse_message("<@UBOT>\necho x", &bot(), false), ParseOutcome::Wave);
    }

    #[test]
    fn test_other_mentions_are_not_commands() {
        assert_eq!(
            parse_message("<@UOTHER> echo x", &bot(), false),
            ParseOutcome::NotCommand
        );
        assert_eq!(
            parse_message("<@UBOT2> echo x", &bot(), false),
            ParseOutcome::NotCommand
        );
        assert_eq!(parse_message("just chatting", &bot(), false), ParseOutcome::NotCommand);
    }

    #[test]
    fn test_direct_message_is_lenient() {
        let outcome = parse_message("recall foo", &bot(), true);
        assert_eq!(
            outcome,
            ParseOutcome::Command(ParsedCommand {
                args: vec!["recall".into(), "foo".into()],
                error: None,
                lenient: true,
            })
        );
        assert_eq!(parse_message("   ", &bot(), true), ParseOutcome::NotCommand);
    }

    #[test]
    fn test_mention_in_dm_is_strict() {
        let ParseOutcome::Command(parsed) = parse_message("<@UBOT> echo", &bot(), true) else {
            panic!("expected a command");
        };
        assert!(!parsed.lenient);
    }

    #[test]
    fn test_code_block_substitution() {
        let text = "<@UBOT> remember snippet &1\n```\nfn main() {}\n```";
        assert_eq!(
            parse_message(text, &bot(), false),
            command(&["remember", "snippet", "fn main() {}"])
        );
    }

    #[test]
    fn test_inline_fence_is_not_tokenised() {
        let text = "<@UBOT> echo ```a b``` &1";
        assert_eq!(parse_message(text, &bot(), false), command(&["echo", "a b"]));
    }

    #[test]
    fn test_bad_block_references_are_recoverable() {
        let ParseOutcome::Command(parsed) = parse_message("<@UBOT> echo &0 &3 x", &bot(), false)
        else {
            panic!("expected a command");
        };
        assert_eq!(parsed.args, ["echo", "&0", "&3", "x"]);
        assert_eq!(parsed.error, Some(ParseError::ZeroBlockIndex));

        let (_, error) = tokenize("&2", &["only".to_string()]);
        assert_eq!(
            error,
            Some(ParseError::MissingBlock {
                index: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_ampersand_words_are_plain_tokens() {
        let (args, error) = tokenize("&foo & &12x", &[]);
        assert_eq!(args, ["&foo", "&", "&12x"]);
        assert!(error.is_none());
    }

    #[test]
    fn test_unclosed_fence_is_ignored() {
        assert!(extract_code_blocks("```never closed").is_empty());
        assert_eq!(extract_code_blocks("```a``` and ```b```"), ["a", "b"]);
    }

    #[test]
    fn test_whitespace_difference_is_structurally_equal() {
        assert_eq!(
            parse_message("<@UBOT> echo  hi", &bot(), false),
            parse_message("<@UBOT> echo hi ", &bot(), false)
        );
    }
}
