//! Tolerant parsing of model responses into structured results.
//!
//! Providers often wrap answers in markdown fences, quotes, or stray prose.
//! Parsing is deterministic: a fixed set of repair rules is applied in order
//! and a response that cannot be repaired becomes [`MalformedResponse`],
//! never a partially-filled result.

use crate::error::MalformedResponse;
use crate::prompt::GenerationKind;

/// Upper bound for commit subjects and PR titles.
const MAX_SUMMARY_CHARS: usize = 72;

/// A successfully parsed model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    CommitMessage {
        summary: String,
        body: Option<String>,
    },
    BranchName {
        slug: String,
    },
    PrDescription {
        title: String,
        body: String,
    },
}

/// Parse `raw` according to the request kind. `slug_max` caps branch slugs
/// and is ignored for the other kinds.
pub fn parse(
    kind: GenerationKind,
    raw: &str,
    slug_max: usize,
) -> Result<GenerationResult, MalformedResponse> {
    let text = strip_wrapping(raw);
    if text.is_empty() {
        return Err(MalformedResponse::Empty);
    }
    match kind {
        GenerationKind::CommitMessage => parse_commit_message(&text),
        GenerationKind::BranchName => parse_branch_name(&text, slug_max),
        GenerationKind::PrDescription => parse_pr_description(&text),
    }
}

/// Unwrap a fenced code block or surrounding quotes.
///
/// If the response contains a fenced block the block's content wins over any
/// surrounding prose; a language tag on the opening fence line is dropped.
fn strip_wrapping(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```")
        && let Some(end) = trimmed[start + 3..].find("```")
    {
        let inner = &trimmed[start + 3..start + 3 + end];
        let inner = match inner.split_once('\n') {
            Some((first, rest)) if is_language_tag(first) => rest,
            _ => inner,
        };
        return strip_quotes(inner.trim()).to_string();
    }

    strip_quotes(trimmed).to_string()
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || (line.len() <= 16 && line.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return text[1..text.len() - 1].trim();
        }
    }
    text
}

fn parse_commit_message(text: &str) -> Result<GenerationResult, MalformedResponse> {
    let mut lines = text.lines();
    let mut summary = lines.next().unwrap_or("").trim().to_string();
    let remainder: Vec<&str> = lines.collect();
    let blank_separated = remainder.first().is_some_and(|l| l.trim().is_empty());
    let remainder_text = remainder.join("\n").trim().to_string();

    let mut body = if remainder_text.is_empty() {
        None
    } else if blank_separated {
        Some(remainder_text)
    } else {
        // No blank line after the subject: keep bullets from the first
        // bullet onward, otherwise take the run-on lines as-is.
        Some(bullet_tail(&remainder).unwrap_or(remainder_text))
    };

    if summary.chars().count() > MAX_SUMMARY_CHARS {
        let (head, tail) = split_at_word_boundary(&summary, MAX_SUMMARY_CHARS);
        summary = head;
        if !tail.is_empty() {
            body = match body {
                Some(existing) => Some(format!("{tail}\n{existing}")),
                None => Some(tail),
            };
        }
    }

    if summary.is_empty() {
        return Err(MalformedResponse::Empty);
    }
    Ok(GenerationResult::CommitMessage { summary, body })
}

fn parse_branch_name(text: &str, slug_max: usize) -> Result<GenerationResult, MalformedResponse> {
    let first_line = text.lines().next().unwrap_or("").trim();

    let mut slug = String::new();
    for ch in first_line.to_lowercase().chars() {
        let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '/' || ch == '_' {
            ch
        } else {
            '-'
        };
        let is_separator = matches!(mapped, '-' | '_' | '/');
        let prev_is_separator = slug
            .chars()
            .next_back()
            .is_some_and(|p| matches!(p, '-' | '_' | '/'));
        if is_separator && prev_is_separator {
            continue;
        }
        slug.push(mapped);
    }

    let mut slug = slug.trim_matches(['-', '_', '/']).to_string();
    if slug.len() > slug_max {
        slug.truncate(slug_max);
        slug = slug.trim_end_matches(['-', '_', '/']).to_string();
    }

    if slug.is_empty() {
        return Err(MalformedResponse::EmptySlug {
            raw: text.to_string(),
        });
    }
    Ok(GenerationResult::BranchName { slug })
}

fn parse_pr_description(text: &str) -> Result<GenerationResult, MalformedResponse> {
    let (first_line, remainder) = match text.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest.trim()),
        None => (text.trim(), ""),
    };

    // A first line too long to be a title means the model skipped the title:
    // treat the whole response as the body and synthesize one.
    if first_line.chars().count() > MAX_SUMMARY_CHARS {
        let body = text.trim().to_string();
        let title = synthesize_title(&body);
        return Ok(GenerationResult::PrDescription { title, body });
    }

    if remainder.is_empty() {
        return Err(MalformedResponse::MissingPrBody);
    }
    Ok(GenerationResult::PrDescription {
        title: first_line.to_string(),
        body: remainder.to_string(),
    })
}

/// First sentence of `body`, word-boundary cut to the title limit.
fn synthesize_title(body: &str) -> String {
    let first_line = body.lines().next().unwrap_or("").trim();
    let sentence = match first_line.find(['.', '!', '?']) {
        Some(idx) => first_line[..idx].trim(),
        None => first_line,
    };
    if sentence.chars().count() > MAX_SUMMARY_CHARS {
        let (head, _) = split_at_word_boundary(sentence, MAX_SUMMARY_CHARS);
        head
    } else {
        sentence.to_string()
    }
}

/// The remainder lines from the first bullet onward, if any bullet exists.
fn bullet_tail(lines: &[&str]) -> Option<String> {
    let start = lines.iter().position(|l| {
        let t = l.trim_start();
        ["- ", "* ", "• "].iter().any(|b| t.starts_with(b))
    })?;
    Some(lines[start..].join("\n").trim().to_string())
}

/// Split `text` at the last word boundary at or before `max_chars`.
///
/// Falls back to a hard cut when the first token alone overflows the limit.
fn split_at_word_boundary(text: &str, max_chars: usize) -> (String, String) {
    let mut limit_byte = text.len();
    let mut last_space = None;
    for (count, (idx, ch)) in text.char_indices().enumerate() {
        if count == max_chars {
            limit_byte = idx;
            break;
        }
        if ch == ' ' {
            last_space = Some(idx);
        }
    }
    if limit_byte == text.len() {
        return (text.to_string(), String::new());
    }

    let split = if text[limit_byte..].starts_with(' ') {
        limit_byte
    } else {
        last_space.unwrap_or(limit_byte)
    };
    let head = text[..split].trim_end().to_string();
    let tail = text[split..].trim_start().to_string();
    (head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLUG_MAX: usize = 60;

    fn parse_commit(raw: &str) -> Result<GenerationResult, MalformedResponse> {
        parse(GenerationKind::CommitMessage, raw, SLUG_MAX)
    }

    fn parse_branch(raw: &str) -> Result<GenerationResult, MalformedResponse> {
        parse(GenerationKind::BranchName, raw, SLUG_MAX)
    }

    fn parse_pr(raw: &str) -> Result<GenerationResult, MalformedResponse> {
        parse(GenerationKind::PrDescription, raw, SLUG_MAX)
    }

    #[test]
    fn test_parse_subject_and_body() {
        let result = parse_commit("fix(parser): handle empty diffs\n\nThis patch guards the walker.");
        assert_eq!(
            result.unwrap(),
            GenerationResult::CommitMessage {
                summary: "fix(parser): handle empty diffs".to_string(),
                body: Some("This patch guards the walker.".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_subject_only() {
        let result = parse_commit("docs: fix typo in README").unwrap();
        assert_eq!(
            result,
            GenerationResult::CommitMessage {
                summary: "docs: fix typo in README".to_string(),
                body: None,
            }
        );
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let raw = "```\nfeat(auth): add login flow\n```";
        let result = parse_commit(raw).unwrap();
        assert_eq!(
            result,
            GenerationResult::CommitMessage {
                summary: "feat(auth): add login flow".to_string(),
                body: None,
            }
        );
    }

    #[test]
    fn test_parse_strips_fence_with_language_tag_and_prose() {
        let raw = "Here is your commit message:\n```text\nfix: close file handles\n```\nHope that helps!";
        let result = parse_commit(raw).unwrap();
        assert_eq!(
            result,
            GenerationResult::CommitMessage {
                summary: "fix: close file handles".to_string(),
                body: None,
            }
        );
    }

    #[test]
    fn test_parse_strips_surrounding_quotes() {
        let result = parse_commit("\"chore: bump deps\"").unwrap();
        assert_eq!(
            result,
            GenerationResult::CommitMessage {
                summary: "chore: bump deps".to_string(),
                body: None,
            }
        );
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        assert_eq!(parse_commit("   \n  "), Err(MalformedResponse::Empty));
        assert_eq!(parse_commit("```\n```"), Err(MalformedResponse::Empty));
    }

    #[test]
    fn test_overlong_summary_splits_at_word_boundary() {
        let raw = format!(
            "feat(core): {} trailing words beyond the limit",
            "stretch this subject line out well past seventy two characters total"
        );
        let result = parse_commit(&raw).unwrap();
        let GenerationResult::CommitMessage { summary, body } = result else {
            panic!("wrong kind");
        };
        assert!(summary.chars().count() <= 72, "got {} chars", summary.chars().count());
        assert!(!summary.ends_with(' '));
        let body = body.unwrap();
        // The cut-off words land at the start of the body.
        assert!(raw.ends_with(body.lines().next().unwrap()));
    }

    #[test]
    fn test_overlong_summary_keeps_existing_body_after_spill() {
        let long_subject = "a".repeat(40) + " " + &"b".repeat(40);
        let raw = format!("{long_subject}\n\noriginal body");
        let result = parse_commit(&raw).unwrap();
        let GenerationResult::CommitMessage { summary, body } = result else {
            panic!("wrong kind");
        };
        assert_eq!(summary, "a".repeat(40));
        assert_eq!(body.unwrap(), format!("{}\noriginal body", "b".repeat(40)));
    }

    #[test]
    fn test_bullets_without_blank_line_become_body() {
        let raw = "feat(cli): add pr subcommand\n- wire clap variant\n- call orchestrator";
        let result = parse_commit(raw).unwrap();
        assert_eq!(
            result,
            GenerationResult::CommitMessage {
                summary: "feat(cli): add pr subcommand".to_string(),
                body: Some("- wire clap variant\n- call orchestrator".to_string()),
            }
        );
    }

    #[test]
    fn test_branch_name_normalizes_to_kebab_case() {
        let result = parse_branch("Add User Auth!! Flow").unwrap();
        assert_eq!(
            result,
            GenerationResult::BranchName {
                slug: "add-user-auth-flow".to_string(),
            }
        );
    }

    #[test]
    fn test_branch_name_keeps_type_prefix_and_underscores() {
        let result = parse_branch("Feat/Add_login Flow").unwrap();
        assert_eq!(
            result,
            GenerationResult::BranchName {
                slug: "feat/add_login-flow".to_string(),
            }
        );
    }

    #[test]
    fn test_branch_name_only_symbols_is_malformed() {
        let result = parse_branch("!!!");
        assert!(matches!(result, Err(MalformedResponse::EmptySlug { .. })));
    }

    #[test]
    fn test_branch_name_capped_without_trailing_separator() {
        let raw = "fix/".to_string() + &"word ".repeat(30);
        let result = parse_branch(&raw).unwrap();
        let GenerationResult::BranchName { slug } = result else {
            panic!("wrong kind");
        };
        assert!(slug.len() <= SLUG_MAX);
        assert!(!slug.ends_with('-'));
        assert!(slug.starts_with("fix/word-word"));
    }

    #[test]
    fn test_branch_name_uses_first_line_only() {
        let result = parse_branch("fix/timeouts\nThis name reflects the retry work.").unwrap();
        assert_eq!(
            result,
            GenerationResult::BranchName {
                slug: "fix/timeouts".to_string(),
            }
        );
    }

    #[test]
    fn test_pr_title_and_body() {
        let result = parse_pr("Add retry policy\n\n## Summary\nRetries model calls.").unwrap();
        assert_eq!(
            result,
            GenerationResult::PrDescription {
                title: "Add retry policy".to_string(),
                body: "## Summary\nRetries model calls.".to_string(),
            }
        );
    }

    #[test]
    fn test_pr_without_body_is_malformed() {
        assert_eq!(
            parse_pr("Add retry policy"),
            Err(MalformedResponse::MissingPrBody)
        );
    }

    #[test]
    fn test_pr_overlong_first_line_synthesizes_title() {
        let first = "This pull request introduces a bounded exponential backoff retry policy \
                     for every model call made by the workflow. Further detail follows.";
        let result = parse_pr(first).unwrap();
        let GenerationResult::PrDescription { title, body } = result else {
            panic!("wrong kind");
        };
        assert!(title.chars().count() <= 72);
        assert!(title.starts_with("This pull request introduces"));
        assert!(!title.ends_with('.'));
        assert_eq!(body, first);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "feat: add thing\n\nbody text";
        assert_eq!(parse_commit(raw), parse_commit(raw));
    }
}
