//! Rendering and locating signature blocks.
//!
//! A block is a run of comment lines appended to a file:
//!
//! ```text
//!
//! (*----Attest-0.1.0------------------------------------------------------------------------*)
//! (* signed                                                                                 *)
//! (* 2019-03-13 09:57:24                                                                    *)
//! (*----------------------------------------------------------------------------------------*)
//! (* <base64 signature, 86 characters per line>                                             *)
//! (*----------------------------------------------------------------------------------------*)
//! (* <public key text, 86 characters per line>                                              *)
//! (*----------------------------------------------------------------------------------------*)
//! ```
//!
//! Every content line is `left + " " + cell + " " + right` where the cell is
//! [`CELL_WIDTH`] characters, right-padded with spaces. The marker and
//! separator are exactly as wide as `" " + cell + " "`. The verifier is not told
//! which delimiters were used; [`locate`] reads them off the marker line.

use std::str;

use error_stack::Report;

use crate::comments::Delimiters;
use crate::error::AttestError;

/// First line of every block, between the delimiters.
pub const MARKER: &str =
    "----Attest-0.1.0------------------------------------------------------------------------";

/// Closes the header, signature and key sections.
pub const SEPARATOR: &str =
    "----------------------------------------------------------------------------------------";

/// Characters of text per framed line.
pub const CELL_WIDTH: usize = 86;

/// Everything a block carries.
#[derive(Debug, Clone, Copy)]
pub struct SignaturePayload<'a> {
    pub assertions: &'a [String],
    pub timestamp: &'a str,
    /// Base64 signature text.
    pub signature: &'a str,
    /// Public key text, embedded verbatim.
    pub public_key: &'a str,
}

/// A block recovered from content by [`locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    /// Byte index of the newline that precedes the marker line. Everything
    /// before it is the signed content.
    pub offset: usize,
    /// Byte index one past the block's closing separator line.
    pub end: usize,
    /// Delimiters inferred from the marker line.
    pub delimiters: Delimiters,
    pub assertions: Vec<String>,
    pub timestamp: String,
    pub signature: String,
    pub public_key: String,
}

/// Render `payload` as a block framed by `delimiters`.
///
/// The returned text starts with a newline so that it can be appended
/// directly to the content that was signed.
///
/// # Errors
///
/// Returns [`AttestError::Configuration`] if an assertion or the timestamp
/// does not pass [`check_cell`].
pub fn render(
    payload: &SignaturePayload<'_>,
    delimiters: &Delimiters,
) -> Result<String, Report<AttestError>> {
    let mut out = String::from("\n");
    push_rule(&mut out, delimiters, MARKER);

    let header = payload
        .assertions
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(payload.timestamp));
    for line in header {
        check_cell(line)?;
        push_cell(&mut out, delimiters, line);
    }

    push_rule(&mut out, delimiters, SEPARATOR);
    push_wrapped(&mut out, delimiters, payload.signature)?;
    push_rule(&mut out, delimiters, SEPARATOR);
    push_wrapped(&mut out, delimiters, payload.public_key)?;
    push_rule(&mut out, delimiters, SEPARATOR);

    Ok(out)
}

/// Check that `text` fits in a single framed line.
///
/// # Errors
///
/// Returns [`AttestError::Configuration`] if the text is wider than
/// [`CELL_WIDTH`], contains a line break, or has surrounding whitespace that
/// reading the block back would strip.
pub fn check_cell(text: &str) -> Result<(), Report<AttestError>> {
    if text.contains(['\n', '\r']) {
        return Err(Report::new(AttestError::configuration(
            "assertions may not contain line breaks",
        ))
        .attach(format!("assertion: {text:?}")));
    }
    if text != text.trim() {
        return Err(Report::new(AttestError::configuration(
            "assertions may not start or end with whitespace",
        ))
        .attach(format!("assertion: {text:?}")));
    }
    let width = text.chars().count();
    if width > CELL_WIDTH {
        return Err(Report::new(AttestError::configuration(format!(
            "assertion is {width} characters, at most {CELL_WIDTH} fit on a line"
        )))
        .attach(format!("assertion: {text:?}")));
    }
    Ok(())
}

fn push_rule(out: &mut String, delimiters: &Delimiters, rule: &str) {
    out.push_str(&delimiters.left);
    out.push_str(rule);
    out.push_str(&delimiters.right);
    out.push('\n');
}

fn push_cell(out: &mut String, delimiters: &Delimiters, text: &str) {
    out.push_str(&format!(
        "{} {:<width$} {}\n",
        delimiters.left,
        text,
        delimiters.right,
        width = CELL_WIDTH
    ));
}

fn push_wrapped(
    out: &mut String,
    delimiters: &Delimiters,
    text: &str,
) -> Result<(), Report<AttestError>> {
    if text.contains(['\n', '\r']) {
        return Err(Report::new(AttestError::configuration(
            "signature and key text must be a single line",
        )));
    }
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(CELL_WIDTH) {
        let chunk: String = chunk.iter().collect();
        push_cell(out, delimiters, &chunk);
    }
    Ok(())
}

/// Find the last well-formed block in `content`.
///
/// Each occurrence of [`MARKER`] is a candidate. The text between the
/// preceding newline and the marker is taken as the left delimiter, the text
/// between the marker and the following newline as the right delimiter, and
/// the candidate is accepted only if the lines after it are framed with the
/// same pair and close three sections with separator lines.
///
/// # Errors
///
/// Returns [`AttestError::BlockNotFound`] if no candidate validates.
pub fn locate(content: &[u8]) -> Result<BlockLocation, Report<AttestError>> {
    let positions = marker_positions(content);
    let candidates = positions.len();

    let block = positions
        .into_iter()
        .rev()
        .find_map(|pos| parse_candidate(content, pos))
        .ok_or_else(|| {
            Report::new(AttestError::BlockNotFound)
                .attach(format!("{candidates} marker occurrence(s), none well-formed"))
        })?;

    log::debug!(
        "located block at offset {} with delimiters {:?} {:?}",
        block.offset,
        block.delimiters.left,
        block.delimiters.right
    );
    Ok(block)
}

/// Every well-formed block in `content`, in file order.
#[must_use]
pub fn locate_all(content: &[u8]) -> Vec<BlockLocation> {
    marker_positions(content)
        .into_iter()
        .filter_map(|pos| parse_candidate(content, pos))
        .collect()
}

fn marker_positions(content: &[u8]) -> Vec<usize> {
    let marker = MARKER.as_bytes();
    if content.len() < marker.len() {
        return Vec::new();
    }
    (0..=content.len() - marker.len())
        .filter(|&i| content[i..].starts_with(marker))
        .collect()
}

fn parse_candidate(content: &[u8], pos: usize) -> Option<BlockLocation> {
    // A rendered block always starts with a newline before the marker line.
    let offset = content[..pos].iter().rposition(|&b| b == b'\n')?;
    let after_marker = pos + MARKER.len();
    let line_end = after_marker + content[after_marker..].iter().position(|&b| b == b'\n')?;

    let delimiters = Delimiters::new(
        str::from_utf8(&content[offset + 1..pos]).ok()?,
        str::from_utf8(&content[after_marker..line_end]).ok()?,
    );
    let separator = format!("{}{}{}", delimiters.left, SEPARATOR, delimiters.right);

    let mut sections: [Vec<&str>; 3] = Default::default();
    let mut section = 0;
    let mut cursor = line_end + 1;
    while section < sections.len() {
        let remaining = &content[cursor..];
        if remaining.is_empty() {
            return None;
        }
        let (line, next) = match remaining.iter().position(|&b| b == b'\n') {
            Some(i) => (&remaining[..i], cursor + i + 1),
            None => (remaining, content.len()),
        };
        let line = str::from_utf8(line).ok()?;

        if line == separator {
            if sections[section].is_empty() {
                return None;
            }
            section += 1;
        } else {
            sections[section].push(cell(line, &delimiters)?);
        }
        cursor = next;
    }

    let [header, signature, key] = sections;
    let (timestamp, assertions) = header.split_last()?;

    Some(BlockLocation {
        offset,
        end: cursor,
        delimiters,
        assertions: assertions.iter().map(|a| a.trim().to_string()).collect(),
        timestamp: timestamp.trim().to_string(),
        signature: signature.concat().trim_end().to_string(),
        public_key: key.concat().trim_end().to_string(),
    })
}

/// Strip the delimiters and the single space on each side of a content line.
fn cell<'a>(line: &'a str, delimiters: &Delimiters) -> Option<&'a str> {
    line.strip_prefix(delimiters.left.as_str())?
        .strip_suffix(delimiters.right.as_str())?
        .strip_prefix(' ')?
        .strip_suffix(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::lookup;
    use crate::test_support::tests::{GOLDEN_PYTHON_BLOCK, GOLDEN_SIGNED_OBERON};

    fn payload<'a>(assertions: &'a [String], key: &'a str) -> SignaturePayload<'a> {
        SignaturePayload {
            assertions,
            timestamp: "2024-01-02 03:04:05",
            signature: "c2lnbmF0dXJl",
            public_key: key,
        }
    }

    fn signed(assertions: &[&str]) -> Vec<String> {
        assertions.iter().map(|a| (*a).to_string()).collect()
    }

    #[test]
    fn test_render_has_uniform_line_width() {
        let assertions = signed(&["signed", "reviewed by QA"]);
        let key = "ssh-rsa ".to_string() + &"A".repeat(300) + " dev@example.com";
        let delimiters = lookup("python");

        let block = render(&payload(&assertions, &key), &delimiters).expect("should render");

        assert!(block.starts_with('\n'));
        assert!(block.ends_with(" #\n"));
        let lines: Vec<&str> = block[1..].lines().collect();
        assert!(lines.len() > 8);
        for line in &lines {
            assert_eq!(line.chars().count(), 2 + 88 + 2, "line {line:?}");
            assert!(line.starts_with("# ") && line.ends_with(" #"));
        }
        assert_eq!(lines[0], format!("# {MARKER} #"));
    }

    #[test]
    fn test_render_matches_reference_output() {
        let located = locate(GOLDEN_PYTHON_BLOCK.as_bytes()).expect("should locate");
        let rendered = render(
            &SignaturePayload {
                assertions: &located.assertions,
                timestamp: &located.timestamp,
                signature: &located.signature,
                public_key: &located.public_key,
            },
            &located.delimiters,
        )
        .expect("should render");

        assert_eq!(rendered, GOLDEN_PYTHON_BLOCK);
    }

    #[test]
    fn test_render_rejects_wide_assertion() {
        let fits = signed(&["x".repeat(CELL_WIDTH).as_str()]);
        assert!(render(&payload(&fits, "key"), &lookup("c")).is_ok());

        let too_wide = signed(&["x".repeat(CELL_WIDTH + 1).as_str()]);
        let err = render(&payload(&too_wide, "key"), &lookup("c")).expect_err("too wide");
        assert!(matches!(
            err.current_context(),
            AttestError::Configuration { .. }
        ));
    }

    #[test]
    fn test_check_cell_rejects_surrounding_whitespace() {
        for text in [" lead", "tab\t", "trail ", "\tboth "] {
            let err = check_cell(text).expect_err("untrimmed");
            assert!(
                matches!(err.current_context(), AttestError::Configuration { .. }),
                "{text:?}"
            );
        }
        assert!(check_cell("").is_ok());
        assert!(check_cell("reviewed by QA").is_ok());
    }

    #[test]
    fn test_render_rejects_multiline_assertion() {
        let assertions = signed(&["line one\nline two"]);
        assert!(render(&payload(&assertions, "key"), &lookup("c")).is_err());
    }

    #[test]
    fn test_locate_reference_file() {
        let content = GOLDEN_SIGNED_OBERON.as_bytes();
        let block = locate(content).expect("should locate");

        assert_eq!(block.delimiters, lookup("oberon"));
        assert_eq!(block.assertions, vec!["signed", "reviewed"]);
        assert_eq!(block.timestamp, "2019-03-13 09:57:24");
        assert!(block.public_key.starts_with("ssh-rsa AAAAB3NzaC1yc2E"));
        assert!(block.public_key.ends_with(" alice@example.com"));
        assert!(block.signature.ends_with("=="));
        assert_eq!(block.end, content.len());
        assert!(GOLDEN_SIGNED_OBERON[..block.offset].ends_with("END Hello.\n"));
        assert_eq!(&content[block.offset..block.offset + 3], b"\n(*");
    }

    #[test]
    fn test_locate_recovers_payload_for_every_format() {
        let assertions = signed(&["signed", "", "build 42"]);
        let key = "ssh-rsa ".to_string() + &"B".repeat(200) + " ci@example.com";

        for name in crate::comments::names() {
            let delimiters = lookup(name);
            let block = render(&payload(&assertions, &key), &delimiters).expect("render");
            let content = format!("body\n{block}");

            let located = locate(content.as_bytes()).expect(name);
            assert_eq!(located.delimiters, delimiters, "{name}");
            assert_eq!(located.assertions, assertions, "{name}");
            assert_eq!(located.timestamp, "2024-01-02 03:04:05", "{name}");
            assert_eq!(located.signature, "c2lnbmF0dXJl", "{name}");
            assert_eq!(located.public_key, key, "{name}");
            assert_eq!(located.offset, "body\n".len(), "{name}");
        }
    }

    #[test]
    fn test_locate_with_empty_delimiters() {
        let assertions = signed(&["signed"]);
        let block = render(&payload(&assertions, "k"), &Delimiters::default()).expect("render");
        let located = locate(format!("x{block}").as_bytes()).expect("should locate");
        assert!(located.delimiters.is_empty());
        assert_eq!(located.public_key, "k");
    }

    #[test]
    fn test_key_spaces_at_line_boundaries_survive() {
        // Put a space at the last column of the first line and the first
        // column of the second.
        let key = format!("{} {}", "a".repeat(CELL_WIDTH - 1), " tail comment");
        let assertions = signed(&["signed"]);
        let block = render(&payload(&assertions, &key), &lookup("c")).expect("render");

        let located = locate(block.as_bytes()).expect("should locate");
        assert_eq!(located.public_key, key);
    }

    #[test]
    fn test_locate_uses_last_block() {
        let first = render(&payload(&signed(&["first"]), "k1"), &lookup("c")).expect("render");
        let second = render(&payload(&signed(&["second"]), "k2"), &lookup("python"))
            .expect("render");
        let content = format!("payload\n{first}{second}");

        let located = locate(content.as_bytes()).expect("should locate");
        assert_eq!(located.assertions, vec!["second"]);
        assert_eq!(located.delimiters, lookup("python"));
        assert_eq!(&content[..located.offset], format!("payload\n{first}"));

        let all = locate_all(content.as_bytes());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].assertions, vec!["first"]);
        assert_eq!(all[0].offset, "payload\n".len());
    }

    #[test]
    fn test_locate_ignores_marker_in_ordinary_content() {
        let source = format!("const MARKER: &str = \"{MARKER}\";\nfn main() {{}}\n");
        let err = locate(source.as_bytes()).expect_err("no block");
        assert!(matches!(err.current_context(), AttestError::BlockNotFound));

        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let content = format!("{source}{block}");
        let located = locate(content.as_bytes()).expect("should locate");
        assert_eq!(located.offset, source.len());
    }

    #[test]
    fn test_locate_with_delimiter_lookalike_assertions() {
        let assertions = signed(&["*) (* closes early", "---- not a separator"]);
        let block = render(&payload(&assertions, "k"), &lookup("oberon")).expect("render");
        let located = locate(block.as_bytes()).expect("should locate");
        assert_eq!(located.assertions, assertions);
    }

    #[test]
    fn test_locate_without_block() {
        for content in ["", "hello\n", MARKER] {
            let err = locate(content.as_bytes()).expect_err("no block");
            assert!(matches!(err.current_context(), AttestError::BlockNotFound));
        }
    }

    #[test]
    fn test_locate_rejects_truncated_block() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let truncated = block.trim_end().rsplit_once('\n').map(|(head, _)| head);
        let truncated = truncated.expect("multi-line block");

        assert!(locate(truncated.as_bytes()).is_err());
    }

    #[test]
    fn test_locate_accepts_missing_final_newline() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let trimmed = block.trim_end_matches('\n');
        let located = locate(trimmed.as_bytes()).expect("should locate");
        assert_eq!(located.end, trimmed.len());
    }

    #[test]
    fn test_locate_requires_newline_before_marker() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        assert!(locate(block[1..].as_bytes()).is_err());
    }

    #[test]
    fn test_locate_rejects_mixed_delimiters() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let mixed = block.replacen("/* signed", "// signed", 1);
        assert!(locate(mixed.as_bytes()).is_err());
    }

    #[test]
    fn test_locate_reports_trailing_content() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let content = format!("body{block}appended later\n");
        let located = locate(content.as_bytes()).expect("should locate");
        assert_eq!(&content[located.end..], "appended later\n");
    }

    #[test]
    fn test_locate_tolerates_non_utf8_content() {
        let block = render(&payload(&signed(&["signed"]), "k"), &lookup("c")).expect("render");
        let mut content = vec![0xff, 0xfe, b'\n', 0x80];
        content.extend_from_slice(block.as_bytes());

        let located = locate(&content).expect("should locate");
        assert_eq!(located.offset, 4);
    }
}
