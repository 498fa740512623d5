//! # Text Processing Module
//!
//! Rewrites raw OCR output into a form that produces natural pacing when fed
//! to a speech synthesizer. Synthesizers pace primarily on character and
//! whitespace gaps rather than real prosody, so the rules below widen pauses
//! around punctuation, turn line breaks into sentence boundaries, speak list
//! markers out loud, and strip the garbled non-ASCII glyphs OCR tends to emit.
//!
//! `normalize_for_speech` is a pure, total function: it never fails, and in
//! the worst case returns an empty string. Rule order matters because the
//! rules interact through regex boundaries.

use lazy_static::lazy_static;
use regex::Regex;

/// Hard cap on the text handed to the synthesizer, in characters.
/// Bounds synthesis request size; enforced by truncation, never by error.
pub const MAX_SPOKEN_CHARS: usize = 10_000;

/// Spoken replacement for bullet list markers.
pub const BULLET_PHRASE: &str = "Next point: ";

lazy_static! {
    /// A period and the character after it, if that character is a digit.
    /// Used to add a space after sentence-ending periods while leaving
    /// decimal numbers like "3.14" intact.
    static ref PERIOD_AND_DIGIT: Regex =
        Regex::new(r"\.([0-9]?)").expect("period spacing regex must compile");

    /// Runs of line breaks, treated as sentence boundaries.
    static ref NEWLINE_RUN: Regex = Regex::new(r"\n+").expect("newline regex must compile");

    /// Two periods separated by optional whitespace, produced when the
    /// pause-widening rules overlap the line-break rule.
    static ref DOUBLED_PERIOD: Regex =
        Regex::new(r"\.\s*\.").expect("double period regex must compile");

    /// Runs of non-ASCII characters (stray OCR glyphs, accents the
    /// synthesizer chokes on).
    static ref NON_ASCII_RUN: Regex =
        Regex::new(r"[^\x00-\x7F]+").expect("non-ascii regex must compile");

    /// Any whitespace run, collapsed to a single space at the end.
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("whitespace regex must compile");
}

/// Normalize raw recognized text for speech synthesis.
///
/// Applies the rewrite rules in a fixed order:
/// 1. widen pauses after `, . ; : ? !`
/// 2. ensure a space after every period not starting a decimal number
/// 3. collapse line-break runs into `". "`
/// 4. collapse accidental double periods
/// 5. speak bullet markers as [`BULLET_PHRASE`]
/// 6. replace non-ASCII runs with a single space
/// 7. collapse whitespace runs and trim
///
/// The result is truncated to [`MAX_SPOKEN_CHARS`] characters, blindly, with
/// no attempt to respect word or sentence boundaries.
pub fn normalize_for_speech(raw: &str) -> String {
    // Rule 1: pause widening. The extra spaces are intentionally generous;
    // rule 7 narrows them back down uniformly. Periods get the same digit
    // guard as rule 2, otherwise decimal numbers would already be split
    // apart here.
    let text = raw
        .replace(',', ",   ")
        .replace(';', ";     ")
        .replace(':', ":  ")
        .replace('?', "?     ")
        .replace('!', "!   ");
    let text = PERIOD_AND_DIGIT.replace_all(&text, |caps: &regex::Captures<'_>| {
        let following_digit = &caps[1];
        if following_digit.is_empty() {
            ".     ".to_string()
        } else {
            format!(".{}", following_digit)
        }
    });

    // Rule 2: a period keeps its following digit ("3.14"), otherwise it
    // gains a trailing space.
    let text = PERIOD_AND_DIGIT.replace_all(&text, |caps: &regex::Captures<'_>| {
        let following_digit = &caps[1];
        if following_digit.is_empty() {
            ". ".to_string()
        } else {
            format!(".{}", following_digit)
        }
    });

    // Rule 3: line breaks become sentence boundaries.
    let text = NEWLINE_RUN.replace_all(&text, ". ");

    // Rule 4: undo double periods introduced by rules 1-3 overlapping.
    let text = DOUBLED_PERIOD.replace_all(&text, ".");

    // Rule 5: list markers are spoken, not dropped.
    let text = text.replace('•', BULLET_PHRASE);

    // Rule 6: strip everything outside printable ASCII.
    let text = NON_ASCII_RUN.replace_all(&text, " ");

    // Rule 7: single spaces only, no leading/trailing whitespace.
    let text = WHITESPACE_RUN.replace_all(&text, " ");

    truncate_to_chars(text.trim(), MAX_SPOKEN_CHARS)
}

/// Truncate `text` to at most `max_chars` characters, cutting at a character
/// boundary and nowhere nicer.
pub fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
