//! Token budgeting: split paragraphs into provider-sized batches.
//!
//! Costs are estimated with the fixed `ceil(chars / 4)` heuristic rather
//! than a real tokenizer: the estimate only has to keep batches comfortably
//! inside the provider window, and it has to be identical across providers.
//!
//! Batches are returned as sub-slices of the input, so concatenating them
//! reproduces the input exactly and no text is ever copied or cut.

use crate::error::BookError;

/// Estimated token cost of one text unit: `max(1, ceil(chars / 4))`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}

/// Check a `(max_tokens, reserved_tokens)` pair and return the input budget.
pub fn validate_budget(max_tokens: i64, reserved_tokens: i64) -> Result<usize, BookError> {
    if max_tokens <= 0 {
        return Err(BookError::Configuration(format!(
            "max_tokens must be positive, got {max_tokens}"
        )));
    }
    if reserved_tokens < 0 {
        return Err(BookError::Configuration(format!(
            "reserved_tokens must not be negative, got {reserved_tokens}"
        )));
    }
    let budget = max_tokens - reserved_tokens;
    if budget <= 0 {
        return Err(BookError::Configuration(format!(
            "token budget must be positive: max_tokens {max_tokens} - reserved {reserved_tokens} = {budget}"
        )));
    }
    Ok(budget as usize)
}

/// Greedily pack `texts` into batches whose estimated cost fits
/// `max_tokens - reserved_tokens`.
///
/// A unit that alone exceeds the budget becomes a singleton batch; it is
/// never truncated and never causes an error.
pub fn chunk_by_tokens<S: AsRef<str>>(
    texts: &[S],
    max_tokens: i64,
    reserved_tokens: i64,
) -> Result<Vec<&[S]>, BookError> {
    let budget = validate_budget(max_tokens, reserved_tokens)?;

    let mut batches = Vec::new();
    let mut start = 0;
    let mut running = 0usize;

    for (i, text) in texts.iter().enumerate() {
        let cost = estimate_tokens(text.as_ref());

        if cost > budget {
            if start < i {
                batches.push(&texts[start..i]);
            }
            batches.push(&texts[i..i + 1]);
            start = i + 1;
            running = 0;
            continue;
        }

        if running + cost > budget {
            batches.push(&texts[start..i]);
            start = i;
            running = 0;
        }
        running += cost;
    }

    if start < texts.len() {
        batches.push(&texts[start..]);
    }
    Ok(batches)
}

/// Split `items` into fixed-size groups; the last group may be shorter.
pub fn batched<T>(items: &[T], size: usize) -> Result<std::slice::Chunks<'_, T>, BookError> {
    if size == 0 {
        return Err(BookError::Configuration(
            "batch size must be at least 1".into(),
        ));
    }
    Ok(items.chunks(size))
}
