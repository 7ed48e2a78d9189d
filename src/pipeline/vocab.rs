//! Flashcard vocabulary: rank a book's distinctive words and translate them.
//!
//! A word is a good flashcard when it is both frequent in *this* book and
//! uncommon in the language at large. Each distinct word is scored as
//!
//! ```text
//! score = count × (1 + max(0, zipf_ceiling − zipf(word)))
//! ```
//!
//! so everyday words (high Zipf) fall back to their raw count while rare
//! words get up to `zipf_ceiling + 1` times their count. Stop words,
//! elided articles, punctuation and numerals never become candidates.

use crate::config::VocabularyTuning;
use crate::error::BookError;
use crate::pipeline::lexicon::{is_stop_word, zipf_frequency};
use crate::translator::Translator;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::debug;

/// One token as produced by a [`Tokenizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub surface: String,
    /// Dictionary form, when the tokenizer knows it.
    pub lemma: Option<String>,
}

/// Splits text into word tokens for a language.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, lang: &str) -> Vec<Token>;
}

/// Splits on anything that is not a letter, digit or apostrophe, then
/// separates apostrophe forms: clitics stay on the right (`it's` → `it`
/// `'s`, `don't` → `do` `n't`) and elisions on the left (`l'uomo` → `l'`
/// `uomo`). Typographic `’` is read as `'`.
///
/// Only contracted negations get a lemma (`won't` → `will`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTokenizer;

const CLITICS: [&str; 6] = ["s", "ll", "re", "ve", "d", "m"];

impl Tokenizer for RuleTokenizer {
    fn tokenize(&self, text: &str, _lang: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for chunk in text.split(|c: char| !(c.is_alphanumeric() || is_apostrophe(c))) {
            let chunk: String = chunk
                .chars()
                .map(|c| if is_apostrophe(c) { '\'' } else { c })
                .collect();
            split_apostrophes(chunk.trim_matches('\''), &mut tokens);
        }
        tokens
    }
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

fn plain(surface: &str) -> Token {
    Token {
        surface: surface.to_string(),
        lemma: None,
    }
}

fn split_apostrophes(word: &str, tokens: &mut Vec<Token>) {
    if word.is_empty() {
        return;
    }
    let Some(last) = word.rfind('\'') else {
        tokens.push(plain(word));
        return;
    };

    let negation = word.len().checked_sub(3).and_then(|at| {
        word.get(at..)
            .filter(|tail| tail.eq_ignore_ascii_case("n't"))
            .map(|_| at)
    });
    if let Some(at) = negation.filter(|&at| at > 0) {
        let stem = &word[..at];
        let lemma = match stem.to_lowercase().as_str() {
            "ca" => Some("can"),
            "wo" => Some("will"),
            "sha" => Some("shall"),
            _ => None,
        };
        tokens.push(Token {
            surface: stem.to_string(),
            lemma: lemma.map(String::from),
        });
        tokens.push(plain(&word[at..]));
        return;
    }

    let suffix = word[last + 1..].to_lowercase();
    if CLITICS.contains(&suffix.as_str()) {
        split_apostrophes(&word[..last], tokens);
        tokens.push(plain(&word[last..]));
        return;
    }

    // Elision: the article keeps its apostrophe, the rest is split again.
    let first = word.find('\'').unwrap_or(last);
    tokens.push(plain(&word[..=first]));
    split_apostrophes(&word[first + 1..], tokens);
}

/// A ranked, not yet translated word.
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyCandidate {
    pub word: String,
    pub count: usize,
    pub score: f64,
}

/// A finished flashcard.
#[derive(Debug, Clone, PartialEq)]
pub struct Flashcard {
    pub word: String,
    pub translation: String,
    pub count: usize,
    pub score: f64,
}

/// Count, score and rank the words of `paragraphs`, capped at
/// `tuning.max_entries`.
///
/// Ties on (score, count) keep first-occurrence order.
pub fn rank_candidates(
    paragraphs: &[String],
    lang: &str,
    tokenizer: &dyn Tokenizer,
    tuning: &VocabularyTuning,
) -> Vec<VocabularyCandidate> {
    // word -> (count, first occurrence)
    let mut seen: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for paragraph in paragraphs {
        for token in tokenizer.tokenize(paragraph, lang) {
            let form = token.lemma.as_deref().unwrap_or(&token.surface);
            let word = form.trim().to_lowercase();
            if !is_candidate_word(&word, lang) {
                continue;
            }
            let entry = seen.entry(word).or_insert_with(|| {
                order += 1;
                (0, order)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(VocabularyCandidate, usize)> = seen
        .into_iter()
        .map(|(word, (count, first))| {
            let rarity = (tuning.zipf_ceiling - zipf_frequency(&word, lang)).max(0.0);
            let score = count as f64 * (1.0 + rarity);
            (VocabularyCandidate { word, count, score }, first)
        })
        .collect();

    ranked.sort_by(|(a, a_first), (b, b_first)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a_first.cmp(b_first))
    });
    ranked.truncate(tuning.max_entries);
    ranked.into_iter().map(|(c, _)| c).collect()
}

/// Two or more letters and not a stop word. Apostrophe forms and single
/// letters never qualify.
fn is_candidate_word(word: &str, lang: &str) -> bool {
    word.chars().nth(1).is_some()
        && word.chars().all(char::is_alphabetic)
        && !is_stop_word(word, lang)
}

/// Rank the vocabulary of `paragraphs` (written in `lang`) and translate the
/// capped list into `gloss_lang` with a single gateway call.
pub async fn build_flashcards(
    paragraphs: &[String],
    lang: &str,
    gloss_lang: &str,
    translator: &dyn Translator,
    tokenizer: &dyn Tokenizer,
    tuning: &VocabularyTuning,
) -> Result<Vec<Flashcard>, BookError> {
    let candidates = rank_candidates(paragraphs, lang, tokenizer, tuning);
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let words: Vec<String> = candidates.iter().map(|c| c.word.clone()).collect();
    let translations = translator.translate_batch(&words, lang, gloss_lang).await?;
    if translations.len() != candidates.len() {
        return Err(BookError::ProviderMismatch {
            expected: candidates.len(),
            actual: translations.len(),
        });
    }
    debug!("Built {} flashcards ({}→{})", candidates.len(), lang, gloss_lang);

    Ok(candidates
        .into_iter()
        .zip(translations)
        .map(|(c, translation)| Flashcard {
            word: c.word,
            translation,
            count: c.count,
            score: c.score,
        })
        .collect())
}

/// Render flashcards as CSV with a `word,translation,count,score` header.
pub fn flashcards_csv(cards: &[Flashcard]) -> String {
    let mut out = String::from("word,translation,count,score\n");
    for card in cards {
        let _ = writeln!(
            out,
            "{},{},{},{:.2}",
            csv_field(&card.word),
            csv_field(&card.translation),
            card.count,
            card.score
        );
    }
    out
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::LocalTranslator;
    use async_trait::async_trait;

    fn rank(paragraphs: &[&str], max: usize) -> Vec<VocabularyCandidate> {
        let paragraphs: Vec<String> = paragraphs.iter().map(|s| s.to_string()).collect();
        let tuning = VocabularyTuning {
            max_entries: max,
            ..VocabularyTuning::default()
        };
        rank_candidates(&paragraphs, "en", &RuleTokenizer, &tuning)
    }

    fn surfaces(text: &str) -> Vec<String> {
        RuleTokenizer
            .tokenize(text, "en")
            .into_iter()
            .map(|t| t.surface)
            .collect()
    }

    #[test]
    fn rare_words_outrank_common_ones() {
        // "time" is near the top of the frequency list, "harpoon" is unlisted.
        let ranked = rank(&["Time, time, time. The harpoon and the harpoon."], 30);
        assert_eq!(ranked[0].word, "harpoon");
        assert_eq!(ranked[0].count, 2);
        assert!((ranked[0].score - 16.0).abs() < 1e-9);
        assert_eq!(ranked[1].word, "time");
        assert_eq!(ranked[1].count, 3);
    }

    #[test]
    fn filters_stop_words_punctuation_and_numerals() {
        let ranked = rank(&["The 1851 whale -- and 42 ... it's 3rd!"], 30);
        let words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, vec!["whale"]);
    }

    #[test]
    fn everyday_word_loses_to_rare_word_at_equal_count() {
        let ranked = rank(&["Water and a harpoon; water and a harpoon."], 30);
        let words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, vec!["harpoon", "water"]);
        assert_eq!(ranked[0].count, ranked[1].count);
        assert!(ranked[1].score > 2.0 && ranked[1].score < ranked[0].score);
    }

    #[test]
    fn apostrophes_split_into_clitics_and_elisions() {
        assert_eq!(surfaces("it's"), vec!["it", "'s"]);
        assert_eq!(surfaces("Don’t"), vec!["Do", "n't"]);
        assert_eq!(surfaces("we'll"), vec!["we", "'ll"]);
        assert_eq!(surfaces("l'uomo"), vec!["l'", "uomo"]);
        assert_eq!(surfaces("dell’anima"), vec!["dell'", "anima"]);
        assert_eq!(surfaces("qu'il"), vec!["qu'", "il"]);
        assert_eq!(surfaces("'quoted'"), vec!["quoted"]);

        let wont = RuleTokenizer.tokenize("won't", "en");
        assert_eq!(wont[0].surface, "wo");
        assert_eq!(wont[0].lemma.as_deref(), Some("will"));
    }

    #[test]
    fn italian_elisions_leave_no_fragments() {
        let paragraphs = vec![
            "L'uomo guardò l'orizzonte e l'acqua. Dell'anima di un'altra, l'uomo parlò."
                .to_string(),
        ];
        let ranked =
            rank_candidates(&paragraphs, "it", &RuleTokenizer, &VocabularyTuning::default());
        let mut words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
        words.sort_unstable();
        assert_eq!(
            words,
            vec!["acqua", "altra", "anima", "guardò", "orizzonte", "parlò", "uomo"]
        );
        let uomo = ranked.iter().find(|c| c.word == "uomo").unwrap();
        assert_eq!(uomo.count, 2);
    }

    #[test]
    fn english_contractions_leave_no_fragments() {
        let ranked = rank(&["I don't know. She'll say we're lost, won't she? Sailors' rum."], 30);
        assert_eq!(ranked[0].word, "rum");
        let mut words: Vec<&str> = ranked.iter().map(|c| c.word.as_str()).collect();
        words.sort_unstable();
        assert_eq!(words, vec!["know", "lost", "rum", "sailors", "say"]);
    }

    #[test]
    fn case_folds_counts() {
        let ranked = rank(&["Whale WHALE whale"], 30);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].count, 3);
    }

    #[test]
    fn ties_keep_first_occurrence_and_cap_applies() {
        let text: Vec<String> = (0..40).map(|i| format!("word{}", letters(i))).collect();
        let joined = text.join(" ");
        let ranked = rank(&[joined.as_str()], 30);
        assert_eq!(ranked.len(), 30);
        assert_eq!(ranked[0].word, text[0]);
        assert_eq!(ranked[29].word, text[29]);
    }

    fn letters(mut i: usize) -> String {
        let mut s = String::new();
        loop {
            s.push((b'a' + (i % 26) as u8) as char);
            i /= 26;
            if i == 0 {
                return s;
            }
        }
    }

    struct LemmaTokenizer;

    impl Tokenizer for LemmaTokenizer {
        fn tokenize(&self, text: &str, lang: &str) -> Vec<Token> {
            RuleTokenizer
                .tokenize(text, lang)
                .into_iter()
                .map(|mut t| {
                    if t.surface.ends_with('s') {
                        t.lemma = Some(t.surface.trim_end_matches('s').to_string());
                    }
                    t
                })
                .collect()
        }
    }

    #[test]
    fn lemmas_are_preferred_over_surface_forms() {
        let paragraphs = vec!["whales whale".to_string()];
        let ranked = rank_candidates(
            &paragraphs,
            "en",
            &LemmaTokenizer,
            &VocabularyTuning::default(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].word, "whale");
        assert_eq!(ranked[0].count, 2);
    }

    #[tokio::test]
    async fn flashcards_pair_words_with_translations() {
        let paragraphs = vec!["[es] La ballena blanca y la ballena gris.".to_string()];
        let cards = build_flashcards(
            &paragraphs,
            "es",
            "en",
            &LocalTranslator,
            &RuleTokenizer,
            &VocabularyTuning::default(),
        )
        .await
        .unwrap();
        assert_eq!(cards[0].word, "ballena");
        assert_eq!(cards[0].translation, "[en] ballena");
        assert!(cards.iter().all(|c| c.word != "la" && c.word != "y"));
    }

    struct Short;

    #[async_trait]
    impl Translator for Short {
        fn name(&self) -> &str {
            "short"
        }

        async fn translate_batch(
            &self,
            texts: &[String],
            _src: &str,
            _tgt: &str,
        ) -> Result<Vec<String>, BookError> {
            Ok(texts.iter().skip(1).cloned().collect())
        }
    }

    #[tokio::test]
    async fn short_translation_is_a_mismatch() {
        let paragraphs = vec!["harpoon whale ship".to_string()];
        let err = build_flashcards(
            &paragraphs,
            "en",
            "es",
            &Short,
            &RuleTokenizer,
            &VocabularyTuning::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BookError::ProviderMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn csv_quotes_when_needed() {
        let cards = vec![
            Flashcard {
                word: "ballena".into(),
                translation: "whale".into(),
                count: 2,
                score: 16.0,
            },
            Flashcard {
                word: "dicho".into(),
                translation: "said, \"told\"".into(),
                count: 1,
                score: 8.0,
            },
        ];
        assert_eq!(
            flashcards_csv(&cards),
            "word,translation,count,score\nballena,whale,2,16.00\ndicho,\"said, \"\"told\"\"\",1,8.00\n"
        );
    }
}
