//! Phrase and UTM term word frequencies: tokenization, top-N tables, and the
//! weighted word list behind the word clouds.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::normalize::NormalizedEvent;

/// Words kept in a cloud, most frequent first.
const CLOUD_MAX_WORDS: usize = 200;
const CLOUD_MIN_FONT: f64 = 10.0;
const CLOUD_MAX_FONT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudWord {
    pub word: String,
    pub count: u64,
    /// Font size proportional to `count`.
    pub size: f64,
}

/// Ready-to-draw word cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordCloud {
    pub words: Vec<CloudWord>,
}

impl WordCloud {
    pub fn from_counts(counts: &[WordCount]) -> Self {
        let max = counts.iter().map(|c| c.count).max().unwrap_or(0);
        if max == 0 {
            return Self::default();
        }
        let words = counts
            .iter()
            .take(CLOUD_MAX_WORDS)
            .map(|c| CloudWord {
                word: c.word.clone(),
                count: c.count,
                size: CLOUD_MIN_FONT
                    + (CLOUD_MAX_FONT - CLOUD_MIN_FONT) * c.count as f64 / max as f64,
            })
            .collect();
        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Extracts Unicode word runs of at least `min_len` characters.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    re: Regex,
}

impl Tokenizer {
    pub fn new(min_len: usize) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!(r"\b\w{{{},}}\b", min_len.max(1)))?;
        Ok(Self { re })
    }

    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.re.find_iter(text).map(|m| m.as_str())
    }
}

/// Counts tokens and returns every word sorted by count, descending. Equal
/// counts keep first-seen order.
pub fn count_words<'a, I>(tokenizer: &Tokenizer, texts: I) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    for text in texts {
        for token in tokenizer.tokens(text) {
            let next = counts.len();
            counts.entry(token.to_string()).or_insert((0, next)).0 += 1;
        }
    }

    let mut sorted: Vec<(String, u64, usize)> =
        counts.into_iter().map(|(w, (c, i))| (w, c, i)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    sorted
        .into_iter()
        .map(|(word, count, _)| WordCount { word, count })
        .collect()
}

/// One row of the "UTM term versus phrase" table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermPhrase {
    pub phrase: Option<String>,
    pub utm_term: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub phrase_cloud: WordCloud,
    pub term_cloud: WordCloud,
    pub top_phrase_words: Vec<WordCount>,
    pub top_term_words: Vec<WordCount>,
    pub term_phrase_pairs: Vec<TermPhrase>,
}

pub struct TextAnalyzer {
    phrase_tokens: Tokenizer,
    term_tokens: Tokenizer,
    top_n: usize,
}

impl TextAnalyzer {
    pub fn new(phrase_min_len: usize, term_min_len: usize, top_n: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            phrase_tokens: Tokenizer::new(phrase_min_len)?,
            term_tokens: Tokenizer::new(term_min_len)?,
            top_n,
        })
    }

    pub fn analyze(&self, rows: &[NormalizedEvent]) -> TextAnalysis {
        // Each user contributes a given (phrase, term) pair once.
        let mut seen = HashSet::new();
        let triples: Vec<(&str, Option<&str>, Option<&str>)> = rows
            .iter()
            .map(|r| {
                (
                    r.record.raw_user_id.as_str(),
                    r.record.phrase.as_deref(),
                    r.record.utm_term.as_deref(),
                )
            })
            .filter(|t| seen.insert(*t))
            .collect();

        let phrase_counts = count_words(&self.phrase_tokens, triples.iter().filter_map(|t| t.1));
        let term_counts = count_words(&self.term_tokens, triples.iter().filter_map(|t| t.2));

        let mut seen_pairs = HashSet::new();
        let term_phrase_pairs = triples
            .iter()
            .map(|(_, phrase, term)| TermPhrase {
                phrase: phrase.map(str::to_string),
                utm_term: term.map(str::to_string),
            })
            .filter(|p| seen_pairs.insert(p.clone()))
            .collect();

        TextAnalysis {
            phrase_cloud: WordCloud::from_counts(&phrase_counts),
            term_cloud: WordCloud::from_counts(&term_counts),
            top_phrase_words: phrase_counts.into_iter().take(self.top_n).collect(),
            top_term_words: term_counts.into_iter().take(self.top_n).collect(),
            term_phrase_pairs,
        }
    }
}
