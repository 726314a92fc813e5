//! Content-lemma extraction.
//!
//! Reduces text to the words that carry its meaning: lowercased, stripped of
//! punctuation, stopwords and numbers, with light suffix lemmatization.
//! Function words, auxiliaries and common verbs/adverbs are filtered out so
//! that mostly nouns, proper nouns and adjectives remain.

/// Words that never carry content on their own.
static STOP_WORDS: &[&str] = &[
    // Articles, determiners, quantifiers
    "a", "an", "the", "this", "that", "these", "those", "some", "any", "each", "every", "all",
    "both", "either", "neither", "few", "more", "most", "other", "another", "such", "no", "nor",
    "not", "only", "own", "same", "several", "many", "much", "enough",
    // Pronouns
    "i", "me", "my", "mine", "myself", "we", "us", "our", "ours", "ourselves", "you", "your",
    "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers",
    "herself", "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what",
    "which", "who", "whom", "whose", "whoever", "whatever", "something", "anything", "nothing",
    "everything", "someone", "anyone", "everyone", "somebody", "anybody", "everybody",
    // Auxiliaries and modals
    "is", "are", "was", "were", "be", "been", "being", "am", "have", "has", "had", "having", "do",
    "does", "did", "doing", "done", "will", "would", "could", "should", "may", "might", "must",
    "shall", "can", "cannot", "need", "ought", "dare",
    // Prepositions and conjunctions
    "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "onto", "upon",
    "through", "during", "before", "after", "above", "below", "between", "under", "over",
    "about", "against", "among", "around", "across", "along", "behind", "beyond", "within",
    "without", "toward", "towards", "via", "per", "and", "but", "or", "if", "because", "until",
    "while", "although", "though", "unless", "whether", "since", "than", "so", "yet",
    // Adverbs
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "too",
    "very", "just", "also", "now", "still", "already", "even", "ever", "never", "always",
    "often", "sometimes", "usually", "really", "quite", "rather", "almost", "perhaps", "maybe",
    "however", "therefore", "thus", "instead", "else", "up", "down", "out", "off", "away",
    "back", "well", "soon", "later", "today", "yesterday", "tomorrow", "yes", "ok", "okay",
    "please", "thanks",
    // Common light verbs
    "get", "gets", "got", "getting", "make", "makes", "made", "making", "go", "goes", "went",
    "going", "gone", "come", "comes", "came", "coming", "take", "takes", "took", "taking",
    "taken", "give", "gives", "gave", "giving", "given", "put", "puts", "putting", "say", "says",
    "said", "saying", "see", "sees", "saw", "seen", "know", "knows", "knew", "known", "think",
    "thinks", "thought", "want", "wants", "wanted", "use", "uses", "used", "using", "like",
    "let", "lets", "seem", "seems", "seemed", "keep", "keeps", "kept", "try", "tries", "tried",
];

/// Filter that extracts content lemmas from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LemmaFilter;

impl LemmaFilter {
    /// Creates a new lemma filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the content lemmas of `text` in their original order.
    ///
    /// Returns an empty vector when nothing content-bearing remains.
    #[must_use]
    pub fn lemmas(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(|w| w.trim_matches('\'').to_lowercase())
            .map(|w| strip_possessive(&w).to_string())
            .filter(|w| w.chars().count() > 1)
            .filter(|w| !w.chars().all(char::is_numeric))
            .filter(|w| !is_stop_word(w))
            .map(|w| lemmatize(&w))
            .collect()
    }

    /// Returns the lemmas joined by single spaces.
    #[must_use]
    pub fn clean(&self, text: &str) -> String {
        self.lemmas(text).join(" ")
    }
}

/// Checks whether a lowercased word is a stopword.
fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word) || word.contains('\'')
}

/// Removes a trailing possessive marker.
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s").unwrap_or(word)
}

/// Reduces a word to an approximate base form.
///
/// Only plural suffixes are handled; adjectives and nouns are otherwise kept
/// as written.
fn lemmatize(word: &str) -> String {
    let len = word.chars().count();
    if len <= 3 || !word.is_ascii() {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}
