//! Chat text sanitizing applied to speech before it reaches the server.

/// Default maximum speech length in characters.
pub const DEFAULT_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone)]
pub struct ChatFilter {
    banned: Vec<String>,
    max_length: usize,
}

impl Default for ChatFilter {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl ChatFilter {
    pub fn new<I, S>(banned: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            banned: banned
                .into_iter()
                .map(|word| word.as_ref().trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Strips control characters, truncates, then masks banned words.
    ///
    /// Matching is case-insensitive and on whole alphanumeric words only, so
    /// banning "ass" leaves "class" alone.
    pub fn filter(&self, text: &str) -> String {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_control())
            .take(self.max_length)
            .collect();

        if self.banned.is_empty() {
            return cleaned;
        }

        let mut out = String::with_capacity(cleaned.len());
        let mut word = String::new();
        for c in cleaned.chars() {
            if c.is_alphanumeric() {
                word.push(c);
            } else {
                self.flush_word(&mut word, &mut out);
                out.push(c);
            }
        }
        self.flush_word(&mut word, &mut out);
        out
    }

    fn flush_word(&self, word: &mut String, out: &mut String) {
        if word.is_empty() {
            return;
        }
        if self.banned.contains(&word.to_lowercase()) {
            out.extend(std::iter::repeat('*').take(word.chars().count()));
        } else {
            out.push_str(word);
        }
        word.clear();
    }
}
