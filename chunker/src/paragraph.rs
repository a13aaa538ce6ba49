use super::{
    sentence::{paragraphs, sentences},
    tokens::{TokenId, Tokenizer},
    ChunkerError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const PARAGRAPH_WINDOW_DEFAULT_SIZE: usize = 500;
const PARAGRAPH_WINDOW_DEFAULT_OVERLAP: usize = 50;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

/// A chunk of a single document, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub token_count: usize,
}

/// The unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Trimmed, never empty.
    pub text: String,

    /// Identifier of the originating document.
    pub source: String,

    /// Position in the chunk sequence of the whole corpus.
    pub chunk_id: usize,

    pub token_count: usize,
}

/// Paragraph aware chunker with a hard token budget.
///
/// Paragraphs (separated by blank lines) are accumulated until adding the next one
/// would exceed `size` tokens. Every new chunk is seeded with the last `overlap`
/// tokens of the previous one. Paragraphs that do not fit into `size` on their own
/// are split at sentence boundaries instead, and a single sentence larger than `size`
/// becomes its own chunk.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphWindow {
    /// Maximum amount of tokens in a chunk.
    pub size: usize,

    /// Amount of tokens carried over from the previous chunk.
    pub overlap: usize,
}

impl ParagraphWindow {
    /// Create a new `ParagraphWindow` chunker.
    /// Errors if `size` is 0 or `overlap` is not less than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if size == 0 {
            return Err(ChunkerError::Config(
                "size must be greater than 0".to_string(),
            ));
        }
        if overlap >= size {
            return Err(ChunkerError::Config(
                "overlap must be less than size".to_string(),
            ));
        }
        Ok(Self { size, overlap })
    }
}

impl Default for ParagraphWindow {
    fn default() -> Self {
        Self {
            size: PARAGRAPH_WINDOW_DEFAULT_SIZE,
            overlap: PARAGRAPH_WINDOW_DEFAULT_OVERLAP,
        }
    }
}

impl ParagraphWindow {
    /// Chunk every `(source, text)` document, numbering the chunks
    /// sequentially across all of them.
    pub fn chunk_documents<'a, T, I>(
        &self,
        tokenizer: &T,
        documents: I,
    ) -> Result<Vec<Chunk>, ChunkerError>
    where
        T: Tokenizer + ?Sized,
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut chunks = vec![];
        let mut documents_chunked = 0;

        for (source, text) in documents {
            let segments = self.chunk(tokenizer, text)?;

            debug!("Chunked '{source}' into {} chunk(s)", segments.len());

            for Segment { text, token_count } in segments {
                chunks.push(Chunk {
                    chunk_id: chunks.len(),
                    source: source.to_string(),
                    text,
                    token_count,
                });
            }

            documents_chunked += 1;
        }

        debug!(
            "Chunked {documents_chunked} document(s) into {} chunk(s)",
            chunks.len()
        );

        Ok(chunks)
    }

    pub fn chunk<T>(&self, tokenizer: &T, input: &str) -> Result<Vec<Segment>, ChunkerError>
    where
        T: Tokenizer + ?Sized,
    {
        let input = input.trim();

        if input.is_empty() {
            return Ok(vec![]);
        }

        let mut segments = vec![];
        let mut buf = Buffer::default();

        for paragraph in paragraphs(input) {
            let paragraph_tokens = tokenizer.count(paragraph);

            // Cannot fit even on its own, split by sentences without overlap
            if paragraph_tokens > self.size {
                buf.flush(&mut segments);
                self.fill(tokenizer, &sentences(paragraph), &mut segments);
                continue;
            }

            if buf.is_empty() {
                buf.set(paragraph.to_string(), paragraph_tokens);
                continue;
            }

            if buf.try_append(tokenizer, PARAGRAPH_SEPARATOR, paragraph, self.size) {
                continue;
            }

            let previous = buf.flush(&mut segments);
            let (text, token_count) =
                self.seed(tokenizer, &previous, paragraph, paragraph_tokens)?;
            buf.set(text, token_count);
        }

        buf.flush(&mut segments);

        Ok(segments)
    }

    /// Fill chunks with `sentences` until the budget is reached. No overlap is applied.
    fn fill<T>(&self, tokenizer: &T, sentences: &[&str], segments: &mut Vec<Segment>)
    where
        T: Tokenizer + ?Sized,
    {
        let mut buf = Buffer::default();

        for sentence in sentences {
            if buf.is_empty() {
                buf.set(sentence.to_string(), tokenizer.count(sentence));
                continue;
            }

            if buf.try_append(tokenizer, SENTENCE_SEPARATOR, sentence, self.size) {
                continue;
            }

            buf.flush(segments);
            buf.set(sentence.to_string(), tokenizer.count(sentence));
        }

        buf.flush(segments);
    }

    /// Start a new chunk with `paragraph`, prefixed by the last `overlap` tokens of
    /// `previous`. The prefix is shortened until the result fits the budget.
    fn seed<T>(
        &self,
        tokenizer: &T,
        previous: &str,
        paragraph: &str,
        paragraph_tokens: usize,
    ) -> Result<(String, usize), ChunkerError>
    where
        T: Tokenizer + ?Sized,
    {
        if self.overlap == 0 {
            return Ok((paragraph.to_string(), paragraph_tokens));
        }

        let tokens = tokenizer.encode(previous);

        let mut take = self
            .overlap
            .min(tokens.len())
            .min(self.size.saturating_sub(paragraph_tokens));

        while take > 0 {
            let Some(tail) = decode_tail(tokenizer, &tokens, take) else {
                break;
            };

            let tail = tail.trim();
            if tail.is_empty() {
                break;
            }

            let text = format!("{tail}{PARAGRAPH_SEPARATOR}{paragraph}");
            let token_count = tokenizer.count(&text);

            if token_count <= self.size {
                return Ok((text, token_count));
            }

            take -= 1;
        }

        Ok((paragraph.to_string(), paragraph_tokens))
    }
}

/// Decode the last `take` tokens. If the slice starts in the middle of a multi-byte
/// char, leading tokens are dropped until it decodes.
fn decode_tail<T>(tokenizer: &T, tokens: &[TokenId], take: usize) -> Option<String>
where
    T: Tokenizer + ?Sized,
{
    let start = tokens.len().saturating_sub(take);
    (start..tokens.len()).find_map(|i| {
        let tail = tokens.get(i..)?;
        match tokenizer.decode(tail) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Overlap tail not decodable from token {i}: {e}");
                None
            }
        }
    })
}

/// Pending chunk text and its exact token count.
#[derive(Debug, Default)]
struct Buffer {
    text: String,
    tokens: usize,
}

impl Buffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn set(&mut self, text: String, tokens: usize) {
        self.text = text;
        self.tokens = tokens;
    }

    /// Append `piece` joined by `separator` if the result stays within `size` tokens.
    fn try_append<T>(&mut self, tokenizer: &T, separator: &str, piece: &str, size: usize) -> bool
    where
        T: Tokenizer + ?Sized,
    {
        let candidate = format!("{}{separator}{piece}", self.text);
        let tokens = tokenizer.count(&candidate);

        if tokens > size {
            return false;
        }

        self.set(candidate, tokens);
        true
    }

    /// Push the buffer as a segment if not empty and reset it.
    /// Returns the flushed text.
    fn flush(&mut self, segments: &mut Vec<Segment>) -> String {
        let text = std::mem::take(&mut self.text);
        let token_count = std::mem::take(&mut self.tokens);

        if !text.is_empty() {
            segments.push(Segment {
                text: text.clone(),
                token_count,
            });
        }

        text
    }
}
