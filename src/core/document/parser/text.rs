use crate::error::RagError;
use tracing::debug;

/// Reads UTF-8 text, falling back to Latin-1 for files in legacy encodings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl TextParser {
    pub fn parse(&self, input: &[u8]) -> Result<String, RagError> {
        match String::from_utf8(input.to_vec()) {
            Ok(text) => Ok(text),
            Err(e) => {
                debug!("Text is not valid UTF-8 ({e}), decoding as Latin-1");
                Ok(input.iter().map(|b| *b as char).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TextParser;

    #[test]
    fn decodes_utf8() {
        let text = TextParser.parse("Grüße, world.".as_bytes()).unwrap();
        assert_eq!("Grüße, world.", text);
    }

    #[test]
    fn falls_back_to_latin1() {
        let text = TextParser.parse(&[b'c', b'a', b'f', 0xE9, b'!']).unwrap();
        assert_eq!("café!", text);
    }
}
