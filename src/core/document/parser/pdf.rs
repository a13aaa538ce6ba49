use crate::{error::RagError, map_err};
use pdfium_render::prelude::Pdfium;
use std::{fmt::Write, time::Instant};
use tracing::debug;

/// Extracts the text of every page, in page order, separating pages with a blank line.
/// Requires the pdfium library to be available on the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl PdfParser {
    pub fn parse(&self, input: &[u8]) -> Result<String, RagError> {
        let start = Instant::now();

        let pdfium = Pdfium::new(map_err!(Pdfium::bind_to_system_library()));
        let document = map_err!(pdfium.load_pdf_from_byte_slice(input, None));

        let mut out = String::new();

        for (page_num, page) in document.pages().iter().enumerate() {
            let text = map_err!(page.text()).all();
            let text = text.trim();

            if text.is_empty() {
                debug!("Page {} has no text", page_num + 1);
                continue;
            }

            map_err!(writeln!(out, "{text}\n"));
        }

        debug!(
            "Finished processing PDF, took {}ms",
            Instant::now().duration_since(start).as_millis()
        );

        Ok(out)
    }
}
