use crate::error::RagError;
use crate::map_err;
use docx_rs::read_docx;
use docx_rs::{Paragraph, ParagraphChild, RunChild, Table};
use std::{fmt::Write, time::Instant};
use tracing::debug;

/// Extracts paragraphs, one per line, followed by the contents of every table cell.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxParser;

impl DocxParser {
    pub fn parse(&self, input: &[u8]) -> Result<String, RagError> {
        let start = Instant::now();

        let input = map_err!(read_docx(input));

        let mut out = String::new();
        let mut tables = String::new();

        for el in input.document.children {
            match el {
                docx_rs::DocumentChild::Paragraph(ref el) => {
                    let text = extract_paragraph(el).join("");
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    map_err!(writeln!(out, "{text}"));
                }
                docx_rs::DocumentChild::Table(ref el) => {
                    map_err!(extract_table(el, &mut tables));
                }
                _ => {}
            }
        }

        out.push_str(&tables);

        debug!(
            "Finished processing DOCX, took {}ms",
            Instant::now().duration_since(start).as_millis()
        );

        Ok(out.trim_end().to_string())
    }
}

/// Write the text of every non-empty table cell on its own line.
fn extract_table(table: &Table, out: &mut String) -> Result<(), std::fmt::Error> {
    for row in table.rows.iter() {
        #[allow(irrefutable_let_patterns)]
        let docx_rs::TableChild::TableRow(docx_rs::TableRow { cells, .. }) = row
        else {
            continue;
        };

        for cell in cells.iter() {
            #[allow(irrefutable_let_patterns)]
            let docx_rs::TableRowChild::TableCell(cell) = cell
            else {
                continue;
            };

            let mut cell_buf = vec![];

            for child in cell.children.iter() {
                match child {
                    docx_rs::TableCellContent::Paragraph(ref p) => {
                        cell_buf.push(extract_paragraph(p).join(""));
                    }
                    c => debug!("Unrecognized child in table cell: {:?}", c),
                }
            }

            let cell = cell_buf.join("\n");
            let cell = cell.trim();
            if !cell.is_empty() {
                writeln!(out, "{cell}")?;
            }
        }
    }

    Ok(())
}

fn extract_paragraph(p: &Paragraph) -> Vec<&str> {
    let mut out = vec![];

    for child in p.children.iter() {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for rchild in run.children.iter() {
                    let RunChild::Text(t) = rchild else { continue };
                    out.push(t.text.as_str());
                }
            }
            docx_rs::ParagraphChild::Hyperlink(hl) => {
                for rchild in hl.children.iter() {
                    let ParagraphChild::Run(run) = rchild else {
                        continue;
                    };
                    for rchild in run.children.iter() {
                        let RunChild::Text(t) = rchild else { continue };
                        out.push(t.text.as_str());
                    }
                }
            }
            _el => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::DocxParser;
    use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

    fn paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    #[test]
    fn paragraphs_then_tables() {
        let mut buf = std::io::Cursor::new(vec![]);

        Docx::new()
            .add_paragraph(paragraph("Introduction."))
            .add_table(Table::new(vec![TableRow::new(vec![
                TableCell::new().add_paragraph(paragraph("Cell one")),
                TableCell::new().add_paragraph(paragraph("  ")),
                TableCell::new().add_paragraph(paragraph("Cell two")),
            ])]))
            .add_paragraph(paragraph("   "))
            .add_paragraph(paragraph("Conclusion."))
            .build()
            .pack(&mut buf)
            .unwrap();

        let text = DocxParser.parse(buf.get_ref()).unwrap();

        assert_eq!("Introduction.\nConclusion.\nCell one\nCell two", text);
    }
}
