//! Streaming row extraction
//!
//! [`RowExtractor`] pulls events from a `quick_xml` reader and yields one
//! [`IngestRow`] per element whose local name matches the schema's element.
//! Only the current event and the names of the enclosing elements are kept,
//! so documents of any size decode in bounded memory. Children of a matched
//! element are skipped.
//!
//! A malformed document yields exactly one `Err` item, after which the
//! iterator is exhausted. A document that ends while elements are still open
//! is malformed.

use std::borrow::Cow;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::schema::{IngestRow, RecordSchema};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document truncated at byte {position}: <{element}> never closed")]
    Truncated { position: u64, element: String },
}

/// Lazy, finite, non-restartable sequence of rows from one document
pub struct RowExtractor<'s, R: BufRead> {
    reader: Reader<R>,
    schema: &'s RecordSchema,
    buf: Vec<u8>,
    skip_buf: Vec<u8>,
    /// Local names of the elements enclosing the current position
    open: Vec<String>,
    finished: bool,
    rows: u64,
}

impl<'s, R: BufRead> RowExtractor<'s, R> {
    pub fn new(source: R, schema: &'s RecordSchema) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            schema,
            buf: Vec::with_capacity(4096),
            skip_buf: Vec::new(),
            open: Vec::new(),
            finished: false,
            rows: 0,
        }
    }

    /// Rows yielded so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn schema(&self) -> &RecordSchema {
        self.schema
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn fail(&mut self, source: quick_xml::Error) -> ExtractError {
        self.finished = true;
        ExtractError::Xml {
            position: Self::position(self),
            source,
        }
    }
}

impl<R: BufRead> Iterator for RowExtractor<'_, R> {
    type Item = Result<IngestRow, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let element = self.schema.element.as_bytes();

        loop {
            self.buf.clear();
            let decoder = self.reader.decoder();

            let (row, end) = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == element => {
                    (decode_row(self.schema, e, decoder), Some(e.to_end().into_owned()))
                }
                Ok(Event::Empty(ref e)) if e.local_name().as_ref() == element => {
                    (decode_row(self.schema, e, decoder), None)
                }
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.open.push(name);
                    continue;
                }
                Ok(Event::End(_)) => {
                    self.open.pop();
                    continue;
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    // End of input is clean only when every element was closed
                    let unclosed = self.open.pop()?;
                    return Some(Err(ExtractError::Truncated {
                        position: self.reader.buffer_position() as u64,
                        element: unclosed,
                    }));
                }
                Ok(_) => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ExtractError::Xml {
                        position: self.reader.buffer_position() as u64,
                        source: e,
                    }));
                }
            };

            let row = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(self.fail(e))),
            };

            // The matched element's subtree is consumed through its end tag
            if let Some(end) = end {
                let skipped = self.reader.read_to_end_into(end.name(), &mut self.skip_buf);
                self.skip_buf.clear();
                if let Err(e) = skipped {
                    return Some(Err(self.fail(e)));
                }
            }

            self.rows += 1;
            return Some(Ok(row));
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for RowExtractor<'_, R> {}

fn decode_row(
    schema: &RecordSchema,
    element: &BytesStart<'_>,
    decoder: quick_xml::encoding::Decoder,
) -> Result<IngestRow, quick_xml::Error> {
    let mut attributes: Vec<(&str, Cow<'_, str>)> = Vec::new();

    for attr in element.attributes() {
        let attr = attr?;
        // Attribute names the schema declares are ASCII; others can be ignored
        let Ok(name) = std::str::from_utf8(attr.key.local_name().into_inner()) else {
            continue;
        };
        let value = attr.decode_and_unescape_value(decoder)?;
        attributes.push((name, value));
    }

    Ok(schema.row_from_attributes(&attributes))
}
